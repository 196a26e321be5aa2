//! The components of the AST generated through the [parser][`crate::parser`] module.
//! These structs are used to construct an AST within Rust.
//!
//! A full program is described as [`Program`] struct.
//!
//! # Further notes
//!
//! The AST only holds the structure of the code. It does not resolve names or check types.
//!
//! Typically, an AST should not be defined manually because it is painful.
//! Instead, [`crate::lexer`] and [`crate::parser`] should be used to create one from a string.

use indexmap::IndexMap;

pub mod op;

/// A complete program.
///
/// # Syntax
/// ```text
/// program = (stmt)* EOF ;
/// ```
///
/// # Example
/// ```text
/// a := 1
/// b := 2
/// print(a + b)
/// for i in 1..=3
///     print(i)
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct Program(pub Vec<Stmt>);

/// An indented block of statements.
///
/// A block always holds at least one statement.
///
/// # Syntax
/// ```text
/// block = NEWLINE INDENT (stmt)+ DEDENT ;
/// ```
///
/// # Example
/// ```text
/// if x
///     a := 1
///     b := 2
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct Block(pub Vec<Stmt>);

/// A statement.
#[derive(Debug, PartialEq, Clone)]
pub enum Stmt {
    /// An expression.
    Expr(Expr),

    /// A pipeline used as a statement.
    ///
    /// See [`Pipeline`] for examples.
    Pipeline(Pipeline),

    /// A variable initialization.
    ///
    /// # Syntax
    /// ```text
    /// init = ident (":" type)? ":=" value ;
    /// ```
    ///
    /// # Examples
    /// ```text
    /// x := 1
    /// name: str := "quartz"
    /// ```
    Init {
        /// The variable being initialized
        ident: String,
        /// The declared type (if present)
        ty: Option<Type>,
        /// The value the variable is initialized to
        value: Expr
    },

    /// An assignment (or compound assignment) to an existing place.
    ///
    /// # Examples
    /// ```text
    /// x = 2
    /// counts[key] += 1
    /// self.total <<= 2
    /// ```
    Assign {
        /// The place being assigned to (an identifier, attribute, or subscript)
        target: Expr,
        /// The assignment operator
        op: op::Assign,
        /// The value being assigned
        value: Expr
    },

    /// A pipeline whose result is assigned back into its source.
    ///
    /// # Example
    /// ```text
    /// names ->= sorted -> .reverse()
    /// ```
    PipeAssign {
        /// The place piped from and assigned to
        target: Expr,
        /// The stages the place is piped through
        stages: Vec<PipeStage>
    },

    /// A return statement that signals to exit the function body.
    ///
    /// `<<<` is an alternate spelling of `return`.
    ///
    /// # Examples
    /// ```text
    /// return
    /// return 2
    /// <<< x + 1
    /// ```
    Return(Option<Expr>),

    /// `break`
    Break,

    /// `continue`
    Continue,

    /// `pass`
    Pass,

    /// `alias existing := new`
    Alias {
        /// The name being aliased
        existing: String,
        /// The new name
        ident: String
    },

    /// `assert test[, message]`
    Assert {
        /// The condition that must hold
        test: Expr,
        /// The message if the condition fails
        msg: Option<Expr>
    },

    /// `import a.b.c [as d]`
    Import {
        /// The dotted path to the module
        path: Vec<String>,
        /// The name the module is bound to (if renamed)
        alias: Option<String>
    },

    /// `from a.b import c [as d], e` or `from a.b import *`
    FromImport {
        /// The dotted path to the module
        path: Vec<String>,
        /// The names imported from the module
        names: ImportNames
    },

    /// A class declaration.
    ///
    /// See [`ClassDecl`] for examples.
    Class(ClassDecl),

    /// A function declaration.
    ///
    /// See [`FunDecl`] for examples.
    FunDecl(FunDecl),

    /// An if statement.
    ///
    /// # Syntax
    /// ```text
    /// if = "if" expr block ("else" "if" expr block)* ("else" block)? ;
    /// ```
    ///
    /// # Example
    /// ```text
    /// if x < 0
    ///     sign := -1
    /// else if x == 0
    ///     sign := 0
    /// else
    ///     sign := 1
    /// ```
    If {
        /// The condition/block pairs, in order
        conditionals: Vec<(Expr, Block)>,
        /// The final else block (if present)
        last: Option<Block>
    },

    /// A `while` or `until` loop.
    ///
    /// # Example
    /// ```text
    /// until done
    ///     done := step()
    /// ```
    While {
        /// Whether the loop runs while the condition holds or until it holds
        kind: LoopKind,
        /// The loop condition
        condition: Expr,
        /// The loop body
        block: Block
    },

    /// A for loop.
    ///
    /// # Syntax
    /// ```text
    /// for = "for" (ident "in")? iterable block ;
    /// ```
    ///
    /// # Examples
    /// ```text
    /// for i in 1..=10
    ///     print(i)
    ///
    /// for 0..3
    ///     ring()
    ///
    /// for name in names
    ///     greet(name)
    /// ```
    For {
        /// The loop variable (if present)
        ident: Option<String>,
        /// What is being iterated over
        iterable: Iterable,
        /// The loop body
        block: Block
    },

    /// A match statement.
    ///
    /// # Syntax
    /// ```text
    /// match = "match" expr NEWLINE INDENT ("case" expr ("if" expr)? block)+ DEDENT ;
    /// ```
    ///
    /// # Example
    /// ```text
    /// match code
    ///     case 200
    ///         ok()
    ///     case n if n >= 500
    ///         retry()
    /// ```
    Match {
        /// The value being matched
        subject: Expr,
        /// The arms, in order
        arms: Vec<MatchArm>
    },

    /// A wrap statement, which wraps its block with the given wrappers.
    ///
    /// # Example
    /// ```text
    /// wrap timed, retry(times=3)
    ///     fetch()
    /// ```
    Wrap {
        /// The wrappers
        targets: Vec<WrapTarget>,
        /// The wrapped block
        block: Block
    },
}

impl Stmt {
    /// Test if this statement ends with a block.
    ///
    /// A statement that ends with a block is already terminated by its final dedent.
    pub fn ends_with_block(&self) -> bool {
        match self {
            | Stmt::FunDecl(_)
            | Stmt::If { .. }
            | Stmt::While { .. }
            | Stmt::For { .. }
            | Stmt::Match { .. }
            | Stmt::Wrap { .. } => true,
            Stmt::Class(c) => c.block.is_some(),
            _ => false
        }
    }
}

/// Whether a loop runs while its condition holds or until it does.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoopKind {
    /// `while`
    While,
    /// `until`
    Until,
}

/// What a for loop iterates over.
#[derive(Debug, PartialEq, Clone)]
pub enum Iterable {
    /// A range of integers.
    ///
    /// The bounds of a range are integer literals or identifiers.
    Range {
        /// The start of the range
        start: Expr,
        /// The end of the range
        end: Expr,
        /// Whether the end is included (`..=`) or excluded (`..`)
        inclusive: bool
    },

    /// Any other expression.
    Expr(Expr),
}

/// One arm of a match statement.
#[derive(Debug, PartialEq, Clone)]
pub struct MatchArm {
    /// The value this arm matches
    pub pattern: Expr,
    /// An extra condition for this arm (if present)
    pub guard: Option<Expr>,
    /// The arm's body
    pub block: Block
}

/// A wrapper in a wrap statement (`name` or `name(args)`).
#[derive(Debug, PartialEq, Clone)]
pub struct WrapTarget {
    /// The wrapper's name
    pub ident: String,
    /// The arguments to the wrapper (if called)
    pub args: Option<Vec<Arg>>
}

/// The names imported by a [`Stmt::FromImport`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ImportNames {
    /// `*`
    All,
    /// Each name, with what it is bound to (if renamed)
    Names(Vec<(String, Option<String>)>),
}

/// A class declaration.
///
/// A class without a block only declares the name.
///
/// # Syntax
/// ```text
/// class = "class" ident ("(" (expr ",")* ")")? block? ;
/// ```
///
/// # Examples
/// ```text
/// class Marker
///
/// class Duck(Bird)
///     fn quack()
///         print("quack")
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct ClassDecl {
    /// The class's identifier
    pub ident: String,
    /// The classes this class derives from
    pub bases: Vec<Expr>,
    /// The class body (if present)
    pub block: Option<Block>
}

/// A function parameter.
///
/// # Syntax
/// ```text
/// param = ident (":" type)? ("=" expr)? ;
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    /// The declared type of the parameter (if present)
    pub ty: Option<Type>,
    /// The default value of the parameter (if present)
    pub default: Option<Expr>
}

/// A complete function declaration with a function body.
///
/// # Syntax
/// ```text
/// fun_decl = "pub"? "fn" ident "(" (param ",")* ")" ("~>" type)? block ;
/// ```
///
/// # Example
/// ```text
/// pub fn scale(n: int, by: int = 2) ~> int
///     return n * by
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct FunDecl {
    /// Whether the function was declared `pub`
    pub public: bool,
    /// The function's identifier
    pub ident: String,
    /// The function's parameters, in declaration order
    pub params: IndexMap<String, Param>,
    /// The function's return type (if present)
    pub ret: Option<Type>,
    /// The function's body
    pub block: Block
}

/// A type expression.
///
/// A type is one or more alternatives separated by `|`.
///
/// # Examples
/// ```text
/// str
/// list[int | str]
/// dict[str, list[int]] | None
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Type(pub Vec<TypeTerm>);

/// One alternative of a [`Type`]: a name with optional type parameters.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TypeTerm {
    /// The type's name
    pub ident: String,
    /// The type's parameters
    pub params: Vec<Type>
}

impl TypeTerm {
    /// Create a type term with no parameters.
    pub fn named(ident: impl Into<String>) -> Self {
        TypeTerm { ident: ident.into(), params: vec![] }
    }
}

/// An expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    /// Variable access.
    Ident(String),

    /// An int, float, string, bool, or None literal.
    Literal(Literal),

    /// A tuple (e.g. `()`, `(1,)`, `(1, 2)`)
    Tuple(Vec<Expr>),

    /// A list (e.g. `[1, 2, 3]`)
    List(Vec<Expr>),

    /// A set (e.g. `${1, 2, 3}`)
    Set(Vec<Expr>),

    /// A map (e.g. `%{"a": 1, "b": 2}`)
    Map(Vec<(Expr, Expr)>),

    /// An attribute access (e.g. `a.b`)
    Attr {
        /// The expression to access the attribute on
        obj: Box<Expr>,
        /// The attribute to access
        attr: String
    },

    /// A function call.
    ///
    /// # Example
    /// ```text
    /// print(a, sep=", ")
    /// ```
    Call {
        /// The function to call
        funct: Box<Expr>,
        /// The arguments to the function call
        args: Vec<Arg>
    },

    /// A subscript.
    ///
    /// # Examples
    /// ```text
    /// a[0]
    /// grid[1, 2]
    /// a[1:5], a[::2], a[:]
    /// ```
    Index {
        /// The expression to index
        obj: Box<Expr>,
        /// The subscripts, separated by commas
        subscripts: Vec<Subscript>
    },

    /// A unary operation (e.g. `-a`, `not b`)
    UnaryOp {
        /// The operator
        op: op::Unary,
        /// The operand
        expr: Box<Expr>
    },

    /// A binary operation (e.g. `a + b`, `a or b`)
    BinaryOp {
        /// The operator
        op: op::Binary,
        /// The left operand
        left: Box<Expr>,
        /// The right operand
        right: Box<Expr>
    },

    /// A comparison (e.g. `a < b`, `a is not b`, `a not in b`)
    ///
    /// Chained comparisons nest to the left: `a < b < c` is `(a < b) < c`.
    Comparison {
        /// The operator
        op: op::Cmp,
        /// The left operand
        left: Box<Expr>,
        /// The right operand
        right: Box<Expr>
    },

    /// A conditional expression.
    ///
    /// # Example
    /// ```text
    /// x > 0 ?? "positive" !! "not positive"
    /// ```
    Ternary {
        /// The condition
        condition: Box<Expr>,
        /// The value if the condition holds
        then: Box<Expr>,
        /// The value if the condition does not hold
        otherwise: Box<Expr>
    },

    /// A pipeline used as a value.
    ///
    /// See [`Pipeline`] for examples.
    Pipeline(Pipeline),
}

impl Expr {
    /// Test if this expression is a place that can be assigned to.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Attr { .. } | Expr::Index { .. })
    }
}

/// A literal.
#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    /// An integer (e.g. `1`, `1_000`)
    Int(i64),
    /// A float (e.g. `1.5`, `.5`, `2.`)
    Float(f64),
    /// A string, with escapes resolved (e.g. `"hi\n"`, `'hi'`)
    Str(String),
    /// `True` or `False`
    Bool(bool),
    /// `None`
    None,
}

impl Literal {
    /// Parse an integer lexeme (ignoring digit separators).
    ///
    /// Returns `None` if the value does not fit.
    pub fn from_int(s: &str) -> Option<Self> {
        s.replace('_', "").parse().ok().map(Literal::Int)
    }

    /// Parse a float lexeme (ignoring digit separators).
    pub fn from_float(s: &str) -> Option<Self> {
        s.replace('_', "").parse().ok().map(Literal::Float)
    }
}

/// An argument in a function call.
///
/// An argument can be named (`key=value`) or positional (`value`).
#[derive(Debug, PartialEq, Clone)]
pub struct Arg {
    /// The name of the argument (if a keyword argument)
    pub ident: Option<String>,
    /// The value of the argument
    pub value: Expr
}

impl Arg {
    /// Create a positional argument.
    pub fn positional(value: Expr) -> Self {
        Arg { ident: None, value }
    }
}

/// One entry of a subscript.
#[derive(Debug, PartialEq, Clone)]
pub enum Subscript {
    /// A single index (`a[i]`)
    Index(Expr),

    /// A slice (`a[start:stop:step]`). Each part can be left out.
    Slice {
        /// Where the slice starts
        start: Option<Expr>,
        /// Where the slice stops
        stop: Option<Expr>,
        /// The step of the slice
        step: Option<Expr>
    },
}

/// A pipeline, which passes a value through a chain of functions.
///
/// # Syntax
/// ```text
/// pipeline = expr ("->" stage)+ ;
/// ```
///
/// # Examples
/// ```text
/// data -> parse -> validate(strict=True)
/// words -> sorted -> .reverse()
/// lines -> filter: is_blank, False
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct Pipeline {
    /// The value being piped
    pub source: Box<Expr>,
    /// The stages, in order
    pub stages: Vec<PipeStage>
}

/// One stage of a [`Pipeline`].
///
/// # Syntax
/// ```text
/// stage = "."? ident ("." ident)* ( "(" args ")" | ":" expr ("," expr)* )? ;
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct PipeStage {
    /// Whether the stage started with `.`, calling a method on the piped value
    pub implicit_receiver: bool,
    /// The dotted path to the function (never empty)
    pub path: Vec<String>,
    /// The extra arguments to the stage
    pub args: StageArgs
}

/// The extra arguments given to a [`PipeStage`].
#[derive(Debug, PartialEq, Clone)]
pub enum StageArgs {
    /// No arguments (`-> f`)
    Bare,
    /// A parenthesized argument list (`-> f(a, b=1)`)
    Call(Vec<Arg>),
    /// A colon argument list (`-> f: a, b`)
    Colon(Vec<Expr>),
}
