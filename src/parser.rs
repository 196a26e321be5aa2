//! Converts sequences of tokens to an AST.
//!
//! The parser is implemented as a recursive descent parser.
//! This parser has grammatical rules, which break down into smaller grammatical rules.
//! The token sequence is assigned the top-most rule (`program`) and the individual units of
//! this rule are computed by recursive statements.
//!
//! Layout is already resolved by the [lexer][`crate::lexer`], so blocks are delimited by
//! [`Tag::Newline`], [`Tag::Indent`], and [`Tag::Dedent`] tokens.
//!
//! This module provides:
//! - [`parse`]: A function to parse [a list of lexed tokens][`crate::lexer`] into an AST.
//! - [`Parser`]: The struct that does all the parsing.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{self, op};
use crate::err::{Diagnostic, QzErr};
use crate::lexer::token::{token, Tag, Token, TokenPat};
use crate::span::{Loc, Located};

/// Parses a sequence of tokens to a program tree.
///
/// # Example
/// ```
/// # use quartz_lang::lexer::tokenize;
/// # use quartz_lang::parser::parse;
/// use quartz_lang::ast::{Expr, Literal, Program, Stmt};
///
/// let tokens = tokenize("x := 1").unwrap();
/// assert_eq!(parse(tokens).unwrap(), Program(vec![
///     Stmt::Init {
///         ident: String::from("x"),
///         ty: None,
///         value: Expr::Literal(Literal::Int(1))
///     }
/// ]));
/// ```
pub fn parse(tokens: impl IntoIterator<Item=Token>) -> ParseResult<ast::Program> {
    Parser::new(tokens).parse()
}

/// A struct that does the conversion of tokens to a program tree.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

/// How deeply blocks, expressions, and types may nest inside each other.
pub const MAX_DEPTH: usize = 32;

/// An error that occurs in the parsing process.
///
/// Most variants carry how the token that was found instead is displayed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseErr {
    /// The parser expected one of the tokens.
    ExpectedTokens {
        /// The tokens that would have been accepted
        expected: Vec<TokenPat>,
        /// The token that was found
        found: String
    },

    /// The parser expected an identifier.
    ExpectedIdent(String),

    /// The parser expected an expression here, but failed to match an expression.
    ExpectedExpr(String),

    /// The parser expected a type expression (e.g. `list[str]`).
    ExpectedType(String),

    /// A statement was followed by something other than a statement terminator.
    ExpectedStmtEnd(String),

    /// An indented block appeared where no block was opened.
    UnexpectedIndent,

    /// An indented block held no statements.
    EmptyBlock,

    /// A pipeline stage did not start with a function or method name.
    MissingStageIdent(String),

    /// A token in comparison position is not a comparison operator (e.g. a bare `not`).
    UnknownCmpOp(String),

    /// An endpoint of a `for` range was not an integer literal or identifier.
    InvalidRangeEndpoint,

    /// The left side of an assignment is not a place that can be assigned to.
    InvalidAssignTarget,

    /// A parameter name was repeated in a function declaration.
    DuplicateParam(String),

    /// A keyword argument was repeated in a call.
    DuplicateKwarg(String),

    /// The string provided could not be parsed into a numeric value.
    CannotParseNumeric(String),

    /// A string literal held a malformed escape sequence.
    InvalidEscape(String),

    /// Blocks, expressions, or types were nested more than [`MAX_DEPTH`] levels deep.
    NestingTooDeep,

    /// The parser tried to read past the end of the token sequence.
    NoTokenAt(usize),
}

impl QzErr for ParseErr {
    fn err_name(&self) -> &'static str {
        "syntax error"
    }
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::ExpectedTokens { expected, found } => match expected.as_slice() {
                [t] => write!(f, "expected {t}, got {found}"),
                ts => {
                    let tstr = ts.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "expected one of {tstr}, got {found}")
                }
            },
            ParseErr::ExpectedIdent(found)     => write!(f, "expected identifier, got {found}"),
            ParseErr::ExpectedExpr(found)      => write!(f, "expected expression, got {found}"),
            ParseErr::ExpectedType(found)      => write!(f, "expected type expression, got {found}"),
            ParseErr::ExpectedStmtEnd(found)   => write!(f, "more than one statement on the same line (found {found})"),
            ParseErr::UnexpectedIndent         => write!(f, "unexpected indent"),
            ParseErr::EmptyBlock               => write!(f, "no statements within an indented block"),
            ParseErr::MissingStageIdent(found) => write!(f, "missing function/method identifier in pipeline stage, got {found}"),
            ParseErr::UnknownCmpOp(op)         => write!(f, "unknown comparison operator \"{op}\""),
            ParseErr::InvalidRangeEndpoint     => write!(f, "range endpoints must be integer literals or identifiers"),
            ParseErr::InvalidAssignTarget      => write!(f, "cannot assign to this expression"),
            ParseErr::DuplicateParam(p)        => write!(f, "duplicate parameter '{p}'"),
            ParseErr::DuplicateKwarg(k)        => write!(f, "keyword argument '{k}' repeated"),
            ParseErr::CannotParseNumeric(s)    => write!(f, "could not parse numeric \"{s}\""),
            ParseErr::InvalidEscape(s)         => write!(f, "invalid escape sequence \"{s}\""),
            ParseErr::NestingTooDeep           => write!(f, "nesting exceeds {MAX_DEPTH} levels"),
            ParseErr::NoTokenAt(i)             => write!(f, "no token found at index {i}"),
        }
    }
}
impl std::error::Error for ParseErr {}

/// A [`Result`] type for operations in the parsing process.
pub type ParseResult<T> = Result<T, FullParseErr>;
type FullParseErr = Diagnostic<ParseErr>;

macro_rules! left_assoc_rules {
    ($($n:ident = $ds:ident (($($op:tt),+) $rhs:ident)*;)+) => {
        $(
            fn $n(&mut self) -> ParseResult<Option<ast::Expr>> {
                let Some(mut e) = self.$ds()? else { return Ok(None) };

                while let Some(op) = self.match_binary(&[$(token![$op]),+]) {
                    let right = self.$rhs()?
                        .ok_or_else(|| self.expected_expr())?;

                    e = ast::Expr::BinaryOp {
                        op,
                        left: Box::new(e),
                        right: Box::new(right)
                    };
                }

                Ok(Some(e))
            }
        )+
    };
}

/// Matches one escape sequence in a string literal (without the backslash).
static ESCAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\(o[0-7]{1,3}|x[0-9A-Fa-f]{2}|u[0-9A-Fa-f]{4}|U[0-9A-Fa-f]{8}|.)").unwrap()
});
static BASIC_ESCAPES: Lazy<HashMap<char, char>> = Lazy::new(|| {
    HashMap::from([
        ('\\', '\\'),
        ('"', '"'),
        ('\'', '\''),
        ('a', '\x07'),
        ('b', '\x08'),
        ('f', '\x0C'),
        ('n', '\n'),
        ('r', '\r'),
        ('t', '\t'),
        ('v', '\x0B'),
    ])
});

/// Resolve the escapes in the text of a string literal.
///
/// A backslash pair that is not a known escape is kept as written.
fn unescape(s: &str) -> Result<String, ParseErr> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;

    for cap in ESCAPE_RE.captures_iter(s) {
        let (Some(whole), Some(body)) = (cap.get(0), cap.get(1)) else { continue };
        out.push_str(&s[last..whole.start()]);
        last = whole.end();

        let mut chars = body.as_str().chars();
        let Some(kind) = chars.next() else { continue };
        let digits = chars.as_str();

        let radix = match kind {
            'o' => 8,
            'x' | 'u' | 'U' => 16,
            c => {
                match BASIC_ESCAPES.get(&c) {
                    Some(&e) => out.push(e),
                    None => out.push_str(whole.as_str()),
                }
                continue;
            }
        };

        let chr = u32::from_str_radix(digits, radix).ok()
            .and_then(char::from_u32)
            .ok_or_else(|| ParseErr::InvalidEscape(whole.as_str().to_string()))?;
        out.push(chr);
    }

    out.push_str(&s[last..]);
    Ok(out)
}

impl Parser {
    /// Create a new Parser to read a given set of tokens.
    pub fn new(tokens: impl IntoIterator<Item=Token>) -> Self {
        Self { tokens: tokens.into_iter().collect(), index: 0, depth: 0 }
    }

    /// Consumes the parser and converts the tokens into an AST.
    pub fn parse(mut self) -> ParseResult<ast::Program> {
        let mut stmts = vec![];

        loop {
            self.skip_separators();

            match self.peek().map(Token::tag) {
                Some(Tag::Eof) => break,
                Some(Tag::Indent) => Err(ParseErr::UnexpectedIndent.at(self.peek_loc()))?,
                Some(_) => stmts.push(self.expect_stmt()?),
                None => Err(self.no_token())?,
            }
        }

        tracing::debug!(statements = stmts.len(), "parsed program");
        Ok(ast::Program(stmts))
    }

    // General terminology:
    // "expect X": The next set of tokens must represent X, otherwise error.
    // "match X": If the next set of tokens represent X, consume those tokens.
    //     Otherwise, do & return nothing.

    /// Look at the next token in the input if present.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    /// Look at the pattern of the next token in the input if present.
    fn peek_pat(&self) -> Option<TokenPat> {
        self.peek().map(Token::pat)
    }

    /// Return whether the next token matches the pattern.
    fn peek_is(&self, p: impl Into<TokenPat>) -> bool {
        self.peek_ahead_is(p, 0)
    }

    /// Return whether the token `offset` tokens ahead matches the pattern.
    ///
    /// Looking past the end of the input never matches.
    fn peek_ahead_is(&self, p: impl Into<TokenPat>, offset: usize) -> bool {
        self.tokens.get(self.index + offset)
            .is_some_and(|t| p.into().matches(t))
    }

    /// Look at the location of the next token in the input
    /// (or the last token if there are none left).
    fn peek_loc(&self) -> Loc {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or_else(Loc::unknown, |t| t.loc().clone())
    }

    /// How the next token is described in an error message.
    fn found(&self) -> String {
        self.peek().map_or_else(|| String::from("end of input"), ToString::to_string)
    }

    /// The error of advancing past the end of the input.
    fn no_token(&self) -> FullParseErr {
        ParseErr::NoTokenAt(self.index).at(self.peek_loc())
    }

    fn expected_expr(&self) -> FullParseErr {
        ParseErr::ExpectedExpr(self.found()).at(self.peek_loc())
    }

    /// Run a rule one nesting level deeper.
    ///
    /// Recursive rules go through here, so input nested past [`MAX_DEPTH`]
    /// is an error instead of exhausting the stack.
    fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseErr::NestingTooDeep.at(self.peek_loc()));
        }

        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    /// Consume the next token in the input and return it.
    fn next_token(&mut self) -> ParseResult<&Token> {
        if self.index >= self.tokens.len() {
            return Err(self.no_token());
        }

        self.index += 1;
        Ok(&self.tokens[self.index - 1])
    }

    /// Return whether the next token matches the specified pattern,
    /// and consume the token from input if it does.
    fn match1(&mut self, p: impl Into<TokenPat>) -> bool {
        let matched = self.peek_is(p);
        if matched {
            self.index += 1;
        }
        matched
    }

    /// If the next token matches one of the specified patterns,
    /// consume the token from input and return the pattern it matched.
    fn match_n(&mut self, one_of: &[TokenPat]) -> Option<TokenPat> {
        let t = self.peek()?;
        let &p = one_of.iter().find(|p| p.matches(t))?;

        self.index += 1;
        Some(p)
    }

    /// Expect that the next token matches the specified pattern.
    ///
    /// Error if the next token does not.
    fn expect1(&mut self, p: impl Into<TokenPat>) -> ParseResult<()> {
        let p = p.into();

        match self.peek() {
            Some(t) if p.matches(t) => {
                self.index += 1;
                Ok(())
            },
            Some(_) => Err(ParseErr::ExpectedTokens { expected: vec![p], found: self.found() }.at(self.peek_loc())),
            None => Err(self.no_token())
        }
    }

    /// Expect that the next token is an identifier token.
    ///
    /// Return the identifier's String,
    /// or error if the token is not an identifier token.
    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(t) if t.tag() == Tag::Identifier => {
                let ident = t.text().to_string();
                self.index += 1;
                Ok(ident)
            },
            Some(_) => Err(ParseErr::ExpectedIdent(self.found()).at(self.peek_loc())),
            None => Err(self.no_token())
        }
    }

    /// Skip over any empty statements (newlines and semicolons).
    fn skip_separators(&mut self) {
        while self.match_n(&[token!(@t Newline), token![;]]).is_some() {}
    }

    /// Whether the next token ends the current statement.
    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek().map(Token::tag),
            None | Some(Tag::Newline | Tag::Semicolon | Tag::Dedent | Tag::Eof)
        )
    }

    /// Expect that the current statement ends here.
    ///
    /// A newline or semicolon is consumed. A dedent or EOF also ends the statement,
    /// but is left for the enclosing block.
    fn expect_stmt_end(&mut self) -> ParseResult<()> {
        match self.peek().map(Token::tag) {
            Some(Tag::Newline | Tag::Semicolon) => {
                self.index += 1;
                Ok(())
            },
            Some(Tag::Dedent | Tag::Eof) => Ok(()),
            Some(_) => Err(ParseErr::ExpectedStmtEnd(self.found()).at(self.peek_loc())),
            None => Err(self.no_token()),
        }
    }

    /// Expect that the next tokens represent an indented block.
    ///
    /// Return the block enclosing the vector of statements,
    /// or error if the tokens do not represent a block.
    fn expect_block(&mut self) -> ParseResult<ast::Block> {
        self.nested(Parser::expect_block_inner)
    }

    fn expect_block_inner(&mut self) -> ParseResult<ast::Block> {
        self.expect1(Tag::Newline)?;
        let start = self.peek_loc();
        self.expect1(Tag::Indent)?;

        let mut stmts = vec![];
        loop {
            self.skip_separators();

            match self.peek().map(Token::tag) {
                Some(Tag::Dedent) => {
                    self.index += 1;
                    break;
                },
                Some(Tag::Indent) => Err(ParseErr::UnexpectedIndent.at(self.peek_loc()))?,
                Some(_) => stmts.push(self.expect_stmt()?),
                None => Err(self.no_token())?,
            }
        }

        if stmts.is_empty() {
            Err(ParseErr::EmptyBlock.at(start))?;
        }
        Ok(ast::Block(stmts))
    }

    /// Expect that the next tokens represent values of type T separated by commas
    /// (optionally with a terminating comma), followed by the closing token.
    ///
    /// This function requires a function that represents the **match** function for type T.
    /// If an item is missing, `or_else` creates the error from the token that was found.
    fn expect_closing_tuple_of<T, F>(
        &mut self, f: F, close_with: TokenPat, or_else: fn(String) -> ParseErr
    ) -> ParseResult<Vec<T>>
        where F: Fn(&mut Self) -> ParseResult<Option<T>>
    {
        let mut items = vec![];

        loop {
            if self.match1(close_with) { break; }

            let item = f(self)?
                .ok_or_else(|| or_else(self.found()).at(self.peek_loc()))?;
            items.push(item);

            if !self.match1(token![,]) {
                if self.match1(close_with) { break; }

                Err(ParseErr::ExpectedTokens {
                    expected: vec![token![,], close_with],
                    found: self.found()
                }.at(self.peek_loc()))?;
            }
        }

        Ok(items)
    }

    ///// STATEMENTS

    /// Expect that the next tokens represent a statement, including its terminator.
    ///
    /// Return the statement,
    /// or error if the tokens do not represent a statement.
    fn expect_stmt(&mut self) -> ParseResult<ast::Stmt> {
        let loc = self.peek_loc();
        tracing::trace!(line = loc.line(), column = loc.column(), token = %self.found(), "statement");

        let st = match self.peek_pat() {
            Some(token![fn] | token![pub]) => ast::Stmt::FunDecl(self.expect_fun()?),
            Some(token![if])                => self.expect_if()?,
            Some(token![while] | token![until]) => self.expect_while()?,
            Some(token![for])      => self.expect_for()?,
            Some(token![match])    => self.expect_match()?,
            Some(token![wrap])     => self.expect_wrap()?,
            Some(token![class])    => ast::Stmt::Class(self.expect_class()?),
            Some(token![alias])    => self.expect_alias()?,
            Some(token![assert])   => self.expect_assert()?,
            Some(token![import])   => self.expect_import()?,
            Some(token![from])     => self.expect_from_import()?,
            Some(token![return] | token![<<<]) => self.expect_return()?,
            Some(token![break])    => { self.next_token()?; ast::Stmt::Break },
            Some(token![continue]) => { self.next_token()?; ast::Stmt::Continue },
            Some(token![pass])     => { self.next_token()?; ast::Stmt::Pass },
            Some(TokenPat::Tag(Tag::Identifier))
                if self.peek_ahead_is(token![:=], 1) || self.peek_ahead_is(token![:], 1)
                => self.expect_init()?,
            _ => self.expect_expr_stmt()?,
        };

        if !st.ends_with_block() {
            self.expect_stmt_end()?;
        }
        Ok(st)
    }

    /// Expect a variable initialization (`x := 1`, `x: int := 1`).
    fn expect_init(&mut self) -> ParseResult<ast::Stmt> {
        let ident = self.expect_ident()?;
        let ty = match self.match1(token![:]) {
            true  => Some(self.expect_type()?),
            false => None,
        };
        self.expect1(token![:=])?;
        let value = self.expect_expr()?;

        Ok(ast::Stmt::Init { ident, ty, value })
    }

    /// Expect a statement that starts with an expression.
    ///
    /// This is an expression, an assignment, a pipe assignment, or a pipeline.
    fn expect_expr_stmt(&mut self) -> ParseResult<ast::Stmt> {
        let target_loc = self.peek_loc();
        let e = self.expect_expr()?;

        if self.match1(token![->=]) {
            if !e.is_assignable() {
                Err(ParseErr::InvalidAssignTarget.at(target_loc))?;
            }
            let stages = self.expect_stages()?;

            return Ok(ast::Stmt::PipeAssign { target: e, stages });
        }

        if let Some(op) = self.match_assign_op() {
            if !e.is_assignable() {
                Err(ParseErr::InvalidAssignTarget.at(target_loc))?;
            }
            let value = self.expect_expr()?;

            return Ok(ast::Stmt::Assign { target: e, op, value });
        }

        match e {
            ast::Expr::Pipeline(p) => Ok(ast::Stmt::Pipeline(p)),
            e => Ok(ast::Stmt::Expr(e)),
        }
    }

    /// If the next token is an assignment operator, consume it and return the operator.
    fn match_assign_op(&mut self) -> Option<op::Assign> {
        let op = op::Assign::try_from(self.peek()?).ok()?;
        self.index += 1;
        Some(op)
    }

    /// Expect a return statement (`return`, `return x`, `<<< x`).
    fn expect_return(&mut self) -> ParseResult<ast::Stmt> {
        self.next_token()?;

        let value = match self.at_stmt_end() {
            true  => None,
            false => Some(self.expect_expr()?),
        };
        Ok(ast::Stmt::Return(value))
    }

    /// Expect an alias statement (`alias existing := new`).
    fn expect_alias(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![alias])?;
        let existing = self.expect_ident()?;
        self.expect1(token![:=])?;
        let ident = self.expect_ident()?;

        Ok(ast::Stmt::Alias { existing, ident })
    }

    /// Expect an assert statement (`assert x`, `assert x, "message"`).
    fn expect_assert(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![assert])?;
        let test = self.expect_expr()?;
        let msg = match self.match1(token![,]) {
            true  => Some(self.expect_expr()?),
            false => None,
        };

        Ok(ast::Stmt::Assert { test, msg })
    }

    /// Expect a dotted module path (`a.b.c`).
    fn expect_dotted(&mut self) -> ParseResult<Vec<String>> {
        let mut path = vec![self.expect_ident()?];
        while self.match1(token![.]) {
            path.push(self.expect_ident()?);
        }
        Ok(path)
    }

    /// Match `as name`.
    fn match_as(&mut self) -> ParseResult<Option<String>> {
        match self.match1(token![as]) {
            true  => self.expect_ident().map(Some),
            false => Ok(None),
        }
    }

    /// Expect an import statement (`import a.b [as c]`).
    fn expect_import(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![import])?;
        let path = self.expect_dotted()?;
        let alias = self.match_as()?;

        Ok(ast::Stmt::Import { path, alias })
    }

    /// Expect a from-import statement (`from a.b import c [as d], e`, `from a import *`).
    fn expect_from_import(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![from])?;
        let path = self.expect_dotted()?;
        self.expect1(token![import])?;

        let names = if self.match1(token![*]) {
            ast::ImportNames::All
        } else {
            let mut names = vec![];
            loop {
                let name = self.expect_ident()?;
                names.push((name, self.match_as()?));

                if !self.match1(token![,]) { break; }
            }
            ast::ImportNames::Names(names)
        };

        Ok(ast::Stmt::FromImport { path, names })
    }

    /// Expect a class declaration, with or without a body.
    fn expect_class(&mut self) -> ParseResult<ast::ClassDecl> {
        self.expect1(token![class])?;
        let ident = self.expect_ident()?;

        let bases = match self.match1(token!["("]) {
            true  => self.expect_closing_tuple_of(Parser::match_expr, token![")"], ParseErr::ExpectedExpr)?,
            false => vec![],
        };

        let block = if self.peek_is(Tag::Newline) && self.peek_ahead_is(Tag::Indent, 1) {
            Some(self.expect_block()?)
        } else {
            None
        };

        Ok(ast::ClassDecl { ident, bases, block })
    }

    /// If the next tokens match a function parameter,
    /// consume the tokens and return the parameter with its location.
    ///
    /// In the construction of a parameter, syntax errors are propagated.
    fn match_param(&mut self) -> ParseResult<Option<(Loc, String, ast::Param)>> {
        if !self.peek_is(Tag::Identifier) {
            return Ok(None);
        }

        let loc = self.peek_loc();
        let ident = self.expect_ident()?;
        let ty = match self.match1(token![:]) {
            true  => Some(self.expect_type()?),
            false => None,
        };
        let default = match self.match1(token![=]) {
            true  => Some(self.expect_expr()?),
            false => None,
        };

        Ok(Some((loc, ident, ast::Param { ty, default })))
    }

    /// Expect that the next tokens represent a function declaration.
    ///
    /// Return the function declaration,
    /// or error if the tokens do not represent a function declaration.
    fn expect_fun(&mut self) -> ParseResult<ast::FunDecl> {
        let public = self.match1(token![pub]);
        self.expect1(token![fn])?;
        let ident = self.expect_ident()?;

        self.expect1(token!["("])?;
        let param_list = self.expect_closing_tuple_of(Parser::match_param, token![")"], ParseErr::ExpectedIdent)?;

        let mut params = IndexMap::new();
        for (loc, name, param) in param_list {
            if params.contains_key(&name) {
                Err(ParseErr::DuplicateParam(name).at(loc))?;
            } else {
                params.insert(name, param);
            }
        }

        let ret = match self.match1(token![~>]) {
            true  => Some(self.expect_type()?),
            false => None,
        };
        let block = self.expect_block()?;

        Ok(ast::FunDecl { public, ident, params, ret, block })
    }

    /// Expect an if statement (`if cond`, `else if cond`, `else`).
    fn expect_if(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![if])?;

        let mut conditionals = vec![(self.expect_expr()?, self.expect_block()?)];
        let mut last = None;

        while self.match1(token![else]) {
            if self.match1(token![if]) {
                conditionals.push((self.expect_expr()?, self.expect_block()?));
            } else {
                last.replace(self.expect_block()?);
                break;
            }
        }

        Ok(ast::Stmt::If { conditionals, last })
    }

    /// Expect a while or until loop.
    fn expect_while(&mut self) -> ParseResult<ast::Stmt> {
        let kind = match self.match_n(&[token![while], token![until]]) {
            Some(token![until]) => ast::LoopKind::Until,
            Some(_) => ast::LoopKind::While,
            None => Err(ParseErr::ExpectedTokens {
                expected: vec![token![while], token![until]],
                found: self.found()
            }.at(self.peek_loc()))?
        };
        let condition = self.expect_expr()?;
        let block = self.expect_block()?;

        Ok(ast::Stmt::While { kind, condition, block })
    }

    /// Expect a for loop (`for i in 1..10`, `for 0..3`, `for x in xs`).
    fn expect_for(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![for])?;

        let ident = if self.peek_is(Tag::Identifier) && self.peek_ahead_is(token![in], 1) {
            let ident = self.expect_ident()?;
            self.expect1(token![in])?;
            Some(ident)
        } else {
            None
        };

        let iterable = self.expect_iterable()?;
        let block = self.expect_block()?;

        Ok(ast::Stmt::For { ident, iterable, block })
    }

    /// Expect what a for loop iterates over.
    fn expect_iterable(&mut self) -> ParseResult<ast::Iterable> {
        fn is_endpoint(e: &ast::Expr) -> bool {
            matches!(e, ast::Expr::Literal(ast::Literal::Int(_)) | ast::Expr::Ident(_))
        }

        let start_loc = self.peek_loc();
        if self.peek_is(token![..]) || self.peek_is(token![..=]) {
            Err(ParseErr::InvalidRangeEndpoint.at(start_loc.clone()))?;
        }
        let start = self.expect_expr()?;

        let Some(range_op) = self.match_n(&[token![..], token![..=]]) else {
            return Ok(ast::Iterable::Expr(start));
        };

        let end_loc = self.peek_loc();
        let end = self.match_expr()?;

        if !is_endpoint(&start) {
            Err(ParseErr::InvalidRangeEndpoint.at(start_loc))?;
        }
        let end = end.filter(is_endpoint)
            .ok_or_else(|| ParseErr::InvalidRangeEndpoint.at(end_loc))?;

        Ok(ast::Iterable::Range { start, end, inclusive: range_op == token![..=] })
    }

    /// Expect a match statement and its case arms.
    fn expect_match(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![match])?;
        let subject = self.expect_expr()?;

        self.expect1(Tag::Newline)?;
        let start = self.peek_loc();
        self.expect1(Tag::Indent)?;

        let mut arms = vec![];
        loop {
            self.skip_separators();
            if self.match1(Tag::Dedent) { break; }

            self.expect1(token![case])?;
            let pattern = self.expect_expr()?;
            let guard = match self.match1(token![if]) {
                true  => Some(self.expect_expr()?),
                false => None,
            };
            let block = self.expect_block()?;

            arms.push(ast::MatchArm { pattern, guard, block });
        }

        if arms.is_empty() {
            Err(ParseErr::EmptyBlock.at(start))?;
        }
        Ok(ast::Stmt::Match { subject, arms })
    }

    /// Expect a wrap statement (`wrap a, b(1)`).
    fn expect_wrap(&mut self) -> ParseResult<ast::Stmt> {
        self.expect1(token![wrap])?;

        let mut targets = vec![];
        loop {
            let ident = self.expect_ident()?;
            let args = match self.match1(token!["("]) {
                true  => Some(self.expect_args()?),
                false => None,
            };
            targets.push(ast::WrapTarget { ident, args });

            if !self.match1(token![,]) || self.peek_is(Tag::Newline) { break; }
        }
        let block = self.expect_block()?;

        Ok(ast::Stmt::Wrap { targets, block })
    }

    ///// PIPELINES

    /// Expect one stage, followed by any number of `-> stage`.
    fn expect_stages(&mut self) -> ParseResult<Vec<ast::PipeStage>> {
        let mut stages = vec![self.expect_stage()?];
        while self.match1(token![->]) {
            stages.push(self.expect_stage()?);
        }
        Ok(stages)
    }

    /// Expect a pipeline stage (`f`, `a.f(x)`, `.method()`, `f: a, b`).
    fn expect_stage(&mut self) -> ParseResult<ast::PipeStage> {
        let implicit_receiver = self.match1(token![.]);

        let mut path = vec![self.expect_stage_ident()?];
        while self.match1(token![.]) {
            path.push(self.expect_stage_ident()?);
        }

        let args = if self.match1(token!["("]) {
            ast::StageArgs::Call(self.expect_args()?)
        } else if self.match1(token![:]) {
            let mut exprs = vec![self.expect_expr()?];
            while self.match1(token![,]) {
                exprs.push(self.expect_expr()?);
            }
            ast::StageArgs::Colon(exprs)
        } else {
            ast::StageArgs::Bare
        };

        Ok(ast::PipeStage { implicit_receiver, path, args })
    }

    fn expect_stage_ident(&mut self) -> ParseResult<String> {
        match self.peek_is(Tag::Identifier) {
            true  => self.expect_ident(),
            false => Err(ParseErr::MissingStageIdent(self.found()).at(self.peek_loc())),
        }
    }

    ///// TYPES

    /// Match one alternative of a type (`int`, `list[str]`).
    fn match_type_term(&mut self) -> ParseResult<Option<ast::TypeTerm>> {
        let ident = match self.peek() {
            Some(t) if t.tag() == Tag::Identifier || token![None].matches(t) => t.text().to_string(),
            _ => return Ok(None),
        };
        self.index += 1;

        let mut params = vec![];
        if self.match1(token!["["]) {
            let loc = self.peek_loc();
            params = self.expect_closing_tuple_of(Parser::match_type, token!["]"], ParseErr::ExpectedType)?;

            if params.is_empty() {
                // list[]
                //      ^
                Err(ParseErr::ExpectedType(String::from("']'")).at(loc))?;
            }
        }

        Ok(Some(ast::TypeTerm { ident, params }))
    }

    fn match_type(&mut self) -> ParseResult<Option<ast::Type>> {
        self.nested(Parser::match_type_inner)
    }

    fn match_type_inner(&mut self) -> ParseResult<Option<ast::Type>> {
        let Some(first) = self.match_type_term()? else { return Ok(None) };

        let mut terms = vec![first];
        while self.match1(token![|]) {
            let term = self.match_type_term()?
                .ok_or_else(|| ParseErr::ExpectedType(self.found()).at(self.peek_loc()))?;
            terms.push(term);
        }

        Ok(Some(ast::Type(terms)))
    }

    /// Expect that the next tokens represent a type expression.
    ///
    /// Return the type expression,
    /// or error if the tokens do not represent a type expression.
    fn expect_type(&mut self) -> ParseResult<ast::Type> {
        self.match_type()?
            .ok_or_else(|| ParseErr::ExpectedType(self.found()).at(self.peek_loc()))
    }

    ///// EXPRESSION MATCHING
    /// Note that for expression matching,
    /// the labeled functions actually try to match an operation
    /// OR any operation with a higher precedence.
    ///
    /// f.e. match_addsub matches (+, -) but ALSO (*, /, //, %), and unary operations, etc.

    /// If the next tokens represent an expression, return the expression
    /// or return none if the tokens do not represent an expression.
    ///
    /// Note that syntax errors are propagated through this function.
    fn match_expr(&mut self) -> ParseResult<Option<ast::Expr>> {
        self.nested(Parser::match_pipeline)
    }

    /// Match a pipeline (`xs -> sorted -> .reverse()`), or any expression without one.
    fn match_pipeline(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(source) = self.match_ternary()? else { return Ok(None) };

        if !self.match1(token![->]) {
            return Ok(Some(source));
        }
        let stages = self.expect_stages()?;

        Ok(Some(ast::Expr::Pipeline(ast::Pipeline { source: Box::new(source), stages })))
    }

    /// Expect that the next tokens represent an expression
    ///
    /// Return the expression,
    /// or error if the tokens do not represent a expression.
    fn expect_expr(&mut self) -> ParseResult<ast::Expr> {
        self.match_expr()?
            .ok_or_else(|| self.expected_expr())
    }

    /// If the next token is one of the given binary operators, consume it and return the operator.
    fn match_binary(&mut self, ops: &[TokenPat]) -> Option<op::Binary> {
        let t = self.peek()?;
        if !ops.iter().any(|p| p.matches(t)) {
            return None;
        }

        let op = op::Binary::try_from(t).ok()?;
        self.index += 1;
        Some(op)
    }

    /// Match a conditional expression. (a ?? b !! c)
    ///
    /// Both branches are full expressions, so either may hold another conditional or a pipeline.
    fn match_ternary(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(condition) = self.match_or()? else { return Ok(None) };

        if !self.match1(token![??]) {
            return Ok(Some(condition));
        }

        let then = self.match_expr()?
            .ok_or_else(|| self.expected_expr())?;
        self.expect1(token![!!])?;
        let otherwise = self.match_expr()?
            .ok_or_else(|| self.expected_expr())?;

        Ok(Some(ast::Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise)
        }))
    }

    // This creates the matching function for:
    // logical OR, logical AND
    left_assoc_rules! {
        match_or  = match_and ( (or)  match_and )*;
        match_and = match_not ( (and) match_not )*;
    }

    /// Match a logical not. (not x)
    fn match_not(&mut self) -> ParseResult<Option<ast::Expr>> {
        if !self.match1(token![not]) {
            return self.match_cmp();
        }

        let expr = self.nested(Parser::match_not)?
            .ok_or_else(|| self.expected_expr())?;

        Ok(Some(ast::Expr::UnaryOp { op: op::Unary::Not, expr: Box::new(expr) }))
    }

    /// Match a comparison operation. (2 < 3, a is not b, a not in b)
    ///
    /// Chained comparisons fold to the left.
    fn match_cmp(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(mut e) = self.match_bor()? else { return Ok(None) };

        while let Some(op) = self.match_cmp_op()? {
            let right = self.match_bor()?
                .ok_or_else(|| self.expected_expr())?;

            e = ast::Expr::Comparison {
                op,
                left: Box::new(e),
                right: Box::new(right)
            };
        }

        Ok(Some(e))
    }

    /// If the next tokens are a comparison operator, consume them and return the operator.
    ///
    /// `is not` and `not in` are taken as one operator.
    fn match_cmp_op(&mut self) -> ParseResult<Option<op::Cmp>> {
        let (op, width) = match self.peek_pat() {
            Some(token![is]) if self.peek_ahead_is(token![not], 1) => (op::Cmp::IsNot, 2),
            Some(token![not]) if self.peek_ahead_is(token![in], 1) => (op::Cmp::NotIn, 2),
            Some(token![not]) => {
                Err(ParseErr::UnknownCmpOp(String::from("not")).at(self.peek_loc()))?
            },
            _ => match self.peek().and_then(|t| op::Cmp::try_from(t).ok()) {
                Some(op) => (op, 1),
                None => return Ok(None),
            }
        };

        self.index += width;
        Ok(Some(op))
    }

    // This creates the matching function for:
    // bitwise OR, bitwise XOR, bitwise AND
    left_assoc_rules! {
        match_bor  = match_bxor  ( (|) match_bxor  )*;
        match_bxor = match_band  ( (~) match_band  )*;
        match_band = match_shift ( (&) match_shift )*;
    }

    /// Match a shift operation. (a << b, a >> b)
    ///
    /// Shifts group to the right: `a << b << c` is `a << (b << c)`.
    fn match_shift(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(left) = self.match_addsub()? else { return Ok(None) };

        let Some(op) = self.match_binary(&[token![<<], token![>>]]) else {
            return Ok(Some(left));
        };
        let right = self.nested(Parser::match_shift)?
            .ok_or_else(|| self.expected_expr())?;

        Ok(Some(ast::Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) }))
    }

    // This creates the matching function for:
    // addition/subtraction (+, -)
    // multiplication, division, floor division, modulo (*, /, //, %)
    left_assoc_rules! {
        match_addsub = match_muldiv ( ( + , - ) match_muldiv )* ;
        match_muldiv = match_unary ( ( * , / , "//" , % ) match_unary )* ;
    }

    /// Match a unary operation. (+expr, -expr, ~expr)
    fn match_unary(&mut self) -> ParseResult<Option<ast::Expr>> {
        let op = self.peek()
            .filter(|t| [token![+], token![-], token![~]].iter().any(|p| p.matches(t)))
            .and_then(|t| op::Unary::try_from(t).ok());

        let Some(op) = op else { return self.match_power() };
        self.index += 1;

        let expr = self.nested(Parser::match_unary)?
            .ok_or_else(|| self.expected_expr())?;

        Ok(Some(ast::Expr::UnaryOp { op, expr: Box::new(expr) }))
    }

    /// Match an exponentiation. (a ^ b)
    ///
    /// The exponent is parsed at the unary level, so `a ^ b ^ c` is `a ^ (b ^ c)`
    /// and `a ^ -b` is `a ^ (-b)`.
    fn match_power(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(base) = self.match_postfix()? else { return Ok(None) };

        if !self.match1(token![^]) {
            return Ok(Some(base));
        }
        let exp = self.nested(Parser::match_unary)?
            .ok_or_else(|| self.expected_expr())?;

        Ok(Some(ast::Expr::BinaryOp {
            op: op::Binary::Pow,
            left: Box::new(base),
            right: Box::new(exp)
        }))
    }

    /// Match attribute access, calls, and subscripts. (a.b, f(1, 2), a[1], a[1:2])
    fn match_postfix(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(mut e) = self.match_unit()? else { return Ok(None) };

        while let Some(delim) = self.match_n(&[token![.], token!["("], token!["["]]) {
            e = match delim {
                token![.] => ast::Expr::Attr {
                    obj: Box::new(e),
                    attr: self.expect_ident()?
                },
                token!["("] => ast::Expr::Call {
                    funct: Box::new(e),
                    args: self.expect_args()?
                },
                _ => {
                    let loc = self.peek_loc();
                    let found = self.found();
                    let subscripts = self.expect_closing_tuple_of(Parser::match_subscript, token!["]"], ParseErr::ExpectedExpr)?;
                    if subscripts.is_empty() {
                        Err(ParseErr::ExpectedExpr(found).at(loc))?;
                    }

                    ast::Expr::Index { obj: Box::new(e), subscripts }
                }
            };
        }

        Ok(Some(e))
    }

    /// Match one entry of a subscript (an index or a slice).
    fn match_subscript(&mut self) -> ParseResult<Option<ast::Subscript>> {
        let start = self.match_expr()?;
        if !self.match1(token![:]) {
            return Ok(start.map(ast::Subscript::Index));
        }

        let stop = self.match_expr()?;
        let step = match self.match1(token![:]) {
            true  => self.match_expr()?,
            false => None,
        };

        Ok(Some(ast::Subscript::Slice { start, stop, step }))
    }

    /// Match a call argument (`x`, `key=x`) along with its location.
    fn match_arg(&mut self) -> ParseResult<Option<(Loc, ast::Arg)>> {
        let loc = self.peek_loc();

        if self.peek_is(Tag::Identifier) && self.peek_ahead_is(token![=], 1) {
            let ident = self.expect_ident()?;
            self.expect1(token![=])?;
            let value = self.expect_expr()?;

            return Ok(Some((loc, ast::Arg { ident: Some(ident), value })));
        }

        Ok(self.match_expr()?.map(|value| (loc, ast::Arg::positional(value))))
    }

    /// Expect the arguments of a call, after its opening parenthesis.
    fn expect_args(&mut self) -> ParseResult<Vec<ast::Arg>> {
        let args = self.expect_closing_tuple_of(Parser::match_arg, token![")"], ParseErr::ExpectedExpr)?;

        let mut seen = HashSet::new();
        for (loc, arg) in &args {
            if let Some(ident) = &arg.ident {
                if !seen.insert(ident) {
                    Err(ParseErr::DuplicateKwarg(ident.clone()).at(loc.clone()))?;
                }
            }
        }

        Ok(args.into_iter().map(|(_, arg)| arg).collect())
    }

    /// Match a primary expression.
    fn match_unit(&mut self) -> ParseResult<Option<ast::Expr>> {
        let Some(p) = self.peek_pat() else { return Ok(None) };

        let unit = match p {
            TokenPat::Tag(Tag::Identifier) => ast::Expr::Ident(self.expect_ident()?),
            | TokenPat::Tag(Tag::Integer | Tag::Float | Tag::Str)
            | token![True]
            | token![False]
            | token![None] => self.expect_literal()?,
            token!["("] => self.expect_paren()?,
            token!["["] => {
                self.next_token()?;
                ast::Expr::List(self.expect_closing_tuple_of(Parser::match_expr, token!["]"], ParseErr::ExpectedExpr)?)
            },
            token!["${"] => {
                self.next_token()?;
                ast::Expr::Set(self.expect_closing_tuple_of(Parser::match_expr, token!["}"], ParseErr::ExpectedExpr)?)
            },
            token!["%{"] => {
                self.next_token()?;
                ast::Expr::Map(self.expect_closing_tuple_of(Parser::match_entry, token!["}"], ParseErr::ExpectedExpr)?)
            },
            _ => return Ok(None)
        };

        Ok(Some(unit))
    }

    /// Expect a parenthesized expression or a tuple.
    ///
    /// `()` is an empty tuple, `(a)` is just `a`, and `(a,)` is a tuple of one.
    fn expect_paren(&mut self) -> ParseResult<ast::Expr> {
        self.expect1(token!["("])?;
        if self.match1(token![")"]) {
            return Ok(ast::Expr::Tuple(vec![]));
        }

        let first = self.expect_expr()?;
        if self.match1(token![")"]) {
            return Ok(first);
        }
        if !self.match1(token![,]) {
            Err(ParseErr::ExpectedTokens {
                expected: vec![token![,], token![")"]],
                found: self.found()
            }.at(self.peek_loc()))?;
        }

        let mut items = vec![first];
        items.extend(self.expect_closing_tuple_of(Parser::match_expr, token![")"], ParseErr::ExpectedExpr)?);
        Ok(ast::Expr::Tuple(items))
    }

    /// Match a map entry (k: v)
    fn match_entry(&mut self) -> ParseResult<Option<(ast::Expr, ast::Expr)>> {
        let Some(k) = self.match_expr()? else { return Ok(None) };
        self.expect1(token![:])?;
        let v = self.expect_expr()?;

        Ok(Some((k, v)))
    }

    /// Expect a literal (numeric, str, bool, None)
    fn expect_literal(&mut self) -> ParseResult<ast::Expr> {
        let t = self.next_token()?;
        let loc = t.loc().clone();

        let lit = match t.pat() {
            TokenPat::Tag(Tag::Integer) => ast::Literal::from_int(t.text())
                .ok_or_else(|| ParseErr::CannotParseNumeric(t.text().to_string()).at(loc))?,
            TokenPat::Tag(Tag::Float) => ast::Literal::from_float(t.text())
                .ok_or_else(|| ParseErr::CannotParseNumeric(t.text().to_string()).at(loc))?,
            TokenPat::Tag(Tag::Str) => unescape(t.text())
                .map(ast::Literal::Str)
                .map_err(|e| e.at(loc))?,
            token![True]  => ast::Literal::Bool(true),
            token![False] => ast::Literal::Bool(false),
            token![None]  => ast::Literal::None,
            _ => Err(ParseErr::ExpectedExpr(t.to_string()).at(loc))?
        };

        Ok(ast::Expr::Literal(lit))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::err::QzErr;
    use crate::lexer::tokenize;

    use super::*;

    macro_rules! program {
        ($($e:expr),* $(,)?) => {
            Program(vec![$($e),*])
        }
    }

    /// Unwrap the result (or print error if not possible).
    fn unwrap_fe<T, E: QzErr>(result: Result<T, Diagnostic<E>>) -> T {
        match result {
            Ok(t) => t,
            Err(e) => panic!("{}", e.full_msg()),
        }
    }
    /// Lex and parse string.
    fn parse_str(s: &str) -> ParseResult<Program> {
        parse(unwrap_fe(tokenize(s)))
    }
    /// Assert that the string provided parses into the program.
    fn assert_parse(input: &str, r: Program) {
        assert_eq!(unwrap_fe(parse_str(input)), r)
    }
    /// Assert that the string provided errors with the given error when parsed.
    fn assert_parse_fail(input: &str, result: ParseErr) {
        match parse_str(input) {
            Ok(t)  => panic!("Parsing resulted in value: {t:?}"),
            Err(e) => assert_eq!(e, result)
        }
    }
    /// Parse a string that holds a single expression statement.
    fn parse_expr(input: &str) -> Expr {
        match unwrap_fe(parse_str(input)).0.as_slice() {
            [Stmt::Expr(e)] => e.clone(),
            stmts => panic!("expected one expression statement, got {stmts:?}"),
        }
    }

    fn ident(s: &str) -> Expr {
        Expr::Ident(String::from(s))
    }
    fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Int(n))
    }
    fn string(s: &str) -> Expr {
        Expr::Literal(Literal::Str(String::from(s)))
    }
    fn bin(op: op::Binary, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) }
    }
    fn cmp(op: op::Cmp, left: Expr, right: Expr) -> Expr {
        Expr::Comparison { op, left: Box::new(left), right: Box::new(right) }
    }
    fn unary(op: op::Unary, expr: Expr) -> Expr {
        Expr::UnaryOp { op, expr: Box::new(expr) }
    }
    fn call(funct: Expr, args: Vec<Arg>) -> Expr {
        Expr::Call { funct: Box::new(funct), args }
    }
    fn block(stmts: Vec<Stmt>) -> Block {
        Block(stmts)
    }

    #[test]
    fn bin_op_test() {
        assert_parse("2 + 3", program![
            Stmt::Expr(bin(op::Binary::Add, int(2), int(3)))
        ]);

        assert_parse("1 + 2 * 3", program![
            Stmt::Expr(bin(op::Binary::Add, int(1), bin(op::Binary::Mul, int(2), int(3))))
        ]);

        assert_eq!(
            parse_expr("a - b - c"),
            bin(op::Binary::Sub, bin(op::Binary::Sub, ident("a"), ident("b")), ident("c"))
        );
        assert_eq!(
            parse_expr("a // b % c"),
            bin(op::Binary::Mod, bin(op::Binary::FloorDiv, ident("a"), ident("b")), ident("c"))
        );
        assert_eq!(
            parse_expr("(1 + 2) * 3"),
            bin(op::Binary::Mul, bin(op::Binary::Add, int(1), int(2)), int(3))
        );
    }

    #[test]
    fn bitwise_test() {
        // | binds loosest, then ~, then &
        assert_eq!(
            parse_expr("a | b ~ c & d"),
            bin(op::Binary::BitOr,
                ident("a"),
                bin(op::Binary::BitXor, ident("b"), bin(op::Binary::BitAnd, ident("c"), ident("d")))
            )
        );

        // shift groups to the right
        assert_eq!(
            parse_expr("a << b >> c"),
            bin(op::Binary::Shl, ident("a"), bin(op::Binary::Shr, ident("b"), ident("c")))
        );
        assert_eq!(
            parse_expr("a & b << 1 + 2"),
            bin(op::Binary::BitAnd,
                ident("a"),
                bin(op::Binary::Shl, ident("b"), bin(op::Binary::Add, int(1), int(2)))
            )
        );
    }

    #[test]
    fn power_test() {
        assert_eq!(
            parse_expr("2 ^ 3 ^ 2"),
            bin(op::Binary::Pow, int(2), bin(op::Binary::Pow, int(3), int(2)))
        );
        assert_eq!(
            parse_expr("-2 ^ 2"),
            unary(op::Unary::Minus, bin(op::Binary::Pow, int(2), int(2)))
        );
        assert_eq!(
            parse_expr("2 ^ -1"),
            bin(op::Binary::Pow, int(2), unary(op::Unary::Minus, int(1)))
        );
        assert_eq!(
            parse_expr("a * b ^ c"),
            bin(op::Binary::Mul, ident("a"), bin(op::Binary::Pow, ident("b"), ident("c")))
        );
    }

    #[test]
    fn unary_ops_test() {
        assert_eq!(parse_expr("+3"), unary(op::Unary::Plus, int(3)));
        assert_eq!(
            parse_expr("-~+x"),
            unary(op::Unary::Minus, unary(op::Unary::BitNot, unary(op::Unary::Plus, ident("x"))))
        );
        assert_eq!(
            parse_expr("not not a"),
            unary(op::Unary::Not, unary(op::Unary::Not, ident("a")))
        );
        assert_eq!(
            parse_expr("not a == b"),
            unary(op::Unary::Not, cmp(op::Cmp::Eq, ident("a"), ident("b")))
        );
        assert_eq!(
            parse_expr("a and not b or c"),
            bin(op::Binary::Or,
                bin(op::Binary::And, ident("a"), unary(op::Unary::Not, ident("b"))),
                ident("c")
            )
        );
    }

    #[test]
    fn cmp_test() {
        assert_eq!(parse_expr("x is not y"), cmp(op::Cmp::IsNot, ident("x"), ident("y")));
        assert_eq!(parse_expr("x not in y"), cmp(op::Cmp::NotIn, ident("x"), ident("y")));
        assert_eq!(parse_expr("x is y"), cmp(op::Cmp::Is, ident("x"), ident("y")));
        assert_eq!(parse_expr("x in y"), cmp(op::Cmp::In, ident("x"), ident("y")));

        // chains fold left
        assert_eq!(
            parse_expr("1 < x <= 10"),
            cmp(op::Cmp::Le, cmp(op::Cmp::Lt, int(1), ident("x")), int(10))
        );
        assert_eq!(
            parse_expr("a | b != c"),
            cmp(op::Cmp::Ne, bin(op::Binary::BitOr, ident("a"), ident("b")), ident("c"))
        );

        assert_parse_fail("a not b", ParseErr::UnknownCmpOp(String::from("not")));
        assert_parse_fail("a < ", ParseErr::ExpectedExpr(String::from("EOF")));
    }

    #[test]
    fn ternary_test() {
        assert_eq!(
            parse_expr("x > 0 ?? 'pos' !! 'neg'"),
            Expr::Ternary {
                condition: Box::new(cmp(op::Cmp::Gt, ident("x"), int(0))),
                then: Box::new(string("pos")),
                otherwise: Box::new(string("neg")),
            }
        );

        // either branch may itself be a conditional
        assert_eq!(
            parse_expr("a ?? b ?? c !! d !! e"),
            Expr::Ternary {
                condition: Box::new(ident("a")),
                then: Box::new(Expr::Ternary {
                    condition: Box::new(ident("b")),
                    then: Box::new(ident("c")),
                    otherwise: Box::new(ident("d")),
                }),
                otherwise: Box::new(ident("e")),
            }
        );

        // nests to the right
        assert_eq!(
            parse_expr("a ?? b !! c ?? d !! e"),
            Expr::Ternary {
                condition: Box::new(ident("a")),
                then: Box::new(ident("b")),
                otherwise: Box::new(Expr::Ternary {
                    condition: Box::new(ident("c")),
                    then: Box::new(ident("d")),
                    otherwise: Box::new(ident("e")),
                }),
            }
        );

        assert_parse_fail("a ?? b", ParseErr::ExpectedTokens {
            expected: vec![token![!!]],
            found: String::from("EOF")
        });
    }

    #[test]
    fn literal_test() {
        assert_eq!(parse_expr("1_000"), int(1000));
        assert_eq!(parse_expr("1.5"), Expr::Literal(Literal::Float(1.5)));
        assert_eq!(parse_expr(".5"), Expr::Literal(Literal::Float(0.5)));
        assert_eq!(parse_expr("2."), Expr::Literal(Literal::Float(2.0)));
        assert_eq!(parse_expr("True"), Expr::Literal(Literal::Bool(true)));
        assert_eq!(parse_expr("False"), Expr::Literal(Literal::Bool(false)));
        assert_eq!(parse_expr("None"), Expr::Literal(Literal::None));

        assert_parse_fail("99999999999999999999", ParseErr::CannotParseNumeric(String::from("99999999999999999999")));
    }

    #[test]
    fn string_test() {
        assert_eq!(parse_expr(r#""a\tb\n""#), string("a\tb\n"));
        assert_eq!(parse_expr(r#"'it\'s'"#), string("it's"));
        assert_eq!(parse_expr(r#""\\""#), string("\\"));
        assert_eq!(parse_expr(r#""\x41é\U0001F600\o101""#), string("Aé😀A"));
        assert_eq!(parse_expr(r#""\o7z""#), string("\x07z"));
        // unknown escapes stay as written
        assert_eq!(parse_expr(r#""\q""#), string("\\q"));

        assert_parse_fail(r#""\x4""#, ParseErr::InvalidEscape(String::from("\\x")));
        assert_parse_fail(r#""\uD800""#, ParseErr::InvalidEscape(String::from("\\uD800")));
    }

    #[test]
    fn collection_test() {
        assert_eq!(parse_expr("()"), Expr::Tuple(vec![]));
        assert_eq!(parse_expr("(1)"), int(1));
        assert_eq!(parse_expr("(1,)"), Expr::Tuple(vec![int(1)]));
        assert_eq!(parse_expr("(1, 2, 3,)"), Expr::Tuple(vec![int(1), int(2), int(3)]));
        assert_eq!(parse_expr("[]"), Expr::List(vec![]));
        assert_eq!(parse_expr("[1, 2,]"), Expr::List(vec![int(1), int(2)]));
        assert_eq!(parse_expr("${1, 2}"), Expr::Set(vec![int(1), int(2)]));
        assert_eq!(
            parse_expr("%{'a': 1, b: [2]}"),
            Expr::Map(vec![(string("a"), int(1)), (ident("b"), Expr::List(vec![int(2)]))])
        );
        assert_eq!(parse_expr("%{}"), Expr::Map(vec![]));

        // multi-line collection
        assert_eq!(
            parse_expr("[\n    1,\n    2,\n]"),
            Expr::List(vec![int(1), int(2)])
        );

        assert_parse_fail("[1 2]", ParseErr::ExpectedTokens {
            expected: vec![token![,], token!["]"]],
            found: String::from("'2'")
        });
        assert_parse_fail("(1 2)", ParseErr::ExpectedTokens {
            expected: vec![token![,], token![")"]],
            found: String::from("'2'")
        });
        assert_parse_fail("%{a}", ParseErr::ExpectedTokens {
            expected: vec![token![:]],
            found: String::from("'}'")
        });
    }

    #[test]
    fn postfix_test() {
        assert_eq!(
            parse_expr("a.b(1, key=2)[0]"),
            Expr::Index {
                obj: Box::new(call(
                    Expr::Attr { obj: Box::new(ident("a")), attr: String::from("b") },
                    vec![
                        Arg::positional(int(1)),
                        Arg { ident: Some(String::from("key")), value: int(2) },
                    ]
                )),
                subscripts: vec![Subscript::Index(int(0))]
            }
        );

        assert_eq!(
            parse_expr("a[1:5, ::2, :]"),
            Expr::Index {
                obj: Box::new(ident("a")),
                subscripts: vec![
                    Subscript::Slice { start: Some(int(1)), stop: Some(int(5)), step: None },
                    Subscript::Slice { start: None, stop: None, step: Some(int(2)) },
                    Subscript::Slice { start: None, stop: None, step: None },
                ]
            }
        );

        assert_eq!(
            parse_expr("3.real"),
            Expr::Attr { obj: Box::new(int(3)), attr: String::from("real") }
        );

        assert_parse_fail("f(a=1, a=2)", ParseErr::DuplicateKwarg(String::from("a")));
        assert_parse_fail("a[]", ParseErr::ExpectedExpr(String::from("']'")));
        // ".1" lexes as a float
        assert_parse_fail("a.1", ParseErr::ExpectedStmtEnd(String::from("'.1'")));
        assert_parse_fail("a.b.", ParseErr::ExpectedIdent(String::from("EOF")));
    }

    #[test]
    fn init_assign_test() {
        assert_parse("x := 1\nname: str | None := None", program![
            Stmt::Init { ident: String::from("x"), ty: None, value: int(1) },
            Stmt::Init {
                ident: String::from("name"),
                ty: Some(Type(vec![TypeTerm::named("str"), TypeTerm::named("None")])),
                value: Expr::Literal(Literal::None)
            },
        ]);

        assert_parse("x = 2; a.b += 1; c[0] <<= 2", program![
            Stmt::Assign { target: ident("x"), op: op::Assign::Set, value: int(2) },
            Stmt::Assign {
                target: Expr::Attr { obj: Box::new(ident("a")), attr: String::from("b") },
                op: op::Assign::Compound(op::Binary::Add),
                value: int(1)
            },
            Stmt::Assign {
                target: Expr::Index { obj: Box::new(ident("c")), subscripts: vec![Subscript::Index(int(0))] },
                op: op::Assign::Compound(op::Binary::Shl),
                value: int(2)
            },
        ]);

        assert_parse("x ^= 2\nx //= 2\nx ~= 1", program![
            Stmt::Assign { target: ident("x"), op: op::Assign::Compound(op::Binary::Pow), value: int(2) },
            Stmt::Assign { target: ident("x"), op: op::Assign::Compound(op::Binary::FloorDiv), value: int(2) },
            Stmt::Assign { target: ident("x"), op: op::Assign::Compound(op::Binary::BitXor), value: int(1) },
        ]);

        assert_parse_fail("f() = 1", ParseErr::InvalidAssignTarget);
        assert_parse_fail("1 + 1 = 2", ParseErr::InvalidAssignTarget);
        assert_parse_fail("x: int = 1", ParseErr::ExpectedTokens {
            expected: vec![token![:=]],
            found: String::from("'='")
        });
    }

    #[test]
    fn type_test() {
        fn assert_parse_type(input: &str, ty: Type) {
            let tokens = unwrap_fe(tokenize(input));
            assert_eq!(unwrap_fe(Parser::new(tokens).expect_type()), ty)
        }

        assert_parse_type("int", Type(vec![TypeTerm::named("int")]));
        assert_parse_type("dict[str, list[int | str]]", Type(vec![
            TypeTerm {
                ident: String::from("dict"),
                params: vec![
                    Type(vec![TypeTerm::named("str")]),
                    Type(vec![TypeTerm {
                        ident: String::from("list"),
                        params: vec![Type(vec![TypeTerm::named("int"), TypeTerm::named("str")])]
                    }]),
                ]
            }
        ]));

        assert_parse_fail("fn f(x: 1)\n    pass", ParseErr::ExpectedType(String::from("'1'")));
        assert_parse_fail("x: list[] := 1", ParseErr::ExpectedType(String::from("']'")));
    }

    #[test]
    fn pipeline_test() {
        assert_parse("data -> parse -> check(strict=True) -> .reverse()", program![
            Stmt::Pipeline(Pipeline {
                source: Box::new(ident("data")),
                stages: vec![
                    PipeStage { implicit_receiver: false, path: vec![String::from("parse")], args: StageArgs::Bare },
                    PipeStage {
                        implicit_receiver: false,
                        path: vec![String::from("check")],
                        args: StageArgs::Call(vec![
                            Arg { ident: Some(String::from("strict")), value: Expr::Literal(Literal::Bool(true)) }
                        ])
                    },
                    PipeStage { implicit_receiver: true, path: vec![String::from("reverse")], args: StageArgs::Call(vec![]) },
                ]
            })
        ]);

        assert_parse("ys := xs -> itertools.chain: a, b", program![
            Stmt::Init {
                ident: String::from("ys"),
                ty: None,
                value: Expr::Pipeline(Pipeline {
                    source: Box::new(ident("xs")),
                    stages: vec![PipeStage {
                        implicit_receiver: false,
                        path: vec![String::from("itertools"), String::from("chain")],
                        args: StageArgs::Colon(vec![ident("a"), ident("b")])
                    }]
                })
            }
        ]);

        assert_parse("names ->= sorted", program![
            Stmt::PipeAssign {
                target: ident("names"),
                stages: vec![PipeStage { implicit_receiver: false, path: vec![String::from("sorted")], args: StageArgs::Bare }]
            }
        ]);

        // pipelines are expressions, so they nest
        let sorted = || PipeStage { implicit_receiver: false, path: vec![String::from("sorted")], args: StageArgs::Bare };
        assert_eq!(
            parse_expr("f(xs -> sorted)"),
            call(ident("f"), vec![Arg {
                ident: None,
                value: Expr::Pipeline(Pipeline { source: Box::new(ident("xs")), stages: vec![sorted()] })
            }])
        );
        assert_eq!(
            parse_expr("[a -> sorted, b]"),
            Expr::List(vec![
                Expr::Pipeline(Pipeline { source: Box::new(ident("a")), stages: vec![sorted()] }),
                ident("b"),
            ])
        );
        assert_eq!(
            parse_expr("c ?? xs -> sorted !! ys"),
            Expr::Ternary {
                condition: Box::new(ident("c")),
                then: Box::new(Expr::Pipeline(Pipeline { source: Box::new(ident("xs")), stages: vec![sorted()] })),
                otherwise: Box::new(ident("ys")),
            }
        );

        assert_parse_fail("x -> 1", ParseErr::MissingStageIdent(String::from("'1'")));
        assert_parse_fail("x -> .", ParseErr::MissingStageIdent(String::from("EOF")));
    }

    /// Tests if statements.
    #[test]
    fn if_else_test() {
        assert_parse("if x\n    a\n", program![
            Stmt::If { conditionals: vec![(ident("x"), block(vec![Stmt::Expr(ident("a"))]))], last: None }
        ]);

        assert_parse("if x\n    a\nelse if y\n    b\nelse\n    c\nd", program![
            Stmt::If {
                conditionals: vec![
                    (ident("x"), block(vec![Stmt::Expr(ident("a"))])),
                    (ident("y"), block(vec![Stmt::Expr(ident("b"))])),
                ],
                last: Some(block(vec![Stmt::Expr(ident("c"))]))
            },
            Stmt::Expr(ident("d")),
        ]);

        assert_parse_fail("if x\ny", ParseErr::ExpectedTokens {
            expected: vec![TokenPat::Tag(Tag::Indent)],
            found: String::from("'y'")
        });
    }

    #[test]
    fn block_test() {
        // nested blocks close together
        assert_parse("while a\n    if b\n        break\n    continue\npass", program![
            Stmt::While {
                kind: LoopKind::While,
                condition: ident("a"),
                block: block(vec![
                    Stmt::If { conditionals: vec![(ident("b"), block(vec![Stmt::Break]))], last: None },
                    Stmt::Continue,
                ])
            },
            Stmt::Pass,
        ]);

        // a block header followed by NEWLINE INDENT DEDENT
        let mut tokens = unwrap_fe(tokenize("if x\n    y"));
        let removed = tokens.remove(4);
        assert_eq!(removed.tag(), Tag::Identifier);
        assert_eq!(parse(tokens).unwrap_err(), ParseErr::EmptyBlock);

        assert_parse_fail("    x", ParseErr::UnexpectedIndent);
        assert_parse_fail("x\n    y", ParseErr::UnexpectedIndent);
    }

    #[test]
    fn stmt_end_test() {
        assert_parse("a; b\n\nc;", program![
            Stmt::Expr(ident("a")),
            Stmt::Expr(ident("b")),
            Stmt::Expr(ident("c")),
        ]);

        assert_parse_fail("2 2", ParseErr::ExpectedStmtEnd(String::from("'2'")));
        assert_parse_fail("x := 1 y := 2", ParseErr::ExpectedStmtEnd(String::from("'y'")));
    }

    #[test]
    fn loop_test() {
        assert_parse("until done\n    done := step()", program![
            Stmt::While {
                kind: LoopKind::Until,
                condition: ident("done"),
                block: block(vec![
                    Stmt::Init { ident: String::from("done"), ty: None, value: call(ident("step"), vec![]) }
                ])
            }
        ]);

        assert_parse("for i in 1..=n\n    print(i)", program![
            Stmt::For {
                ident: Some(String::from("i")),
                iterable: Iterable::Range { start: int(1), end: ident("n"), inclusive: true },
                block: block(vec![Stmt::Expr(call(ident("print"), vec![Arg::positional(ident("i"))]))])
            }
        ]);

        assert_parse("for 0..3\n    ring()", program![
            Stmt::For {
                ident: None,
                iterable: Iterable::Range { start: int(0), end: int(3), inclusive: false },
                block: block(vec![Stmt::Expr(call(ident("ring"), vec![]))])
            }
        ]);

        assert_parse("for x in xs.items()\n    pass", program![
            Stmt::For {
                ident: Some(String::from("x")),
                iterable: Iterable::Expr(call(
                    Expr::Attr { obj: Box::new(ident("xs")), attr: String::from("items") },
                    vec![]
                )),
                block: block(vec![Stmt::Pass])
            }
        ]);

        assert_parse_fail("for i in 1.5..3\n    pass", ParseErr::InvalidRangeEndpoint);
        assert_parse_fail("for i in 0..n + 1\n    pass", ParseErr::InvalidRangeEndpoint);
        assert_parse_fail("for i in 0..'a'\n    pass", ParseErr::InvalidRangeEndpoint);
        assert_parse_fail("for ..3\n    pass", ParseErr::InvalidRangeEndpoint);
    }

    #[test]
    fn fun_test() {
        let mut params = IndexMap::new();
        params.insert(String::from("n"), Param { ty: Some(Type(vec![TypeTerm::named("int")])), default: None });
        params.insert(String::from("by"), Param { ty: None, default: Some(int(2)) });

        assert_parse("pub fn scale(n: int, by = 2) ~> int\n    return n * by", program![
            Stmt::FunDecl(FunDecl {
                public: true,
                ident: String::from("scale"),
                params,
                ret: Some(Type(vec![TypeTerm::named("int")])),
                block: block(vec![Stmt::Return(Some(bin(op::Binary::Mul, ident("n"), ident("by"))))])
            })
        ]);

        assert_parse("fn f()\n    <<<\n", program![
            Stmt::FunDecl(FunDecl {
                public: false,
                ident: String::from("f"),
                params: IndexMap::new(),
                ret: None,
                block: block(vec![Stmt::Return(None)])
            })
        ]);

        assert_parse_fail("fn f(a, b, a)\n    pass", ParseErr::DuplicateParam(String::from("a")));
        assert_parse_fail("pub x := 1", ParseErr::ExpectedTokens {
            expected: vec![token![fn]],
            found: String::from("'x'")
        });
    }

    #[test]
    fn params_keep_order() {
        let program = unwrap_fe(parse_str("fn f(z, a, m)\n    pass"));
        let Stmt::FunDecl(decl) = &program.0[0] else { panic!("expected function") };

        assert_eq!(decl.params.keys().collect::<Vec<_>>(), ["z", "a", "m"]);
    }

    #[test]
    fn class_test() {
        assert_parse("class Marker\nclass Duck(Bird, mixins.Loud)\n    fn quack()\n        pass", program![
            Stmt::Class(ClassDecl { ident: String::from("Marker"), bases: vec![], block: None }),
            Stmt::Class(ClassDecl {
                ident: String::from("Duck"),
                bases: vec![
                    ident("Bird"),
                    Expr::Attr { obj: Box::new(ident("mixins")), attr: String::from("Loud") },
                ],
                block: Some(block(vec![
                    Stmt::FunDecl(FunDecl {
                        public: false,
                        ident: String::from("quack"),
                        params: IndexMap::new(),
                        ret: None,
                        block: block(vec![Stmt::Pass])
                    })
                ]))
            }),
        ]);
    }

    #[test]
    fn match_test() {
        assert_parse("match code\n    case 200\n        ok()\n    case n if n >= 500\n        retry()\n", program![
            Stmt::Match {
                subject: ident("code"),
                arms: vec![
                    MatchArm { pattern: int(200), guard: None, block: block(vec![Stmt::Expr(call(ident("ok"), vec![]))]) },
                    MatchArm {
                        pattern: ident("n"),
                        guard: Some(cmp(op::Cmp::Ge, ident("n"), int(500))),
                        block: block(vec![Stmt::Expr(call(ident("retry"), vec![]))])
                    },
                ]
            }
        ]);

        assert_parse_fail("match x\n    y\n", ParseErr::ExpectedTokens {
            expected: vec![token![case]],
            found: String::from("'y'")
        });
    }

    #[test]
    fn wrap_test() {
        assert_parse("wrap timed, retry(times=3)\n    fetch()", program![
            Stmt::Wrap {
                targets: vec![
                    WrapTarget { ident: String::from("timed"), args: None },
                    WrapTarget {
                        ident: String::from("retry"),
                        args: Some(vec![Arg { ident: Some(String::from("times")), value: int(3) }])
                    },
                ],
                block: block(vec![Stmt::Expr(call(ident("fetch"), vec![]))])
            }
        ]);
    }

    #[test]
    fn simple_stmt_test() {
        assert_parse("alias print := say", program![
            Stmt::Alias { existing: String::from("print"), ident: String::from("say") }
        ]);
        assert_parse("assert x, 'x must hold'\nassert y", program![
            Stmt::Assert { test: ident("x"), msg: Some(string("x must hold")) },
            Stmt::Assert { test: ident("y"), msg: None },
        ]);
        assert_parse("import os.path as p\nimport sys", program![
            Stmt::Import { path: vec![String::from("os"), String::from("path")], alias: Some(String::from("p")) },
            Stmt::Import { path: vec![String::from("sys")], alias: None },
        ]);
        assert_parse("from a.b import c as d, e\nfrom f import *", program![
            Stmt::FromImport {
                path: vec![String::from("a"), String::from("b")],
                names: ImportNames::Names(vec![
                    (String::from("c"), Some(String::from("d"))),
                    (String::from("e"), None),
                ])
            },
            Stmt::FromImport { path: vec![String::from("f")], names: ImportNames::All },
        ]);
        assert_parse("return x -> f", program![
            Stmt::Return(Some(Expr::Pipeline(Pipeline {
                source: Box::new(ident("x")),
                stages: vec![PipeStage { implicit_receiver: false, path: vec![String::from("f")], args: StageArgs::Bare }]
            })))
        ]);
    }

    #[test]
    fn cursor_test() {
        assert_eq!(parse(vec![]).unwrap_err(), ParseErr::NoTokenAt(0));

        // a token sequence without EOF runs out
        let mut tokens = unwrap_fe(tokenize("x"));
        tokens.pop();
        assert_eq!(parse(tokens).unwrap_err(), ParseErr::NoTokenAt(1));

        assert_eq!(unwrap_fe(parse_str("")), program![]);
        assert_eq!(unwrap_fe(parse_str("# nothing\n\n")), program![]);
    }

    #[test]
    fn nesting_depth_test() {
        let parens = |n: usize| format!("{}x{}", "(".repeat(n), ")".repeat(n));

        assert_eq!(parse_expr(&parens(20)), ident("x"));
        assert_parse_fail(&parens(40), ParseErr::NestingTooDeep);

        assert_parse_fail(&format!("{}1", "- ".repeat(100)), ParseErr::NestingTooDeep);
        assert_parse_fail(&format!("x{}", " ^ x".repeat(100)), ParseErr::NestingTooDeep);
        assert_parse_fail(&format!("{}x", "not ".repeat(100)), ParseErr::NestingTooDeep);
        assert_parse_fail(&format!("x: {}int{}", "list[".repeat(40), "]".repeat(40)), ParseErr::NestingTooDeep);

        let mut nested_ifs = String::new();
        for level in 0..40 {
            nested_ifs.push_str(&"    ".repeat(level));
            nested_ifs.push_str("if x\n");
        }
        nested_ifs.push_str(&"    ".repeat(40));
        nested_ifs.push_str("pass\n");
        assert_parse_fail(&nested_ifs, ParseErr::NestingTooDeep);
    }

    #[test]
    fn error_position_test() {
        let err = parse_str("x := 1\ny := (2 +)").unwrap_err();
        assert_eq!(err, ParseErr::ExpectedExpr(String::from("')'")));
        assert_eq!(err.loc().cursor(), (2, 10));
        assert_eq!(err.short_msg(), "2:10 :: syntax error: expected expression, got ')'");
    }
}
