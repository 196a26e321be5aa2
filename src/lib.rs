#![warn(missing_docs)]

//! Front end for the Quartz language.
//!
//! # Parsing
//!
//! Parsing of a string to an arbitrary syntax tree (AST) is done
//! with the [`lexer`] and [`parser`] modules.
//!
//! These modules provide:
//! - [`Lexer`][`lexer::Lexer`]: A struct that processes strings (or files) into sequences of tokens.
//! - [`Parser`][`parser::Parser`]: A struct that processes sequences of lexer tokens into an AST.
//! - [`ast`]: The components of the AST.
//!
//! Faults in either step are reported as a [`Diagnostic`][`err::Diagnostic`],
//! which points at the line and column that caused them.
//!
//! # Example
//! ```
//! use quartz_lang::ast::Stmt;
//!
//! let program = quartz_lang::parse_str("x := 1\nprint(x)").unwrap();
//! assert!(matches!(program.0[0], Stmt::Init { .. }));
//!
//! let err = quartz_lang::parse_str("x := (1,").unwrap_err();
//! assert_eq!(err.short_msg(), "1:6 :: lexical error: delimiter was never terminated");
//! ```

// useful crate items
use err::{Diagnostic, SourceErr};

// public API
pub mod lexer;
pub mod parser;
pub mod ast;

pub mod err;
pub mod span;

/// Tokenize and parse a source text into a program tree.
pub fn parse_str(source: &str) -> Result<ast::Program, Diagnostic<SourceErr>> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse(tokens)?;

    Ok(program)
}
