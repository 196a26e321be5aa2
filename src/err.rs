//! Underlying core behind the error printing for the front end.
//!
//! This module unifies the different types of errors output by the other modules.
//! Other error types (e.g. [`LexErr`]) can implement the [`QzErr`] trait to keep track of the
//! error type's name and message.
//!
//! [`Diagnostic`] does much of the work to convert [`QzErr`]s into a printed error in terminal.
//!
//! ```
//! # use quartz_lang::lexer::tokenize;
//! let err = tokenize("x := 1 ! 2").unwrap_err();
//!
//! assert_eq!(err.short_msg(), "1:8 :: lexical error: '!' must be followed by '=' or '!'");
//! assert_eq!(err.full_msg(), [
//!     "1:8 :: lexical error: '!' must be followed by '=' or '!'",
//!     "",
//!     "x := 1 ! 2",
//!     "       ^",
//! ].join("\n"));
//! ```
//!
//! [`LexErr`]: crate::lexer::LexErr

use std::fmt::Display;

use crate::lexer::LexErr;
use crate::parser::ParseErr;
use crate::span::Loc;

/// Errors that can be printed by the Quartz front end.
///
/// This trait requires that the struct provides the name of the error type and the message of the error (in Display).
/// Implementing these enables functionality to designate *where* an error occurred and to produce
/// a formatted error message.
pub trait QzErr: Display + Sized {
    /// The name of the error type (e.g. `lexical error`, `syntax error`)
    fn err_name(&self) -> &'static str;

    /// Designate that this error occurred at a specific position
    fn at(self, loc: Loc) -> Diagnostic<Self> {
        Diagnostic::new(self, loc)
    }

    /// Designate that this error occurred at an unknown position in the code
    fn at_unknown(self) -> Diagnostic<Self> {
        Diagnostic::new(self, Loc::unknown())
    }
}

impl<E: QzErr> From<E> for Diagnostic<E> {
    fn from(err: E) -> Self {
        err.at_unknown()
    }
}

/// An error that has an associated position.
///
/// The first fault in a source text ends processing and is reported
/// as a diagnostic. It carries the line and column of the fault,
/// the text of the offending line, and the message.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Diagnostic<E: QzErr> {
    pub(crate) err: E,
    loc: Loc,
}

impl<E: QzErr> Diagnostic<E> {
    fn new(err: E, loc: Loc) -> Self {
        Self { err, loc }
    }

    /// The error this diagnostic wraps.
    pub fn err(&self) -> &E {
        &self.err
    }

    /// The location of the fault.
    pub fn loc(&self) -> &Loc {
        &self.loc
    }

    /// The line of the fault (1-indexed).
    pub fn line(&self) -> usize {
        self.loc.line()
    }

    /// The column of the fault (1-indexed).
    pub fn column(&self) -> usize {
        self.loc.column()
    }

    /// The full text of the line the fault occurred on.
    pub fn source_line(&self) -> &str {
        self.loc.line_text()
    }

    /// The message associated with the fault.
    pub fn message(&self) -> String {
        self.err.to_string()
    }

    /// Get a String designating where the error occurred
    /// and the message associated with the error.
    pub fn short_msg(&self) -> String {
        format!("{} :: {}: {}", self.loc, self.err.err_name(), self.err)
    }

    /// Get a String designating where the error occurred,
    /// the message associated with the error,
    /// and a pointer to the column of the line that caused the error.
    pub fn full_msg(&self) -> String {
        let ptr = " ".repeat(self.column() - 1) + "^";

        [self.short_msg(), String::new(), self.source_line().to_string(), ptr].join("\n")
    }

    /// Map the inner error to another error.
    pub fn map<F: QzErr>(self, f: impl FnOnce(E) -> F) -> Diagnostic<F> {
        Diagnostic {
            err: f(self.err),
            loc: self.loc,
        }
    }

    /// Cast the inner error to another error.
    pub fn cast_err<F: QzErr + From<E>>(self) -> Diagnostic<F> {
        self.map(F::from)
    }
}

impl<E: QzErr + PartialEq> PartialEq<E> for Diagnostic<E> {
    fn eq(&self, other: &E) -> bool {
        &self.err == other
    }
}

impl<E: QzErr> Display for Diagnostic<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_msg())
    }
}
impl<E: QzErr + std::fmt::Debug> std::error::Error for Diagnostic<E> {}

/// Any fault that can occur while turning source text into a syntax tree.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum SourceErr {
    /// The fault occurred while tokenizing.
    Lex(LexErr),
    /// The fault occurred while parsing.
    Parse(ParseErr),
}

impl QzErr for SourceErr {
    fn err_name(&self) -> &'static str {
        match self {
            SourceErr::Lex(e)   => e.err_name(),
            SourceErr::Parse(e) => e.err_name(),
        }
    }
}

impl Display for SourceErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceErr::Lex(e)   => e.fmt(f),
            SourceErr::Parse(e) => e.fmt(f),
        }
    }
}

impl From<LexErr> for SourceErr {
    fn from(value: LexErr) -> Self {
        SourceErr::Lex(value)
    }
}
impl From<ParseErr> for SourceErr {
    fn from(value: ParseErr) -> Self {
        SourceErr::Parse(value)
    }
}

macro_rules! diagnostic_cast_impl {
    ($t:ty, $u:ty) => {
        impl From<$crate::err::Diagnostic<$t>> for $crate::err::Diagnostic<$u> {
            fn from(err: $crate::err::Diagnostic<$t>) -> Self {
                err.cast_err()
            }
        }
    }
}
diagnostic_cast_impl!(LexErr, SourceErr);
diagnostic_cast_impl!(ParseErr, SourceErr);
