//! The operator AST nodes.
//!
//! This differs from [operator tokens][crate::lexer::token]
//! because these nodes have established meanings within the Quartz language.
//! The same token can mean different operators depending on where it appears
//! (e.g. `~` is bitwise not as a prefix and bitwise xor between two operands).

use crate::lexer::token::{Token, token};

/// A unary operator AST node.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Unary {
    /// Unary plus (`+x`)
    Plus,

    /// Unary minus (`-x`)
    Minus,

    /// Bitwise not (`~x`)
    BitNot,

    /// Logical not (`not x`)
    Not,
}

/// A binary operator AST node.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Binary {
    /// Logical or (`x or y`)
    Or,

    /// Logical and (`x and y`)
    And,

    /// Bitwise or (`x | y`)
    BitOr,

    /// Bitwise xor (`x ~ y`)
    BitXor,

    /// Bitwise and (`x & y`)
    BitAnd,

    /// Shift left (`x << y`)
    Shl,

    /// Shift right (`x >> y`)
    Shr,

    /// Binary plus (`x + y`)
    Add,

    /// Binary subtract (`x - y`)
    Sub,

    /// Multiplication (`x * y`)
    Mul,

    /// Division (`x / y`)
    Div,

    /// Floor division (`x // y`)
    FloorDiv,

    /// Modulo (`x % y`)
    Mod,

    /// Exponentiation (`x ^ y`)
    Pow,
}

/// A comparison operator AST node.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Cmp {
    /// Less than (`<`)
    Lt,

    /// Greater than (`>`)
    Gt,

    /// Less than or equal (`<=`)
    Le,

    /// Greater than or equal (`>=`)
    Ge,

    /// Equal (`==`)
    Eq,

    /// Not equal (`!=`)
    Ne,

    /// Membership (`in`)
    In,

    /// Non-membership (`not in`)
    NotIn,

    /// Identity (`is`)
    Is,

    /// Non-identity (`is not`)
    IsNot,
}

/// An assignment operator AST node.
///
/// Every compound assignment corresponds to a [`Binary`] operator.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Assign {
    /// Plain assignment (`=`)
    Set,

    /// A compound assignment (e.g. `+=`, `<<=`)
    Compound(Binary),
}

/// Casting a token to an operator node failed.
///
/// This holds the kind of operator the token was cast to.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenOpCastErr(&'static str);

impl std::fmt::Display for TokenOpCastErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token cannot be converted into {} operator", self.0)
    }
}
impl std::error::Error for TokenOpCastErr {}

impl TryFrom<&Token> for Unary {
    type Error = TokenOpCastErr;

    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        match value.pat() {
            token![+]   => Ok(Unary::Plus),
            token![-]   => Ok(Unary::Minus),
            token![~]   => Ok(Unary::BitNot),
            token![not] => Ok(Unary::Not),
            _ => Err(TokenOpCastErr("a unary"))
        }
    }
}
impl TryFrom<&Token> for Binary {
    type Error = TokenOpCastErr;

    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        match value.pat() {
            token![or]   => Ok(Binary::Or),
            token![and]  => Ok(Binary::And),
            token![|]    => Ok(Binary::BitOr),
            token![~]    => Ok(Binary::BitXor),
            token![&]    => Ok(Binary::BitAnd),
            token![<<]   => Ok(Binary::Shl),
            token![>>]   => Ok(Binary::Shr),
            token![+]    => Ok(Binary::Add),
            token![-]    => Ok(Binary::Sub),
            token![*]    => Ok(Binary::Mul),
            token![/]    => Ok(Binary::Div),
            token!["//"] => Ok(Binary::FloorDiv),
            token![%]    => Ok(Binary::Mod),
            token![^]    => Ok(Binary::Pow),
            _ => Err(TokenOpCastErr("a binary"))
        }
    }
}
impl TryFrom<&Token> for Cmp {
    type Error = TokenOpCastErr;

    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        match value.pat() {
            token![<]  => Ok(Cmp::Lt),
            token![<=] => Ok(Cmp::Le),
            token![>]  => Ok(Cmp::Gt),
            token![>=] => Ok(Cmp::Ge),
            token![==] => Ok(Cmp::Eq),
            token![!=] => Ok(Cmp::Ne),
            token![in] => Ok(Cmp::In),
            token![is] => Ok(Cmp::Is),
            _ => Err(TokenOpCastErr("a comparison"))
        }
    }
}
impl TryFrom<&Token> for Assign {
    type Error = TokenOpCastErr;

    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        let op = match value.pat() {
            token![=]     => return Ok(Assign::Set),
            token![+=]    => Binary::Add,
            token![-=]    => Binary::Sub,
            token![*=]    => Binary::Mul,
            token![/=]    => Binary::Div,
            token!["//="] => Binary::FloorDiv,
            token![%=]    => Binary::Mod,
            token![^=]    => Binary::Pow,
            token![~=]    => Binary::BitXor,
            token![&=]    => Binary::BitAnd,
            token![|=]    => Binary::BitOr,
            token![<<=]   => Binary::Shl,
            token![>>=]   => Binary::Shr,
            _ => return Err(TokenOpCastErr("an assignment"))
        };

        Ok(Assign::Compound(op))
    }
}
