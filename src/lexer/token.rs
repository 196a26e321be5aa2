//! The tokens that the string can be lexed into.
//!
//! See [`Token`] for more information.

use std::collections::BTreeMap;
use std::fmt::Display;

use once_cell::sync::Lazy;

use crate::span::{Loc, Located};

/// A specific unit that carries some graphemic value in Quartz.
///
/// A token is its [category][`Tag`], its literal text,
/// and the [location][`Loc`] of its first character.
/// Structural tokens ([`Tag::Newline`], [`Tag::Indent`], [`Tag::Dedent`], [`Tag::Eof`]) and punctuation have empty text.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct Token {
    pub(crate) tag: Tag,
    pub(crate) text: String,
    pub(crate) loc: Loc,
}

impl Token {
    /// Create a token using a tag, its text, and its given position.
    pub fn new(tag: Tag, text: impl Into<String>, loc: Loc) -> Self {
        Self { tag, text: text.into(), loc }
    }

    /// The category of this token.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The literal text of this token.
    ///
    /// Identifiers, keywords, and numbers hold their lexeme.
    /// String tokens hold the text between the quotes, with escapes as written.
    /// Punctuation and structural tokens have empty text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line this token starts on (1-indexed).
    pub fn line(&self) -> usize {
        self.loc.line()
    }

    /// The column this token starts on (1-indexed).
    pub fn column(&self) -> usize {
        self.loc.column()
    }

    /// If this token is a keyword, return which one.
    pub fn keyword(&self) -> Option<Keyword> {
        match self.tag {
            Tag::Keyword => Keyword::get_kw(&self.text),
            _ => None,
        }
    }

    /// The most specific [`TokenPat`] this token matches.
    ///
    /// This allows tokens to be matched against [`token!`] patterns.
    pub fn pat(&self) -> TokenPat {
        match self.keyword() {
            Some(kw) => TokenPat::Kw(kw),
            None => TokenPat::Tag(self.tag),
        }
    }
}

impl Located for Token {
    fn loc(&self) -> &Loc {
        &self.loc
    }
}

impl PartialEq<Tag> for Token {
    fn eq(&self, other: &Tag) -> bool {
        &self.tag == other
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.tag, self.tag.spelling()) {
            (_, Some(p)) => write!(f, "'{p}'"),
            (Tag::Newline | Tag::Indent | Tag::Dedent | Tag::Eof, None) => self.tag.fmt(f),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

macro_rules! define_tags {
    (
        classes: { $($cid:ident: $cname:literal),* $(,)? },
        punct: { $($pid:ident: $pex:literal),* $(,)? }
    ) => {
        /// The category of a token.
        ///
        /// This is a closed set: structural markers, literal classes, and one tag per punctuation spelling.
        #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
        pub enum Tag {
            $(#[allow(missing_docs)] $cid,)*
            $(#[allow(missing_docs)] $pid,)*
        }

        impl Tag {
            /// The exact spelling of this tag, if it is punctuation.
            pub fn spelling(&self) -> Option<&'static str> {
                match self {
                    $(Self::$cid => None,)*
                    $(Self::$pid => Some($pex),)*
                }
            }
        }

        impl Display for Tag {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$cid => f.write_str($cname),)*
                    $(Self::$pid => write!(f, "'{}'", $pex),)*
                }
            }
        }

        /// Every punctuation spelling, mapped to its tag.
        pub(crate) static PUNCT_MAP: Lazy<BTreeMap<&'static str, Tag>> = Lazy::new(|| {
            let mut m = BTreeMap::new();
            $(m.insert($pex, Tag::$pid);)*
            m
        });
    };
}

macro_rules! define_keywords {
    ($($id:ident: $ex:literal),* $(,)?) => {
        /// Enum that provides all the Quartz keywords.
        ///
        /// These cannot be identifiers in any circumstance.
        #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
        pub enum Keyword {
            $(
                #[allow(missing_docs)] $id
            ),*
        }

        impl Keyword {
            /// If the string is a keyword, return the keyword it represents
            /// or `None` if it is not a keyword.
            pub fn get_kw(s: &str) -> Option<Keyword> {
                match s {
                    $(
                        $ex => Some(Self::$id)
                    ),+ ,
                    _ => None
                }
            }

            /// The spelling of this keyword.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$id => $ex),*
                }
            }
        }

        impl Display for Keyword {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_tags! {
    classes: {
        Newline:    "NEWLINE",
        Indent:     "INDENT",
        Dedent:     "DEDENT",
        Eof:        "EOF",
        Integer:    "INTEGER",
        Float:      "FLOAT",
        Str:        "STRING",
        Identifier: "IDENTIFIER",
        Keyword:    "KEYWORD",
    },
    punct: {
        LParen:         "(",
        RParen:         ")",
        LBracket:       "[",
        RBracket:       "]",
        LBrace:         "{",
        RBrace:         "}",
        DollarLBrace:   "${",
        PercentLBrace:  "%{",

        Comma:          ",",
        Semicolon:      ";",
        Colon:          ":",
        ColonEqual:     ":=",
        Period:         ".",
        PeriodPeriod:   "..",
        PeriodPeriodEq: "..=",
        Ellipsis:       "...",

        Equal:          "=",
        EqualEqual:     "==",
        EqualArrow:     "=>",
        BangEqual:      "!=",
        BangBang:       "!!",
        ErotemeEroteme: "??",

        Plus:           "+",
        PlusEqual:      "+=",
        Minus:          "-",
        MinusEqual:     "-=",
        Arrow:          "->",
        ArrowEqual:     "->=",
        Asterisk:       "*",
        AsteriskEqual:  "*=",
        Slash:          "/",
        SlashEqual:     "/=",
        SlashSlash:     "//",
        SlashSlashEqual: "//=",
        Percent:        "%",
        PercentEqual:   "%=",
        Caret:          "^",
        CaretEqual:     "^=",
        Tilde:          "~",
        TildeEqual:     "~=",
        TildeArrow:     "~>",
        Ampersand:      "&",
        AmpersandEqual: "&=",
        Pipe:           "|",
        PipeEqual:      "|=",

        Less:           "<",
        LessEqual:      "<=",
        Shl:            "<<",
        ShlEqual:       "<<=",
        TripleLess:     "<<<",
        Greater:        ">",
        GreaterEqual:   ">=",
        Shr:            ">>",
        ShrEqual:       ">>=",
    }
}

define_keywords! {
    Alias:    "alias",
    And:      "and",
    As:       "as",
    Assert:   "assert",
    Break:    "break",
    Case:     "case",
    Class:    "class",
    Continue: "continue",
    Else:     "else",
    False:    "False",
    Fn:       "fn",
    For:      "for",
    From:     "from",
    If:       "if",
    Import:   "import",
    In:       "in",
    Is:       "is",
    Match:    "match",
    None:     "None",
    Not:      "not",
    Or:       "or",
    Pass:     "pass",
    Pub:      "pub",
    Return:   "return",
    True:     "True",
    Until:    "until",
    While:    "while",
    Wrap:     "wrap",
}

impl Tag {
    /// If this tag opens a bracket group, the tag that closes it.
    ///
    /// `${` and `%{` are closed by `}`.
    pub fn closer(&self) -> Option<Tag> {
        match self {
            Tag::LParen => Some(Tag::RParen),
            Tag::LBracket => Some(Tag::RBracket),
            Tag::LBrace | Tag::DollarLBrace | Tag::PercentLBrace => Some(Tag::RBrace),
            _ => None,
        }
    }

    /// Whether this tag closes a bracket group.
    pub fn is_closer(&self) -> bool {
        matches!(self, Tag::RParen | Tag::RBracket | Tag::RBrace)
    }
}

/// What the parser can test a token against.
///
/// A pattern is either a tag (matching any token of that category)
/// or a keyword (matching a keyword token by its spelling).
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TokenPat {
    /// Matches any token of this tag.
    Tag(Tag),
    /// Matches a keyword token spelled like this keyword.
    Kw(Keyword),
}

impl TokenPat {
    /// Test if a token fits this pattern.
    pub fn matches(&self, t: &Token) -> bool {
        match self {
            TokenPat::Tag(tag) => t.tag == *tag,
            TokenPat::Kw(kw) => t.tag == Tag::Keyword && t.text == kw.as_str(),
        }
    }
}

impl From<Tag> for TokenPat {
    fn from(value: Tag) -> Self {
        TokenPat::Tag(value)
    }
}
impl From<Keyword> for TokenPat {
    fn from(value: Keyword) -> Self {
        TokenPat::Kw(value)
    }
}

impl Display for TokenPat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenPat::Tag(t) => t.fmt(f),
            TokenPat::Kw(k) => write!(f, "'{k}'"),
        }
    }
}

/// Utility macro that can be used as a shorthand for [`TokenPat`]s
/// of keywords and punctuation.
///
/// Delimiters (and any spelling Rust cannot tokenize on its own) are written as strings.
///
/// # Example
/// ```
/// # use quartz_lang::lexer::token::{token, Keyword, Tag, TokenPat};
/// assert_eq!(token![if], TokenPat::Kw(Keyword::If));
/// assert_eq!(token![+], TokenPat::Tag(Tag::Plus));
/// assert_eq!(token!["("], TokenPat::Tag(Tag::LParen));
/// ```
#[macro_export]
macro_rules! token {
    (@t $id:ident) => { $crate::lexer::token::TokenPat::Tag($crate::lexer::token::Tag::$id) };
    (@k $id:ident) => { $crate::lexer::token::TokenPat::Kw($crate::lexer::token::Keyword::$id) };

    (alias)    => { $crate::token!(@k Alias)    };
    (and)      => { $crate::token!(@k And)      };
    (as)       => { $crate::token!(@k As)       };
    (assert)   => { $crate::token!(@k Assert)   };
    (break)    => { $crate::token!(@k Break)    };
    (case)     => { $crate::token!(@k Case)     };
    (class)    => { $crate::token!(@k Class)    };
    (continue) => { $crate::token!(@k Continue) };
    (else)     => { $crate::token!(@k Else)     };
    (False)    => { $crate::token!(@k False)    };
    (fn)       => { $crate::token!(@k Fn)       };
    (for)      => { $crate::token!(@k For)      };
    (from)     => { $crate::token!(@k From)     };
    (if)       => { $crate::token!(@k If)       };
    (import)   => { $crate::token!(@k Import)   };
    (in)       => { $crate::token!(@k In)       };
    (is)       => { $crate::token!(@k Is)       };
    (match)    => { $crate::token!(@k Match)    };
    (None)     => { $crate::token!(@k None)     };
    (not)      => { $crate::token!(@k Not)      };
    (or)       => { $crate::token!(@k Or)       };
    (pass)     => { $crate::token!(@k Pass)     };
    (pub)      => { $crate::token!(@k Pub)      };
    (return)   => { $crate::token!(@k Return)   };
    (True)     => { $crate::token!(@k True)     };
    (until)    => { $crate::token!(@k Until)    };
    (while)    => { $crate::token!(@k While)    };
    (wrap)     => { $crate::token!(@k Wrap)     };

    ("(")   => { $crate::token!(@t LParen)          };
    (")")   => { $crate::token!(@t RParen)          };
    ("[")   => { $crate::token!(@t LBracket)        };
    ("]")   => { $crate::token!(@t RBracket)        };
    ("{")   => { $crate::token!(@t LBrace)          };
    ("}")   => { $crate::token!(@t RBrace)          };
    ("${")  => { $crate::token!(@t DollarLBrace)    };
    ("%{")  => { $crate::token!(@t PercentLBrace)   };
    (,)     => { $crate::token!(@t Comma)           };
    (;)     => { $crate::token!(@t Semicolon)       };
    (:)     => { $crate::token!(@t Colon)           };
    (:=)    => { $crate::token!(@t ColonEqual)      };
    (.)     => { $crate::token!(@t Period)          };
    (..)    => { $crate::token!(@t PeriodPeriod)    };
    (..=)   => { $crate::token!(@t PeriodPeriodEq)  };
    ("...") => { $crate::token!(@t Ellipsis)        };
    (=)     => { $crate::token!(@t Equal)           };
    (==)    => { $crate::token!(@t EqualEqual)      };
    ("=>")  => { $crate::token!(@t EqualArrow)      };
    (!=)    => { $crate::token!(@t BangEqual)       };
    (!!)    => { $crate::token!(@t BangBang)        };
    (??)    => { $crate::token!(@t ErotemeEroteme)  };
    (+)     => { $crate::token!(@t Plus)            };
    (+=)    => { $crate::token!(@t PlusEqual)       };
    (-)     => { $crate::token!(@t Minus)           };
    (-=)    => { $crate::token!(@t MinusEqual)      };
    (->)    => { $crate::token!(@t Arrow)           };
    (->=)   => { $crate::token!(@t ArrowEqual)      };
    (*)     => { $crate::token!(@t Asterisk)        };
    (*=)    => { $crate::token!(@t AsteriskEqual)   };
    (/)     => { $crate::token!(@t Slash)           };
    (/=)    => { $crate::token!(@t SlashEqual)      };
    ("//")  => { $crate::token!(@t SlashSlash)      };
    ("//=") => { $crate::token!(@t SlashSlashEqual) };
    (%)     => { $crate::token!(@t Percent)         };
    (%=)    => { $crate::token!(@t PercentEqual)    };
    (^)     => { $crate::token!(@t Caret)           };
    (^=)    => { $crate::token!(@t CaretEqual)      };
    (~)     => { $crate::token!(@t Tilde)           };
    (~=)    => { $crate::token!(@t TildeEqual)      };
    (~>)    => { $crate::token!(@t TildeArrow)      };
    (&)     => { $crate::token!(@t Ampersand)       };
    (&=)    => { $crate::token!(@t AmpersandEqual)  };
    (|)     => { $crate::token!(@t Pipe)            };
    (|=)    => { $crate::token!(@t PipeEqual)       };
    (<)     => { $crate::token!(@t Less)            };
    (<=)    => { $crate::token!(@t LessEqual)       };
    (<<)    => { $crate::token!(@t Shl)             };
    (<<=)   => { $crate::token!(@t ShlEqual)        };
    (<<<)   => { $crate::token!(@t TripleLess)      };
    (>)     => { $crate::token!(@t Greater)         };
    (>=)    => { $crate::token!(@t GreaterEqual)    };
    (>>)    => { $crate::token!(@t Shr)             };
    (>>=)   => { $crate::token!(@t ShrEqual)        };
}
pub use token;
