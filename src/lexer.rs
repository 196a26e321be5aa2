//! Converts strings to sequences of tokens.
//!
//! In a general sense, lexing is performed by reading the string,
//! and repeatedly matching specific token patterns until the entire string is consumed.
//!
//! Quartz is indentation-sensitive, so the lexer also keeps track of the layout of the code:
//! - A line break is a [`Tag::Newline`] only when no bracket group is open.
//! - Indentation is measured in units of 4 spaces at the start of each line that holds code.
//!   Going deeper emits a [`Tag::Indent`], coming back out emits one [`Tag::Dedent`] per level.
//! - Blank lines and comment-only lines do not affect indentation.
//! - A `\` at the very end of a line joins it to the next line.
//!
//! This module provides:
//! - [`tokenize`]: A utility function that opaquely does the lexing from string to tokens.
//! - [`Lexer`]: The struct which does the entire lexing process.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

use crate::err::{Diagnostic, QzErr};
use crate::span::{Cursor, Loc};

use self::token::{Keyword, Tag, Token};
pub mod token;

/// The number of spaces in one level of indentation.
pub const INDENT_WIDTH: usize = 4;

/// Characters that may follow a `\` in a string literal.
///
/// The lexer keeps escapes verbatim. They are decoded by the parser.
const STRING_ESCAPES: &[char] = &['\\', '"', '\'', 'a', 'b', 'f', 'n', 'r', 't', 'v', 'o', 'x', 'u', 'U'];

/// Convert a string and lex it into a sequence of tokens.
///
/// For more control, see the [`Lexer`] struct.
///
/// # Example
/// ```
/// # use quartz_lang::lexer::tokenize;
/// use quartz_lang::lexer::token::Tag;
///
/// let tokens = tokenize("a + b").unwrap();
/// assert_eq!(tokens, [Tag::Identifier, Tag::Plus, Tag::Identifier, Tag::Eof]);
/// ```
pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    let mut lx = Lexer::new(input);
    lx.lex()?;
    lx.close()
}

/// An error that occurs in the lexing process.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum LexErr {
    /// Lexer found character that isn't used in Quartz code (e.g. emojis)
    UnknownChar(char),

    /// The string of characters are punctuation but they don't create a valid symbol (e.g. `@`, `$`)
    UnknownOp(String),

    /// A `!` that was not part of `!=` or `!!`
    BareBang,

    /// The lexer tried to read a string literal
    /// but there was no closing quote. (e.g. `"hello!`)
    UnclosedQuote,

    /// The indentation of a line was not a multiple of [`INDENT_WIDTH`] spaces.
    InconsistentIndent(usize),

    /// A tab character appeared in the indentation of a line.
    TabIndent,

    /// A line dedented to a level that was never opened.
    UnmatchedDedent(usize),

    /// A delimiter was closed with the wrong type (e.g. `[ ... )`)
    MismatchedDelimiter,

    /// A bracket was not closed (e.g. `( ... `)
    UnclosedDelimiter,

    /// A delimiter was never opened (e.g. ` ... )`)
    UnmatchedDelimiter,
}
/// A [`Result`] type for operations in the lexing process.
pub type LexResult<T> = Result<T, FullLexErr>;
type FullLexErr = Diagnostic<LexErr>;

impl QzErr for LexErr {
    fn err_name(&self) -> &'static str {
        "lexical error"
    }
}

impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::UnknownChar(c)        => write!(f, "invalid character {}", wrapq(*c)),
            LexErr::UnknownOp(op)         => write!(f, "unknown symbol \"{op}\""),
            LexErr::BareBang              => write!(f, "'!' must be followed by '=' or '!'"),
            LexErr::UnclosedQuote         => write!(f, "quote was never terminated"),
            LexErr::InconsistentIndent(n) => write!(f, "indentation of {n} spaces is not a multiple of {INDENT_WIDTH}"),
            LexErr::TabIndent             => write!(f, "tabs cannot be used for indentation"),
            LexErr::UnmatchedDedent(n)    => write!(f, "dedent to {n} spaces does not match any outer indentation level"),
            LexErr::MismatchedDelimiter   => write!(f, "mismatched delimiter"),
            LexErr::UnclosedDelimiter     => write!(f, "delimiter was never terminated"),
            LexErr::UnmatchedDelimiter    => write!(f, "delimiter was never opened"),
        }
    }
}
impl std::error::Error for LexErr {}

/// Enclose quotes around a character
///
/// For most characters, it will appear as: `'a', 'b', '"', '@'`, etc.
///
/// For ', it appears as `"'"`.
fn wrapq(c: char) -> String {
    if c == '\'' { format!("\"{}\"", c) } else { format!("'{}'", c) }
}

/// Character classes that are treated differently in the lexer
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
enum CharClass {
    /// An ASCII alphabetic character (`a-z`, `A-Z`)
    Alpha,

    /// An ASCII digit (`0-9`)
    Numeric,

    /// An underscore (`_`)
    Underscore,

    /// Quote that encloses a string (`'`, `"`)
    Quote,

    /// Start of a comment (`#`)
    Hash,

    /// Line continuation (`\`)
    Backslash,

    /// Line break (`\n`)
    Newline,

    /// Any miscellaneous ASCII punctuation
    Punct,

    /// Whitespace that isn't a line break
    Whitespace,
}

impl CharClass {
    fn of(c: char) -> Option<Self> {
        if c.is_ascii_alphabetic()        { Some(Self::Alpha) }
        else if c.is_ascii_digit()        { Some(Self::Numeric) }
        else if c == '_'                  { Some(Self::Underscore) }
        else if c == '\'' || c == '"'     { Some(Self::Quote) }
        else if c == '#'                  { Some(Self::Hash) }
        else if c == '\\'                 { Some(Self::Backslash) }
        else if c == '\n'                 { Some(Self::Newline) }
        else if c.is_ascii_punctuation()  { Some(Self::Punct) }
        else if c.is_whitespace()         { Some(Self::Whitespace) }
        else { None }
    }
}

/// The struct that performs the full lexing process.
///
/// # Example
/// ```
/// # use quartz_lang::lexer::Lexer;
/// use quartz_lang::lexer::token::Tag;
///
/// let code = "if x\n    y\n";
///
/// let mut lx = Lexer::new(code);
/// assert!(lx.lex().is_ok());
/// assert_eq!(lx.close().unwrap(), [
///     Tag::Keyword, Tag::Identifier, Tag::Newline,
///     Tag::Indent, Tag::Identifier, Tag::Newline,
///     Tag::Dedent, Tag::Eof
/// ]);
/// ```
pub struct Lexer {
    /// The tokens generated from the string.
    tokens: Vec<Token>,
    /// A stack to keep track of open bracket groups (and their original position)
    delimiters: Vec<(Loc, Tag)>,
    /// The stack of indentation levels. The bottom level is always 0.
    indents: Vec<usize>,

    /// The text of each line of the input.
    lines: Vec<Arc<str>>,
    /// The position of the next char to be read.
    cursor: Cursor,
    /// The start position of the current token being evaluated.
    token_start: Cursor,
    /// The remaining characters in the buffer to be read.
    remaining: VecDeque<char>,
}

impl Lexer {
    /// Create a new lexer with an input string.
    pub fn new(input: &str) -> Self {
        let lines = input.split('\n')
            .map(|l| Arc::from(l.strip_suffix('\r').unwrap_or(l)))
            .collect();

        Self {
            tokens: vec![],
            delimiters: vec![],
            indents: vec![0],

            lines,
            cursor: (1, 1),
            token_start: (1, 1),
            remaining: input.chars().collect(),
        }
    }

    /// Lex the whole input.
    ///
    /// Lexing stops at the first fault.
    ///
    /// # Example
    /// ```
    /// # use quartz_lang::lexer::Lexer;
    /// use quartz_lang::lexer::LexErr;
    ///
    /// let mut lx = Lexer::new("x\n   y");
    /// assert_eq!(lx.lex().unwrap_err(), LexErr::InconsistentIndent(3));
    /// ```
    pub fn lex(&mut self) -> LexResult<()> {
        // the first line is measured like any other
        self.measure_indent()?;

        // repeatedly check the next token type and consume
        while let Some(chr) = self.peek() {
            self.token_start = self.cursor;
            let cls = CharClass::of(chr)
                .ok_or_else(|| LexErr::UnknownChar(chr).at(self.loc_at(self.token_start)))?;

            match cls {
                CharClass::Alpha | CharClass::Underscore => self.push_ident(),
                CharClass::Numeric => self.push_num(),
                CharClass::Quote => self.push_str()?,
                CharClass::Hash => self.skip_comment(),
                CharClass::Backslash => self.skip_continuation()?,
                CharClass::Newline => self.push_newline()?,
                CharClass::Punct => {
                    // dot acts as numeric if followed by a digit
                    match self.remaining.get(1) {
                        Some(c) if chr == '.' && c.is_ascii_digit() => self.push_num(),
                        _ => self.push_punct()?
                    }
                },
                CharClass::Whitespace => { self.next(); },
            }
        }

        Ok(())
    }

    /// Consume the lexer, closing off any open indentation levels
    /// and returning the tokens in it.
    ///
    /// This errors if a bracket group is still open.
    ///
    /// # Example
    /// ```
    /// # use quartz_lang::lexer::Lexer;
    /// use quartz_lang::lexer::LexErr;
    ///
    /// let mut lx = Lexer::new("[1, 2,\n 3");
    /// // lexes perfectly fine
    /// assert!(lx.lex().is_ok());
    /// // cannot be closed
    /// assert_eq!(lx.close().unwrap_err(), LexErr::UnclosedDelimiter);
    /// ```
    pub fn close(mut self) -> LexResult<Vec<Token>> {
        if let Some((loc, _)) = self.delimiters.pop() {
            return Err(LexErr::UnclosedDelimiter.at(loc));
        }

        self.token_start = self.cursor;
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_token(Tag::Dedent, String::new());
        }
        self.push_token(Tag::Eof, String::new());

        tracing::debug!(tokens = self.tokens.len(), lines = self.lines.len(), "tokenized source");
        Ok(self.tokens)
    }

    /// Look at the next character in the input.
    ///
    /// If there are no more characters in the input, return None.
    fn peek(&self) -> Option<char> {
        self.remaining.front().copied()
    }

    /// Consume the next character in the input and return it.
    fn next(&mut self) -> Option<char> {
        let mcd = self.remaining.pop_front();

        let (lno, cno) = self.cursor;
        self.cursor = match mcd {
            Some('\n') => (lno + 1, 1),
            Some(_) => (lno, cno + 1),
            None => (lno, cno),
        };
        mcd
    }

    /// Consume the next `n` characters in the input and return them.
    fn next_n(&mut self, n: usize) -> String {
        std::iter::from_fn(|| self.next()).take(n).collect()
    }

    /// Check if the next character in the input matches the given character class.
    ///
    /// If it does, consume it and return the character.
    /// If it does not, return None.
    fn match_cls(&mut self, match_cls: CharClass) -> Option<char> {
        if self.peek().and_then(CharClass::of) == Some(match_cls) {
            self.next()
        } else {
            None
        }
    }

    /// The location of a given cursor, along with the text of its line.
    fn loc_at(&self, (lno, cno): Cursor) -> Loc {
        let text = self.lines.get(lno - 1)
            .cloned()
            .unwrap_or_else(|| Arc::from(""));

        Loc::new((lno, cno), text)
    }

    /// The current indentation level.
    fn indent_level(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    /// Add token to the token buffer, located at the start of the current token.
    fn push_token(&mut self, tag: Tag, text: String) {
        let loc = self.loc_at(self.token_start);
        self.tokens.push(Token::new(tag, text, loc));
    }

    /// Reads a line break.
    ///
    /// Inside a bracket group, this is just whitespace.
    /// Otherwise, it ends the logical line and the next line's indentation is measured.
    fn push_newline(&mut self) -> LexResult<()> {
        self.next();

        if !self.delimiters.is_empty() {
            return Ok(());
        }

        // no newline at the start of the file, and none repeated
        if !matches!(self.tokens.last(), None | Some(Token { tag: Tag::Newline, .. })) {
            self.push_token(Tag::Newline, String::new());
        }

        self.measure_indent()
    }

    /// Measures the indentation of the line at the front of the input,
    /// adding [`Tag::Indent`] or [`Tag::Dedent`] tokens when the level changes.
    ///
    /// Lines that hold no code are skipped over without measuring.
    fn measure_indent(&mut self) -> LexResult<()> {
        let mut spaces = 0;
        let mut tab = None;

        loop {
            match self.peek() {
                Some(' ') => spaces += 1,
                Some('\t') => { tab.get_or_insert(self.cursor); },
                _ => break
            }
            self.next();
        }

        let blank = match self.peek() {
            None | Some('\n' | '#') => true,
            Some('\r') => matches!(self.remaining.get(1), None | Some('\n')),
            Some(_) => false
        };
        if blank {
            return Ok(());
        }

        if let Some(p) = tab {
            return Err(LexErr::TabIndent.at(self.loc_at(p)));
        }
        if spaces % INDENT_WIDTH != 0 {
            return Err(LexErr::InconsistentIndent(spaces).at(self.loc_at(self.cursor)));
        }

        self.token_start = self.cursor;
        let level = spaces / INDENT_WIDTH;

        match level.cmp(&self.indent_level()) {
            Ordering::Greater => {
                tracing::trace!(line = self.cursor.0, level, "indent");
                self.indents.push(level);
                self.push_token(Tag::Indent, String::new());
            },
            Ordering::Less => {
                while level < self.indent_level() {
                    tracing::trace!(line = self.cursor.0, level, "dedent");
                    self.indents.pop();
                    self.push_token(Tag::Dedent, String::new());
                }

                if level != self.indent_level() {
                    return Err(LexErr::UnmatchedDedent(spaces).at(self.loc_at(self.cursor)));
                }
            },
            Ordering::Equal => {},
        }

        Ok(())
    }

    /// Skips a comment, up to (but not including) the end of the line.
    fn skip_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.next();
        }
    }

    /// Skips a `\` that joins this line to the next.
    ///
    /// A `\` that isn't at the end of a line is not a valid character.
    fn skip_continuation(&mut self) -> LexResult<()> {
        self.next();
        if self.peek() == Some('\r') && self.remaining.get(1) == Some(&'\n') {
            self.next();
        }

        match self.peek() {
            Some('\n') => {
                self.next();
                Ok(())
            },
            _ => Err(LexErr::UnknownChar('\\').at(self.loc_at(self.token_start)))
        }
    }

    /// Analyzes the next characters in the input as an identifier or keyword (e.g. abc, a_1, empty?).
    ///
    /// This function consumes characters from the input and adds an identifier token in the output.
    fn push_ident(&mut self) {
        let mut buf = String::new();

        while let Some(chr) = self.peek() {
            match CharClass::of(chr) {
                Some(CharClass::Alpha | CharClass::Underscore | CharClass::Numeric) => {
                    buf.push(chr);
                    self.next();
                }
                _ => break
            }
        }

        // predicate names take one trailing ?, but not the first half of ??
        if self.peek() == Some('?') && self.remaining.get(1) != Some(&'?') {
            buf.extend(self.next());
        }

        let tag = match Keyword::get_kw(&buf) {
            Some(_) => Tag::Keyword,
            None => Tag::Identifier,
        };
        self.push_token(tag, buf);
    }

    /// Analyzes the next characters in the input as a numeric value (e.g. 123, 1_000, 123., 123.4, .5).
    ///
    /// This function consumes characters from the input and adds a numeric literal token in the output.
    fn push_num(&mut self) {
        let mut buf = String::new();

        self.push_digits(&mut buf);

        // 123.ident  => [123][.][ident]
        // 123.444    => [123.444]
        // 123..444   => [123][..][444]
        // 123. + 444 => [123.] [+] [444]
        // .5         => [.5]

        // the "." is part of the numeric UNLESS
        // - the next character is a "."
        // - the next character is alpha/underscore
        let dot_is_numeric = self.peek() == Some('.') && match self.remaining.get(1) {
            Some('.') => false,
            Some(&chr) => !matches!(CharClass::of(chr), Some(CharClass::Alpha | CharClass::Underscore)),
            None => true,
        };

        let tag = if dot_is_numeric {
            buf.extend(self.next()); // "."
            self.push_digits(&mut buf);
            Tag::Float
        } else {
            Tag::Integer
        };

        self.push_token(tag, buf);
    }

    /// Reads digits (and separators after the first digit) into the buffer.
    fn push_digits(&mut self, buf: &mut String) {
        if let Some(c) = self.match_cls(CharClass::Numeric) {
            buf.push(c);

            while let Some(c) = self.match_cls(CharClass::Numeric).or_else(|| self.match_cls(CharClass::Underscore)) {
                buf.push(c);
            }
        }
    }

    /// Analyzes the next characters in the input as a string (e.g. "hello", 'hi').
    ///
    /// This function consumes characters from the input and adds a string literal token in the output.
    /// The token's text leaves out the quotes, but keeps its escapes as written.
    fn push_str(&mut self) -> LexResult<()> {
        let mut buf = String::new();
        let Some(qt) = self.next() else {
            return Ok(());
        };

        loop {
            match self.next() {
                Some('\\') => {
                    buf.push('\\');
                    if let Some(c) = self.peek().filter(|c| STRING_ESCAPES.contains(c)) {
                        buf.push(c);
                        self.next();
                    }
                },
                Some(c) if c == qt => break,
                Some(c) => buf.push(c),
                None => return Err(LexErr::UnclosedQuote.at(self.loc_at(self.token_start))),
            }
        }

        self.push_token(Tag::Str, buf);
        Ok(())
    }

    /// Analyzes the next characters in the input as a set of punctuation marks.
    ///
    /// The longest spelling that is a known symbol is taken.
    /// This function consumes characters from the input and can add
    /// operator or delimiter tokens to the output.
    fn push_punct(&mut self) -> LexResult<()> {
        use self::token::PUNCT_MAP;

        struct Trie<V> {
            entry: Option<V>, // if no entry, this is a root
            children: HashMap<char, Trie<V>>
        }
        impl<V> Trie<V> {
            // Not checked, but iterator should only have unique keys
            fn new<'a>(it: impl IntoIterator<Item=(&'a str, V)>) -> Self {
                let mut trie = Trie {
                    entry: None,
                    children: HashMap::new()
                };

                for (k, v) in it {
                    let leaf = k.chars().fold(&mut trie, |trie, c| {
                        trie.children.entry(c).or_insert_with(|| {
                            Trie { entry: None, children: HashMap::new() }
                        })
                    });

                    leaf.entry = Some(v);
                }

                trie
            }

            fn get_child(&self, c: char) -> Option<&Trie<V>> {
                self.children.get(&c)
            }
        }
        static TRIE: OnceLock<Trie<Tag>> = OnceLock::new();

        let mut buf = String::new();
        let mut trie = TRIE.get_or_init(|| Trie::new(
            PUNCT_MAP.iter().map(|(&k, &v)| (k, v))
        ));

        // Find the first trie ref that points to a token.
        while trie.entry.is_none() {
            let found_next_trie = 'token: {
                let Some(c) = self.match_cls(CharClass::Punct) else { break 'token false };
                buf.push(c);

                match trie.get_child(c) {
                    Some(child) => {
                        trie = child;
                        true
                    },
                    None => break 'token false,
                }
            };

            if !found_next_trie {
                let err = match buf.starts_with('!') {
                    true  => LexErr::BareBang,
                    false => LexErr::UnknownOp(buf),
                };
                return Err(err.at(self.loc_at(self.token_start)));
            }
        }

        // We have a match, but keep checking for tries in case there are longer chains:
        let mut peek_trie = trie;
        let mut consumed: usize = 0;

        let it = self.remaining.iter()
            .copied()
            .take_while(|&c| matches!(CharClass::of(c), Some(CharClass::Punct)))
            .enumerate();
        for (i, c) in it {
            if let Some(ctrie) = peek_trie.get_child(c) {
                peek_trie = ctrie;
                if peek_trie.entry.is_some() {
                    trie = peek_trie;
                    consumed = i + 1;
                }
            } else {
                break;
            }
        }

        buf.push_str(&self.next_n(consumed));

        let Some(tag) = trie.entry else {
            return Err(LexErr::UnknownOp(buf).at(self.loc_at(self.token_start)));
        };

        if tag.closer().is_some() {
            self.delimiters.push((self.loc_at(self.token_start), tag));
        } else if tag.is_closer() {
            self.match_delimiter(tag)?;
        }

        // punctuation is identified by its tag alone
        self.push_token(tag, String::new());
        Ok(())
    }

    /// Verify that the top delimiter in the delimiter stack is closed by the given tag,
    /// and pop it if it is.
    fn match_delimiter(&mut self, closer: Tag) -> LexResult<()> {
        match self.delimiters.last() {
            Some((_, open)) if open.closer() == Some(closer) => {
                self.delimiters.pop();
                Ok(())
            },
            Some(_) => Err(LexErr::MismatchedDelimiter.at(self.loc_at(self.token_start))),
            None => Err(LexErr::UnmatchedDelimiter.at(self.loc_at(self.token_start))),
        }
    }
}
