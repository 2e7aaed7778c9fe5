//! Closed-form script lexer.
//!
//! Rules are tried in order at each position of a line:
//!
//! 1. inside a `/* … */` comment, skip to the close marker
//! 2. whitespace and `;` separators
//! 3. `//` line comment
//! 4. `/*` opens a block comment
//! 5. numeric literal `[0-9]*\.?[0-9]+` (a bare `.5` becomes `0.5`)
//! 6. operator, longest match first
//! 7. identifier; `pi` and `e` lex directly as numbers
//! 8. external tag `#name#`

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::error::{CompileError, Pos};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    LParen,
    RParen,
    LBrace,
    RBrace,
    Ne,        // !=
    Bang,      // !
    Caret,     // ^
    Star,      // *
    Slash,     // /
    Percent,   // %
    Plus,      // +
    Minus,     // -
    Le,        // <=
    LtStrict,  // <:
    LtGt,      // <>
    Lt,        // <
    Ge,        // >=
    GtStrict,  // >:
    Gt,        // >
    AndAnd,    // &&
    OrOr,      // ||
    EqEq,      // ==
    Eq,        // =
    Question,  // ?
    Colon,     // :
    Comma,     // ,
}

/// Operator spellings in match order: every multi-character operator comes
/// before any operator that is a prefix of it.
const OPERATORS: &[(&str, Op)] = &[
    ("(", Op::LParen),
    (")", Op::RParen),
    ("{", Op::LBrace),
    ("}", Op::RBrace),
    ("!=", Op::Ne),
    ("!", Op::Bang),
    ("^", Op::Caret),
    ("*", Op::Star),
    ("/", Op::Slash),
    ("%", Op::Percent),
    ("+", Op::Plus),
    ("-", Op::Minus),
    ("<=", Op::Le),
    ("<:", Op::LtStrict),
    ("<>", Op::LtGt),
    ("<", Op::Lt),
    (">=", Op::Ge),
    (">:", Op::GtStrict),
    (">", Op::Gt),
    ("&&", Op::AndAnd),
    ("||", Op::OrOr),
    ("==", Op::EqEq),
    ("=", Op::Eq),
    ("?", Op::Question),
    (":", Op::Colon),
    (",", Op::Comma),
];

/// Identifiers that lex as numeric literals.
const NAMED_NUMBERS: &[(&str, f64)] = &[("pi", std::f64::consts::PI), ("e", std::f64::consts::E)];

const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n', ';', '\x0c', '\x0b'];

impl Op {
    pub fn text(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Op(Op),
    Int(i64),
    Float(f64),
    Ident(String),
    Tag(String),
    Eof,
}

impl TokenKind {
    /// Token class name used in "Expected IDENTIFIER, saw NUMBER" messages.
    pub fn category(&self) -> &'static str {
        match self {
            TokenKind::Op(_) => "OPERATOR",
            TokenKind::Int(_) | TokenKind::Float(_) => "NUMBER",
            TokenKind::Ident(_) => "IDENTIFIER",
            TokenKind::Tag(_) => "TAG",
            TokenKind::Eof => "(end of input)",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Op(op) => write!(f, "`{}'", op.text()),
            TokenKind::Int(n) => write!(f, "`{n}'"),
            TokenKind::Float(x) => write!(f, "`{x}'"),
            TokenKind::Ident(s) | TokenKind::Tag(s) => write!(f, "`{s}'"),
            TokenKind::Eof => f.write_str("(end of input)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Patterns {
    number: Regex,
    ident: Regex,
    tag: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        number: Regex::new(r"^[0-9]*\.?[0-9]+").expect("number pattern"),
        ident: Regex::new(r"^[A-Za-z_][0-9A-Za-z_]*").expect("identifier pattern"),
        tag: Regex::new(r"^#[0-9A-Za-z_]*#").expect("tag pattern"),
    })
}

pub struct Lexer<'a> {
    src: &'a str,
    in_comment: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            in_comment: false,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut last = Pos::new(1, 1);
        for (idx, line) in self.src.lines().enumerate() {
            let line_no = idx + 1;
            self.lex_line(line, line_no)?;
            last = Pos::new(line_no, line.chars().count() + 1);
        }
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            line: last.line,
            col: last.col,
        });
        Ok(self.tokens)
    }

    fn lex_line(&mut self, line: &str, line_no: usize) -> Result<(), CompileError> {
        let pats = patterns();
        let mut i = 0;
        while i < line.len() {
            let rest = &line[i..];
            let col = line[..i].chars().count() + 1;

            if self.in_comment {
                match rest.find("*/") {
                    Some(end) => {
                        self.in_comment = false;
                        i += end + 2;
                        continue;
                    }
                    None => break,
                }
            }

            let Some(ch) = rest.chars().next() else { break };
            if WHITESPACE.contains(&ch) {
                i += ch.len_utf8();
                continue;
            }
            if rest.starts_with("//") {
                break;
            }
            if rest.starts_with("/*") {
                self.in_comment = true;
                i += 2;
                continue;
            }

            if let Some(m) = pats.number.find(rest) {
                let text = m.as_str();
                let kind = number_kind(text, line_no, col)?;
                self.push(kind, line_no, col);
                i += text.len();
                continue;
            }

            if let Some((text, op)) = OPERATORS.iter().find(|(text, _)| rest.starts_with(text)) {
                self.push(TokenKind::Op(*op), line_no, col);
                i += text.len();
                continue;
            }

            if let Some(m) = pats.ident.find(rest) {
                let text = m.as_str();
                let kind = match NAMED_NUMBERS.iter().find(|(name, _)| *name == text) {
                    Some((_, value)) => TokenKind::Float(*value),
                    None => TokenKind::Ident(text.to_owned()),
                };
                self.push(kind, line_no, col);
                i += text.len();
                continue;
            }

            if let Some(m) = pats.tag.find(rest) {
                let text = m.as_str();
                self.push(TokenKind::Tag(text.to_owned()), line_no, col);
                i += text.len();
                continue;
            }

            return Err(CompileError::Lexical {
                text: rest.to_owned(),
                pos: Pos::new(line_no, col),
            });
        }
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, line: usize, col: usize) {
        self.tokens.push(Token { kind, line, col });
    }
}

fn number_kind(text: &str, line: usize, col: usize) -> Result<TokenKind, CompileError> {
    let invalid = || CompileError::Lexical {
        text: text.to_owned(),
        pos: Pos::new(line, col),
    };
    if text.contains('.') {
        let normalized = if text.starts_with('.') {
            format!("0{text}")
        } else {
            text.to_owned()
        };
        let value: f64 = normalized.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        Ok(TokenKind::Float(value))
    } else {
        match text.parse() {
            Ok(n) => Ok(TokenKind::Int(n)),
            // wider than i64: still a valid literal
            Err(_) => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(TokenKind::Float)
                .ok_or_else(invalid),
        }
    }
}

/// Tokenize a source string.
pub fn tokenize(src: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(src).tokenize()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
