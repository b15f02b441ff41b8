//! Tokenizer for path sources.
//!
//! Produces a flat token stream with byte positions for parser errors. The
//! two-dot token serves both the parent segment (`..`) and the range
//! delimiter (`[0..-1]`); the parser disambiguates by context. Quoted text
//! serves both quoted field names and string literals, with the escape table
//! applied here: `\n \r \t \\ \' \"` map to their characters and a backslash
//! before any other character passes through as `\X`.

use crate::error::{PathError, PathErrorKind, PathResult};

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character in the source.
    pub start: usize,
}

/// The kind of a lexed token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `.`
    Dot,
    /// `..`: parent segment or range delimiter, depending on context.
    DotDot,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `*`
    Star,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// An unquoted name: `[A-Za-z_][A-Za-z0-9_]*`.
    Identifier(String),
    /// Quoted text (`'..'` or `".."`), escapes already applied. Used as a
    /// quoted field name in segment position and a string literal elsewhere.
    Quoted(String),
    /// A signed integer literal.
    Number(i64),
}

impl TokenKind {
    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Slash => "'/'".to_owned(),
            Self::DoubleSlash => "'//'".to_owned(),
            Self::Dot => "'.'".to_owned(),
            Self::DotDot => "'..'".to_owned(),
            Self::LeftBracket => "'['".to_owned(),
            Self::RightBracket => "']'".to_owned(),
            Self::LeftParen => "'('".to_owned(),
            Self::RightParen => "')'".to_owned(),
            Self::Comma => "','".to_owned(),
            Self::Star => "'*'".to_owned(),
            Self::Equal => "'='".to_owned(),
            Self::NotEqual => "'!='".to_owned(),
            Self::Less => "'<'".to_owned(),
            Self::LessEqual => "'<='".to_owned(),
            Self::Greater => "'>'".to_owned(),
            Self::GreaterEqual => "'>='".to_owned(),
            Self::Identifier(name) => format!("identifier '{name}'"),
            Self::Quoted(text) => format!("quoted text '{text}'"),
            Self::Number(n) => format!("number {n}"),
        }
    }
}

/// Tokenizes a full path source.
pub(crate) fn tokenize(source: &str) -> PathResult<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let b = bytes[pos];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
            }
            b'/' => {
                if bytes.get(pos + 1) == Some(&b'/') {
                    tokens.push(Token {
                        kind: TokenKind::DoubleSlash,
                        start,
                    });
                    pos += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Slash,
                        start,
                    });
                    pos += 1;
                }
            }
            b'.' => {
                if bytes.get(pos + 1) == Some(&b'.') {
                    tokens.push(Token {
                        kind: TokenKind::DotDot,
                        start,
                    });
                    pos += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Dot, start });
                    pos += 1;
                }
            }
            b'[' => {
                tokens.push(Token {
                    kind: TokenKind::LeftBracket,
                    start,
                });
                pos += 1;
            }
            b']' => {
                tokens.push(Token {
                    kind: TokenKind::RightBracket,
                    start,
                });
                pos += 1;
            }
            b'(' => {
                tokens.push(Token {
                    kind: TokenKind::LeftParen,
                    start,
                });
                pos += 1;
            }
            b')' => {
                tokens.push(Token {
                    kind: TokenKind::RightParen,
                    start,
                });
                pos += 1;
            }
            b',' => {
                tokens.push(Token {
                    kind: TokenKind::Comma,
                    start,
                });
                pos += 1;
            }
            b'*' => {
                tokens.push(Token {
                    kind: TokenKind::Star,
                    start,
                });
                pos += 1;
            }
            b'=' => {
                tokens.push(Token {
                    kind: TokenKind::Equal,
                    start,
                });
                pos += 1;
            }
            b'!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::NotEqual,
                        start,
                    });
                    pos += 2;
                } else {
                    return Err(PathError::compile(
                        PathErrorKind::Lex,
                        start,
                        "expected '=' after '!'",
                    ));
                }
            }
            b'<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::LessEqual,
                        start,
                    });
                    pos += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Less,
                        start,
                    });
                    pos += 1;
                }
            }
            b'>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::GreaterEqual,
                        start,
                    });
                    pos += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Greater,
                        start,
                    });
                    pos += 1;
                }
            }
            b'\'' | b'"' => {
                let (text, next) = lex_quoted(source, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Quoted(text),
                    start,
                });
                pos = next;
            }
            b'-' => {
                if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
                    let (value, next) = lex_number(source, pos)?;
                    tokens.push(Token {
                        kind: TokenKind::Number(value),
                        start,
                    });
                    pos = next;
                } else {
                    return Err(PathError::compile(
                        PathErrorKind::Lex,
                        start,
                        "expected a digit after '-'",
                    ));
                }
            }
            b'0'..=b'9' => {
                let (value, next) = lex_number(source, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    start,
                });
                pos = next;
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                let mut end = pos + 1;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                    end += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Identifier(source[pos..end].to_owned()),
                    start,
                });
                pos = end;
            }
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(PathError::compile(
                    PathErrorKind::Lex,
                    start,
                    format!("unexpected character '{ch}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Lexes a quoted name or string literal starting at the opening quote.
/// Returns the unescaped text and the position just past the closing quote.
fn lex_quoted(source: &str, start: usize) -> PathResult<(String, usize)> {
    let bytes = source.as_bytes();
    let quote = bytes[start];
    let mut text = String::new();
    let mut pos = start + 1;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                let Some(&escaped) = bytes.get(pos + 1) else {
                    return Err(PathError::compile(
                        PathErrorKind::Lex,
                        start,
                        "unterminated escape in quoted text",
                    ));
                };
                match escaped {
                    b'n' => text.push('\n'),
                    b'r' => text.push('\r'),
                    b't' => text.push('\t'),
                    b'\\' => text.push('\\'),
                    b'\'' => text.push('\''),
                    b'"' => text.push('"'),
                    _ => {
                        // Unknown escapes pass through with the backslash.
                        text.push('\\');
                        let ch = source[pos + 1..].chars().next().unwrap_or('?');
                        text.push(ch);
                        pos += 1 + ch.len_utf8();
                        continue;
                    }
                }
                pos += 2;
            }
            b if b == quote => return Ok((text, pos + 1)),
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                text.push(ch);
                pos += ch.len_utf8();
            }
        }
    }

    Err(PathError::compile(
        PathErrorKind::Lex,
        start,
        "unterminated quoted text",
    ))
}

/// Lexes a (possibly negative) integer literal. Returns the value and the
/// position just past the last digit.
fn lex_number(source: &str, start: usize) -> PathResult<(i64, usize)> {
    let bytes = source.as_bytes();
    let mut end = start + 1;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    match source[start..end].parse() {
        Ok(value) => Ok((value, end)),
        Err(_) => Err(PathError::compile(
            PathErrorKind::Lex,
            start,
            format!("integer literal '{}' out of range", &source[start..end]),
        )),
    }
}
