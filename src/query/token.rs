//! # Tokenizer for the query language.
//!
//! Splits a source string into keyword, word, literal, and operator tokens.
//! Every token carries the byte offset it started at, which parse errors
//! report back to the caller.
//!
//! Classification is minimal on purpose: a bare word that does not parse as
//! a number stays a [`Token::Word`], because depending on position it may be
//! a composite tag (`tx.height`) or a `DATE`/`TIME` literal (`2022-01-01`).
//! The parser decides which.

use super::error::ParseError;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `CONTAINS`
    Contains,
    /// `EXISTS`
    Exists,
    /// `DATE` (prefix of a calendar-date operand)
    Date,
    /// `TIME` (prefix of an RFC 3339 operand)
    Time,
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// A single-quoted string literal, unescaped.
    Str(String),
    /// A signed integer or decimal literal.
    Num(f64),
    /// Any other bare word: a tag or a date/time literal.
    Word(String),
}

/// Tokenizes `source`, returning `(byte offset, token)` pairs.
pub(crate) fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '=' => {
                chars.next();
                tokens.push((offset, Token::Eq));
            }
            '<' | '>' => {
                chars.next();
                let or_equal = matches!(chars.peek(), Some((_, '=')));
                if or_equal {
                    chars.next();
                }
                let tok = match (ch, or_equal) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::Le,
                    (_, false) => Token::Gt,
                    (_, true) => Token::Ge,
                };
                tokens.push((offset, tok));
            }
            '\'' => {
                chars.next();
                tokens.push((offset, Token::Str(read_string(offset, &mut chars)?)));
            }
            c if is_word_char(c) => {
                let word = read_word(&mut chars);
                tokens.push((offset, classify_word(word)));
            }
            _ => return Err(ParseError::UnexpectedChar { ch, offset }),
        }
    }

    Ok(tokens)
}

/// Characters that may appear in a bare word: tags, numbers, and
/// date/time literals all draw from this set.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '+' | ':')
}

fn read_word(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut word = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !is_word_char(c) {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

/// Reads the remainder of a string literal after its opening quote.
///
/// `\'` escapes a quote; any other backslash is literal.
fn read_string(
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<String, ParseError> {
    let mut value = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\'' => return Ok(value),
            '\\' => {
                if let Some(&(_, '\'')) = chars.peek() {
                    value.push('\'');
                    chars.next();
                } else {
                    value.push('\\');
                }
            }
            _ => value.push(c),
        }
    }
    Err(ParseError::UnterminatedString { offset: start })
}

fn classify_word(word: String) -> Token {
    match word.as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "CONTAINS" => Token::Contains,
        "EXISTS" => Token::Exists,
        "DATE" => Token::Date,
        "TIME" => Token::Time,
        _ => {
            if looks_numeric(&word) {
                if let Ok(n) = word.parse::<f64>() {
                    return Token::Num(n);
                }
            }
            Token::Word(word)
        }
    }
}

/// A word is treated as a number candidate only when it starts like one;
/// `2022-01-01` starts like one too, so the actual `f64` parse decides.
fn looks_numeric(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
}
