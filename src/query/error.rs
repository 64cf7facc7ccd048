//! # Query parse errors.
//!
//! All failure modes of the predicate language surface at parse time;
//! evaluation of a compiled [`Query`](crate::Query) is total.

use thiserror::Error;

/// Errors reported while compiling a textual query expression.
///
/// Offsets are byte positions into the source string.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The source was empty or all whitespace. The matches-everything
    /// query is a distinct value ([`Query::match_all`](crate::Query::match_all)),
    /// not the result of parsing `""`.
    #[error("empty query")]
    Empty,

    /// A string literal was opened but never closed.
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString {
        /// Position of the opening quote.
        offset: usize,
    },

    /// A character that cannot begin any token.
    #[error("unexpected character {ch:?} at byte {offset}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Position of the character.
        offset: usize,
    },

    /// The source ended where more input was required.
    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for.
        expected: &'static str,
    },

    /// A well-formed token in a position where it is not allowed.
    #[error("unexpected token at byte {offset}, expected {expected}")]
    UnexpectedToken {
        /// Position of the token.
        offset: usize,
        /// What the parser was looking for.
        expected: &'static str,
    },

    /// A word in tag position that is not a valid composite key.
    #[error("invalid tag {tag:?} at byte {offset}")]
    InvalidTag {
        /// The rejected word.
        tag: String,
        /// Position of the word.
        offset: usize,
    },

    /// A `DATE` operand that does not parse as `YYYY-MM-DD`.
    #[error("invalid date literal {literal:?} at byte {offset}")]
    InvalidDate {
        /// The rejected literal.
        literal: String,
        /// Position of the literal.
        offset: usize,
    },

    /// A `TIME` operand that does not parse as RFC 3339.
    #[error("invalid time literal {literal:?} at byte {offset}")]
    InvalidTime {
        /// The rejected literal.
        literal: String,
        /// Position of the literal.
        offset: usize,
    },
}
