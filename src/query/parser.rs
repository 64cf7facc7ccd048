//! # Recursive-descent parser for the query language.
//!
//! Grammar (left-associative, `AND` binds tighter than `OR`):
//!
//! ```text
//! expr     := and_expr ('OR' and_expr)*
//! and_expr := cond ('AND' cond)*
//! cond     := tag op operand | tag 'CONTAINS' string | tag 'EXISTS'
//! op       := '=' | '<' | '>' | '<=' | '>='
//! operand  := string | number | 'DATE' date | 'TIME' time
//! tag      := ident ('.' ident)*
//! ```
//!
//! The output is the disjunctive normal form the grammar induces: a list of
//! conjunctions, each a list of [`Condition`]s.

use chrono::{DateTime, NaiveDate, Utc};

use super::ast::{Condition, Op, Operand, Term};
use super::error::ParseError;
use super::token::{tokenize, Token};

/// Parses `source` into its disjunction-of-conjunctions form.
pub(crate) fn parse(source: &str) -> Result<Vec<Vec<Condition>>, ParseError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    Parser { tokens, pos: 0 }.expr()
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn expr(mut self) -> Result<Vec<Vec<Condition>>, ParseError> {
        let mut disjuncts = vec![self.and_expr()?];
        while self.eat(&Token::Or) {
            disjuncts.push(self.and_expr()?);
        }
        match self.tokens.get(self.pos) {
            None => Ok(disjuncts),
            Some(&(offset, _)) => Err(ParseError::UnexpectedToken {
                offset,
                expected: "AND, OR, or end of query",
            }),
        }
    }

    fn and_expr(&mut self) -> Result<Vec<Condition>, ParseError> {
        let mut conds = vec![self.cond()?];
        while self.eat(&Token::And) {
            conds.push(self.cond()?);
        }
        Ok(conds)
    }

    fn cond(&mut self) -> Result<Condition, ParseError> {
        let tag = self.tag()?;
        let term = match self.next("comparison operator, CONTAINS, or EXISTS")? {
            (_, Token::Eq) => Term::Cmp(Op::Eq, self.operand()?),
            (_, Token::Lt) => Term::Cmp(Op::Lt, self.operand()?),
            (_, Token::Gt) => Term::Cmp(Op::Gt, self.operand()?),
            (_, Token::Le) => Term::Cmp(Op::Le, self.operand()?),
            (_, Token::Ge) => Term::Cmp(Op::Ge, self.operand()?),
            (offset, Token::Contains) => match self.next("string literal")? {
                (_, Token::Str(s)) => Term::Contains(s),
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        offset,
                        expected: "string literal after CONTAINS",
                    })
                }
            },
            (_, Token::Exists) => Term::Exists,
            (offset, _) => {
                return Err(ParseError::UnexpectedToken {
                    offset,
                    expected: "comparison operator, CONTAINS, or EXISTS",
                })
            }
        };
        Ok(Condition { tag, term })
    }

    fn tag(&mut self) -> Result<String, ParseError> {
        match self.next("tag")? {
            (offset, Token::Word(word)) => {
                if is_valid_tag(&word) {
                    Ok(word)
                } else {
                    Err(ParseError::InvalidTag { tag: word, offset })
                }
            }
            (offset, _) => Err(ParseError::UnexpectedToken {
                offset,
                expected: "tag",
            }),
        }
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        match self.next("operand")? {
            (_, Token::Str(s)) => Ok(Operand::Str(s)),
            (_, Token::Num(n)) => Ok(Operand::Num(n)),
            (_, Token::Date) => match self.next("date literal")? {
                (offset, Token::Word(word)) => NaiveDate::parse_from_str(&word, "%Y-%m-%d")
                    .map(Operand::Date)
                    .map_err(|_| ParseError::InvalidDate {
                        literal: word,
                        offset,
                    }),
                (offset, _) => Err(ParseError::UnexpectedToken {
                    offset,
                    expected: "date literal",
                }),
            },
            (_, Token::Time) => match self.next("time literal")? {
                (offset, Token::Word(word)) => DateTime::parse_from_rfc3339(&word)
                    .map(|t| Operand::Time(t.with_timezone(&Utc)))
                    .map_err(|_| ParseError::InvalidTime {
                        literal: word,
                        offset,
                    }),
                (offset, _) => Err(ParseError::UnexpectedToken {
                    offset,
                    expected: "time literal",
                }),
            },
            (offset, _) => Err(ParseError::UnexpectedToken {
                offset,
                expected: "operand",
            }),
        }
    }

    fn next(&mut self, expected: &'static str) -> Result<(usize, Token), ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(ParseError::UnexpectedEnd { expected }),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos).map(|(_, t)| t) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

/// A tag is dot-separated identifier segments: letters, digits, underscore.
fn is_valid_tag(word: &str) -> bool {
    !word.is_empty()
        && word.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
