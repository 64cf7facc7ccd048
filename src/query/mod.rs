//! # Query language: compile a predicate, match it against events.
//!
//! A [`Query`] is an immutable predicate over the composite keys of an
//! event list, compiled from a textual expression:
//!
//! ```text
//! tm.event='NewBlock' AND block.height > 100
//! transfer.sender CONTAINS 'addr' OR transfer.recipient EXISTS
//! block.time >= TIME 2022-01-01T10:00:00Z
//! ```
//!
//! ## Contents
//! - [`Query`] parse, match, display
//! - [`ParseError`] static compilation errors
//!
//! ## Rules
//! - Matching is **total and deterministic**: all failure modes are caught
//!   at parse time, and value coercion failures count as "does not satisfy".
//! - A condition holds iff at least one value under its tag satisfies it;
//!   conditions on the same tag may be met by different occurrences.
//! - The empty query ([`Query::match_all`]) is a distinct value that
//!   matches every event list; parsing `""` is an error.
//!
//! ## Example
//! ```rust
//! use querybus::{Event, Query};
//!
//! let q: Query = "tx.height = 1 AND tx.hash EXISTS".parse().unwrap();
//! let events = vec![Event::new("tx")
//!     .with_attribute("height", "1")
//!     .with_attribute("hash", "ABC")];
//!
//! assert!(q.matches(&events));
//! assert_eq!(q.to_string(), "tx.height = 1 AND tx.hash EXISTS");
//! ```

mod ast;
mod error;
mod parser;
mod token;

use std::fmt;
use std::str::FromStr;

use crate::events::Event;
use ast::Condition;

pub use error::ParseError;

/// A compiled boolean predicate over composite event keys.
///
/// Cheap to clone; equality and hashing follow the source text, which is
/// also what subscription uniqueness is keyed on.
#[derive(Clone, Debug)]
pub struct Query {
    source: String,
    /// Disjunction of conjunctions; empty means match-all.
    disjuncts: Vec<Vec<Condition>>,
}

impl Query {
    /// Compiles a textual expression.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let disjuncts = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            disjuncts,
        })
    }

    /// The distinct empty query: matches every event list, displays as `""`.
    pub fn match_all() -> Self {
        Self {
            source: String::new(),
            disjuncts: Vec::new(),
        }
    }

    /// True if this is the [`match_all`](Self::match_all) query.
    pub fn is_match_all(&self) -> bool {
        self.disjuncts.is_empty()
    }

    /// Evaluates the predicate against an event list.
    ///
    /// Total and deterministic (repeated calls on the same input yield the
    /// same boolean); missing keys fail their conditions, coercion failures
    /// fail the individual value.
    pub fn matches(&self, events: &[Event]) -> bool {
        if self.disjuncts.is_empty() {
            return true;
        }
        let index = ast::attribute_index(events);
        self.disjuncts
            .iter()
            .any(|conj| conj.iter().all(|cond| cond.is_met(index.get(&cond.tag))))
    }
}

impl fmt::Display for Query {
    /// Reproduces the exact source text the query was compiled from.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Query {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Query::parse(s)
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Query {}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(source: &str) -> Query {
        Query::parse(source).unwrap()
    }

    #[test]
    fn direct_match_on_two_conditions() {
        let events = vec![Event::new("tx")
            .with_attribute("height", "1")
            .with_attribute("hash", "ABC")];

        assert!(q("tx.height = 1 AND tx.hash = 'ABC'").matches(&events));
        assert!(!q("tx.height = 2").matches(&events));
    }

    #[test]
    fn repeated_attribute_conjunction() {
        let events = vec![
            Event::new("transfer").with_attribute("sender", "foo"),
            Event::new("transfer").with_attribute("sender", "baz"),
        ];

        assert!(q("transfer.sender = 'foo' AND transfer.sender = 'baz'").matches(&events));
        assert!(!q("transfer.sender = 'foo' AND transfer.sender = 'nope'").matches(&events));
    }

    #[test]
    fn or_of_ands() {
        let events = vec![Event::new("tx").with_attribute("height", "5")];

        assert!(q("tx.height = 1 OR tx.height > 4").matches(&events));
        assert!(!q("tx.height = 1 OR tx.height > 5").matches(&events));
        assert!(q("tx.height = 1 AND tx.hash EXISTS OR tx.height = 5").matches(&events));
    }

    #[test]
    fn match_all_is_distinct_and_matches_everything() {
        let all = Query::match_all();
        assert!(all.is_match_all());
        assert!(all.matches(&[]));
        assert!(all.matches(&[Event::new("anything")]));
        assert_eq!(all.to_string(), "");
        assert_eq!(Query::parse(""), Err(ParseError::Empty));
    }

    #[test]
    fn display_round_trips_source_text() {
        let source = "tx.height = 1 AND tx.hash CONTAINS 'AB'";
        assert_eq!(q(source).to_string(), source);
    }

    #[test]
    fn equality_follows_source_text() {
        assert_eq!(q("a EXISTS"), q("a EXISTS"));
        assert_ne!(q("a EXISTS"), q("a  EXISTS"));
    }

    #[test]
    fn deterministic_over_repeated_calls() {
        let query = q("tx.height < 10 AND tx.height > 1");
        let events = vec![Event::new("tx").with_attribute("height", "5")];
        for _ in 0..100 {
            assert!(query.matches(&events));
        }
    }

    #[test]
    fn numeric_comparisons_coerce_attribute_strings() {
        let events = vec![Event::new("block").with_attribute("height", "100")];

        assert!(q("block.height >= 100").matches(&events));
        assert!(q("block.height <= 100.5").matches(&events));
        assert!(!q("block.height > 100").matches(&events));
    }

    #[test]
    fn time_window_query() {
        let events = vec![Event::new("block").with_attribute("time", "2022-06-01T12:00:00Z")];

        assert!(q("block.time >= TIME 2022-06-01T00:00:00Z").matches(&events));
        assert!(!q("block.time < TIME 2022-06-01T12:00:00Z").matches(&events));
        assert!(q("block.time > DATE 2022-05-31").matches(&events));
    }
}
