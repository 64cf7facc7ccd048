//! # Compiled form of a query and its evaluation rules.
//!
//! A parsed expression normalizes to a disjunction of conjunctions of
//! atomic [`Condition`]s (the grammar has no parentheses, so `AND` binding
//! tighter than `OR` yields exactly that shape).
//!
//! ## Matching
//! Evaluation runs against the *attribute index* of an event list: a map
//! from composite key (`"{event_type}.{attribute_key}"`) to every value
//! recorded under it, across repeated events and repeated keys. A condition
//! holds iff **at least one** value under its tag satisfies it; two
//! conditions on the same tag may be satisfied by different occurrences.
//!
//! Coercion of attribute values (to numbers, dates, times) is best-effort:
//! a value that does not coerce simply does not satisfy the condition.
//! Evaluation is total — there is no error channel.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::events::Event;

/// Comparison operator of an atomic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Op {
    fn holds<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Op::Eq => lhs == rhs,
            Op::Lt => lhs < rhs,
            Op::Gt => lhs > rhs,
            Op::Le => lhs <= rhs,
            Op::Ge => lhs >= rhs,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Str(String),
    Num(f64),
    Date(NaiveDate),
    Time(DateTime<Utc>),
}

impl Operand {
    /// Whether a single attribute value satisfies `op` against this operand.
    ///
    /// String operands only support equality; ordered comparison against a
    /// string never matches.
    fn satisfied_by(&self, op: Op, value: &str) -> bool {
        match self {
            Operand::Str(s) => op == Op::Eq && value == s,
            Operand::Num(n) => value
                .parse::<f64>()
                .is_ok_and(|v| op.holds(v, *n)),
            Operand::Date(d) => coerce_date(value).is_some_and(|v| op.holds(v, *d)),
            Operand::Time(t) => coerce_time(value).is_some_and(|v| op.holds(v, *t)),
        }
    }
}

/// The predicate applied to a tag's values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Term {
    /// `tag op operand`
    Cmp(Op, Operand),
    /// `tag CONTAINS 'substring'`
    Contains(String),
    /// `tag EXISTS`
    Exists,
}

/// One atomic condition: a composite tag and the predicate on its values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub(crate) tag: String,
    pub(crate) term: Term,
}

impl Condition {
    /// Evaluates the condition against the values recorded under its tag.
    ///
    /// A missing tag fails every term, `EXISTS` included (its multiset is
    /// empty).
    pub(crate) fn is_met(&self, values: Option<&Vec<String>>) -> bool {
        let Some(values) = values else { return false };
        match &self.term {
            Term::Exists => !values.is_empty(),
            Term::Contains(needle) => values.iter().any(|v| v.contains(needle.as_str())),
            Term::Cmp(op, operand) => values.iter().any(|v| operand.satisfied_by(*op, v)),
        }
    }
}

/// Builds the composite-key → values index for one event list.
///
/// Events with an empty type contribute nothing. Values are recorded in
/// event order, one entry per attribute occurrence.
pub(crate) fn attribute_index(events: &[Event]) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for event in events {
        if event.event_type.is_empty() {
            continue;
        }
        for attr in &event.attributes {
            let key = format!("{}.{}", event.event_type, attr.key);
            index.entry(key).or_default().push(attr.value.clone());
        }
    }
    index
}

fn coerce_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| coerce_time(value).map(|t| t.date_naive()))
}

fn coerce_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(tag: &str, term: Term) -> Condition {
        Condition {
            tag: tag.to_string(),
            term,
        }
    }

    #[test]
    fn index_collects_repeated_keys_across_events() {
        let events = vec![
            Event::new("transfer").with_attribute("sender", "foo"),
            Event::new("transfer").with_attribute("sender", "baz"),
            Event::new("").with_attribute("ignored", "x"),
        ];
        let index = attribute_index(&events);

        assert_eq!(
            index.get("transfer.sender"),
            Some(&vec!["foo".to_string(), "baz".to_string()])
        );
        assert!(!index.contains_key(".ignored"));
    }

    #[test]
    fn any_value_satisfies() {
        let values = vec!["foo".to_string(), "baz".to_string()];
        let c = cond("t.s", Term::Cmp(Op::Eq, Operand::Str("baz".into())));
        assert!(c.is_met(Some(&values)));

        let c = cond("t.s", Term::Cmp(Op::Eq, Operand::Str("nope".into())));
        assert!(!c.is_met(Some(&values)));
    }

    #[test]
    fn missing_tag_fails_even_exists() {
        assert!(!cond("t.s", Term::Exists).is_met(None));
        assert!(cond("t.s", Term::Exists).is_met(Some(&vec!["x".into()])));
    }

    #[test]
    fn numeric_coercion_failure_is_not_a_match() {
        let values = vec!["abc".to_string(), "10".to_string()];
        let c = cond("t.n", Term::Cmp(Op::Gt, Operand::Num(5.0)));
        assert!(c.is_met(Some(&values)));

        let only_junk = vec!["abc".to_string()];
        assert!(!c.is_met(Some(&only_junk)));
    }

    #[test]
    fn string_operand_rejects_ordered_comparison() {
        let values = vec!["b".to_string()];
        let c = cond("t.s", Term::Cmp(Op::Gt, Operand::Str("a".into())));
        assert!(!c.is_met(Some(&values)));
    }

    #[test]
    fn contains_is_substring_on_any_value() {
        let values = vec!["alpha".to_string(), "beta".to_string()];
        assert!(cond("t.s", Term::Contains("et".into())).is_met(Some(&values)));
        assert!(!cond("t.s", Term::Contains("gamma".into())).is_met(Some(&values)));
    }

    #[test]
    fn date_operand_accepts_plain_and_rfc3339_values() {
        let d = NaiveDate::from_ymd_opt(2022, 5, 12).unwrap();
        let c = cond("block.date", Term::Cmp(Op::Ge, Operand::Date(d)));

        assert!(c.is_met(Some(&vec!["2022-05-12".to_string()])));
        assert!(c.is_met(Some(&vec!["2022-05-13T00:30:00Z".to_string()])));
        assert!(!c.is_met(Some(&vec!["2022-05-11".to_string()])));
        assert!(!c.is_met(Some(&vec!["not-a-date".to_string()])));
    }

    #[test]
    fn time_operand_compares_in_utc() {
        let t = DateTime::parse_from_rfc3339("2013-05-03T14:45:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let c = cond("block.time", Term::Cmp(Op::Lt, Operand::Time(t)));

        assert!(c.is_met(Some(&vec!["2013-05-03T14:44:59Z".to_string()])));
        // Same instant, different zone offset.
        assert!(!c.is_met(Some(&vec!["2013-05-03T16:45:00+02:00".to_string()])));
    }
}
