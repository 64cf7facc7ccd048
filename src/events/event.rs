//! # Events attached to published messages.
//!
//! An [`Event`] is a `(type, attributes)` record supplied by the publisher
//! alongside a message. Queries address attribute values through *composite
//! keys* of the form `"{event_type}.{attribute_key}"`.
//!
//! ## Repeated keys
//! Neither event types nor attribute keys are deduplicated: the same type may
//! occur several times in one publish, and the same key several times in one
//! event. Every occurrence contributes its own value under the composite key,
//! which is what lets a conjunction like `transfer.sender='foo' AND
//! transfer.sender='baz'` match a single message.
//!
//! ## Example
//! ```rust
//! use querybus::Event;
//!
//! let ev = Event::new("tx")
//!     .with_attribute("height", "1")
//!     .with_attribute("hash", "ABC");
//!
//! assert_eq!(ev.event_type, "tx");
//! assert_eq!(ev.attributes.len(), 2);
//! ```

/// A single key/value attribute of an [`Event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventAttribute {
    /// Attribute key, opaque to the dispatcher.
    pub key: String,
    /// Attribute value, always carried as a string.
    pub value: String,
}

impl EventAttribute {
    /// Creates a new attribute.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A typed event accompanying a published message.
///
/// The dispatcher treats `event_type` and attribute keys as opaque strings
/// and does not uniquify them. An event with an empty `event_type`
/// contributes no composite keys and is invisible to queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Event type, the first half of each composite key.
    pub event_type: String,
    /// Ordered attribute list; order is preserved but carries no meaning
    /// for query matching.
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    /// Creates an event with no attributes.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute::new(key, value));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_order_and_duplicates() {
        let ev = Event::new("transfer")
            .with_attribute("sender", "foo")
            .with_attribute("sender", "baz")
            .with_attribute("amount", "7");

        assert_eq!(ev.event_type, "transfer");
        assert_eq!(
            ev.attributes,
            vec![
                EventAttribute::new("sender", "foo"),
                EventAttribute::new("sender", "baz"),
                EventAttribute::new("amount", "7"),
            ]
        );
    }
}
