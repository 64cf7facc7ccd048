//! Event data model: what publishers attach and subscribers receive.
//!
//! ## Contents
//! - [`Event`], [`EventAttribute`] the `(type, attributes)` records a
//!   publish is tagged with; queries match on their composite keys
//! - [`Message`] the delivery envelope: payload + shared event list +
//!   owning subscription id
//!
//! ## Quick reference
//! - **Producers**: build `Event`s with the `with_attribute` builder and
//!   hand them to `Server::publish_with_events`.
//! - **Consumers**: receive `Message`s from `Subscription::next`; the
//!   observer receives an unbound copy before any subscriber.

mod event;
mod message;

pub use event::{Event, EventAttribute};
pub use message::Message;
