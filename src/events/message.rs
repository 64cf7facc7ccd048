//! # Message envelope delivered to subscribers and the observer.
//!
//! A [`Message`] pairs an opaque payload with the events it was published
//! with. The event list is shared (`Arc`) across every delivery of one
//! publish; the payload is cloned once per matching subscription.
//!
//! The dispatcher never inspects the payload. `subscription_id` identifies
//! the queue a particular copy was delivered to; the observer's copy has
//! none, because it runs before any subscriber sees the message.

use std::sync::Arc;

use crate::events::Event;
use crate::subscription::SubscriptionId;

/// A published payload together with its originating events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<M> {
    data: M,
    events: Arc<[Event]>,
    subscription_id: Option<SubscriptionId>,
}

impl<M> Message<M> {
    /// Creates a message not yet bound to any subscription.
    pub(crate) fn new(data: M, events: Arc<[Event]>) -> Self {
        Self {
            data,
            events,
            subscription_id: None,
        }
    }

    /// Binds a copy of the message to the subscription it is delivered to.
    pub(crate) fn for_subscription(&self, id: SubscriptionId) -> Self
    where
        M: Clone,
    {
        Self {
            data: self.data.clone(),
            events: Arc::clone(&self.events),
            subscription_id: Some(id),
        }
    }

    /// Borrows the payload.
    pub fn data(&self) -> &M {
        &self.data
    }

    /// Consumes the message, returning the payload.
    pub fn into_data(self) -> M {
        self.data
    }

    /// The events the message was published with.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The subscription this copy was delivered to, if any.
    ///
    /// `None` for the copy handed to the observer.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription_id
    }
}
