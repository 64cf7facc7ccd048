//! # Error types used by the dispatcher and subscriptions.
//!
//! This module defines two error enums:
//!
//! - [`ServerError`] errors raised by server operations (subscribe,
//!   unsubscribe, observe, publish, lifecycle).
//! - [`SubscriptionError`] errors surfaced through a subscription's
//!   delivery stream, including the terminal reasons latched on stop.
//!
//! Both types provide `as_label` returning a short stable snake_case
//! label for logs and metrics. Query compilation errors live in
//! [`ParseError`](crate::ParseError).

use thiserror::Error;

/// # Errors produced by server operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The server is not running: not started yet, or already stopped.
    #[error("pubsub server is stopped")]
    Stopped,

    /// `start` was called on a server that already ran.
    #[error("pubsub server is already started")]
    AlreadyStarted,

    /// A live subscription already exists for this client and query.
    #[error("client {client_id:?} is already subscribed to query {query:?}")]
    AlreadySubscribed {
        /// The subscribing client.
        client_id: String,
        /// The duplicate query string.
        query: String,
    },

    /// No live subscription matched an unsubscribe request.
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// `observe` was called while an observer is already registered.
    #[error("an observer is already registered")]
    ObserverAlreadyRegistered,

    /// An unsubscribe request without a subscriber.
    #[error("must specify a subscriber")]
    MissingSubscriber,

    /// An unsubscribe request carrying neither a subscription id nor a query.
    #[error("subscription is not fully defined [subscriber={subscriber:?}]")]
    UnderspecifiedUnsubscribe {
        /// The subscriber the request named.
        subscriber: String,
    },

    /// The caller's context was canceled before the operation completed.
    #[error("context canceled")]
    Canceled,
}

impl ServerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServerError::Stopped => "server_stopped",
            ServerError::AlreadyStarted => "server_already_started",
            ServerError::AlreadySubscribed { .. } => "already_subscribed",
            ServerError::SubscriptionNotFound => "subscription_not_found",
            ServerError::ObserverAlreadyRegistered => "observer_already_registered",
            ServerError::MissingSubscriber => "missing_subscriber",
            ServerError::UnderspecifiedUnsubscribe { .. } => "unsubscribe_underspecified",
            ServerError::Canceled => "canceled",
        }
    }
}

/// # Errors surfaced by a subscription.
///
/// `Unsubscribed` and `Terminated` are terminal: once latched, every
/// subsequent [`Subscription::next`](crate::Subscription::next) call
/// returns the same error. `OutOfCapacity` is the hard enqueue refusal
/// the sender reacts to by evicting; `Canceled` reports the caller's own
/// context and does not affect the subscription.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The client, or the server on its behalf, unsubscribed it.
    #[error("subscription removed by unsubscribe")]
    Unsubscribed,

    /// The server is shutting down, or the subscriber was evicted for
    /// falling behind.
    #[error("subscription terminated by the server")]
    Terminated,

    /// Enqueue would exceed the subscription's hard capacity limit.
    #[error("subscription queue is out of capacity")]
    OutOfCapacity,

    /// The context passed to `next` was canceled.
    #[error("context canceled")]
    Canceled,
}

impl SubscriptionError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriptionError::Unsubscribed => "unsubscribed",
            SubscriptionError::Terminated => "terminated",
            SubscriptionError::OutOfCapacity => "out_of_capacity",
            SubscriptionError::Canceled => "canceled",
        }
    }

    /// Whether this error, once latched, ends the subscription.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionError::Unsubscribed | SubscriptionError::Terminated
        )
    }
}
