//! # Subscriptions: bounded, cancellable, FIFO message queues.
//!
//! A [`Subscription`] is the client half of a registration with the
//! dispatcher. The sender task enqueues matching messages; the client
//! drains them with [`Subscription::next`].
//!
//! ## Capacity
//! Two thresholds bound the queue:
//! - `limit` (hard): an enqueue that would push occupancy above `limit`
//!   fails with [`SubscriptionError::OutOfCapacity`] and the sender evicts
//!   the subscription.
//! - `quota` (soft): once occupancy reaches `quota`, enqueues still
//!   succeed but each one logs a slow-subscriber warning. Crossing the
//!   quota never drops a message and never terminates the subscription.
//!
//! ## Termination
//! `stop` latches a terminal error exactly once; pending and future `next`
//! calls return it, messages still buffered at that moment are dropped.
//!
//! ## Rules
//! - Delivery order equals enqueue order (FIFO).
//! - `next` honors the caller's cancellation token without affecting the
//!   subscription's lifecycle.
//! - Multiple concurrent consumers are tolerated; FIFO is preserved but
//!   fairness between them is not promised.

mod index;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::OnceLock;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::SubscriptionError;
use crate::events::Message;

pub(crate) use index::{SubIndex, SubInfo, SubInfoSet};

/// Global allocator for subscription ids.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Server-assigned, process-wide unique subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bounded FIFO of messages matched by one client's query.
///
/// Obtained from [`Server::subscribe_with_args`](crate::Server::subscribe_with_args);
/// shared between the server (which publishes into it while it is indexed)
/// and the client (which drains it).
pub struct Subscription<M> {
    id: SubscriptionId,
    quota: usize,
    limit: usize,
    tx: mpsc::Sender<Message<M>>,
    rx: Mutex<mpsc::Receiver<Message<M>>>,
    stopped: CancellationToken,
    terminal: OnceLock<SubscriptionError>,
}

impl<M> Subscription<M> {
    /// Creates a subscription with normalized capacity bounds:
    /// `limit == 0` becomes 1, `quota == 0` (or a quota above the limit)
    /// becomes `limit`.
    pub(crate) fn new(quota: usize, limit: usize) -> Self {
        let limit = limit.max(1);
        let quota = if quota == 0 || quota > limit {
            limit
        } else {
            quota
        };
        let (tx, rx) = mpsc::channel(limit);

        Self {
            id: SubscriptionId::next(),
            quota,
            limit,
            tx,
            rx: Mutex::new(rx),
            stopped: CancellationToken::new(),
            terminal: OnceLock::new(),
        }
    }

    /// Stable, unique id of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receives the next message in FIFO order.
    ///
    /// Suspends until a message is available, the subscription is
    /// terminated, or `ctx` is canceled. Cancellation returns
    /// [`SubscriptionError::Canceled`] and leaves the subscription usable.
    /// After termination every call returns the latched terminal error,
    /// even if messages were still buffered when it happened.
    pub async fn next(&self, ctx: &CancellationToken) -> Result<Message<M>, SubscriptionError> {
        let mut rx = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(SubscriptionError::Canceled),
            guard = self.rx.lock() => guard,
        };
        tokio::select! {
            biased;
            _ = self.stopped.cancelled() => Err(self.terminal_error()),
            _ = ctx.cancelled() => Err(SubscriptionError::Canceled),
            msg = rx.recv() => msg.ok_or_else(|| self.terminal_error()),
        }
    }

    /// Non-blocking enqueue, called by the sender task.
    ///
    /// Fails with the terminal error after `stop`, or with
    /// [`SubscriptionError::OutOfCapacity`] when the queue is full (the
    /// caller evicts on that). At or above the soft quota the message is
    /// accepted and a warning is logged.
    pub(crate) fn publish(&self, msg: Message<M>) -> Result<(), SubscriptionError> {
        if self.stopped.is_cancelled() {
            return Err(self.terminal_error());
        }
        match self.tx.try_send(msg) {
            Ok(()) => {
                let occupancy = self.limit - self.tx.capacity();
                if occupancy >= self.quota {
                    log::warn!(
                        "subscription {} is slow: {occupancy}/{} buffered (quota {})",
                        self.id,
                        self.limit,
                        self.quota,
                    );
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(SubscriptionError::OutOfCapacity),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.terminal_error()),
        }
    }

    /// Latches the terminal error and wakes pending `next` calls.
    ///
    /// Idempotent; only the first caller's error sticks.
    pub(crate) fn stop(&self, err: SubscriptionError) {
        let _ = self.terminal.set(err);
        self.stopped.cancel();
    }

    fn terminal_error(&self) -> SubscriptionError {
        self.terminal
            .get()
            .cloned()
            .unwrap_or(SubscriptionError::Terminated)
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("quota", &self.quota)
            .field("limit", &self.limit)
            .field("stopped", &self.stopped.is_cancelled())
            .finish()
    }
}
