//! # Sender task: serialized delivery and shutdown draining.
//!
//! One sender per server drains the publish channel in FIFO order and fans
//! each item out to matching subscriptions, which is what gives every
//! subscriber the same canonical message order.
//!
//! Per item:
//! 1. If an observer is registered and wants the message, await it. An
//!    observer error vetoes the message for everyone (logged, not fatal).
//! 2. Under the shared `subs` hold, publish to every subscription whose
//!    query matches. Hard capacity refusals collect into an eviction set.
//! 3. After releasing the shared hold, take the exclusive hold and evict,
//!    latching `Terminated` on each offender.
//!
//! ## Shutdown handshake
//! A separate monitor task waits for the stop signal, then takes the
//! publisher lock exclusively — no publisher can be mid-enqueue — and
//! drops the channel's sender half. `recv` returns the remaining buffered
//! items and then `None`; the sender terminates the surviving
//! subscriptions, clears the index to its stopped sentinel, and fires the
//! exit signal that `wait` blocks on.

use std::sync::Arc;

use crate::core::server::{remove_subs, QueueItem, Server};
use crate::error::SubscriptionError;
use crate::events::Message;
use crate::subscription::SubInfoSet;

/// Waits for the stop signal, then closes the publish channel.
pub(crate) async fn shutdown_monitor<M: Clone + Send + 'static>(server: Arc<Server<M>>) {
    server.lifecycle.stop_requested().cancelled().await;

    // Exclusive hold: in-flight publishers finish their enqueue first,
    // later ones find the sentinel.
    let mut queue = server.queue.write().await;
    *queue = None;
}

/// Drains the publish channel until it closes, then tears down.
pub(crate) async fn run<M: Clone + Send + 'static>(server: Arc<Server<M>>) {
    let intake = server.intake.write().await.take();
    let Some(mut intake) = intake else {
        // start() transitions the phase exactly once, so the receiver can
        // only be gone if run was invoked out of band.
        log::error!("sender started without a publish channel");
        return;
    };

    while let Some(item) = intake.recv().await {
        deliver(&server, item).await;
    }

    // Channel closed and drained: terminate survivors before exit.
    let mut subs = server.subs.write().await;
    if let Some(index) = subs.index.take() {
        for info in index.all() {
            info.sub.stop(SubscriptionError::Terminated);
        }
    }
    subs.observer = None;
    drop(subs);

    server.lifecycle.mark_exited();
}

/// Fans one item out to the observer and all matching subscriptions.
async fn deliver<M: Clone + Send + 'static>(server: &Arc<Server<M>>, item: QueueItem<M>) {
    let msg = Message::new(item.data, item.events);

    // Evictions are applied after the shared hold is released; taking the
    // exclusive lock while still holding the shared one would deadlock.
    let mut evict = SubInfoSet::new();
    {
        let subs = server.subs.read().await;
        let Some(index) = subs.index.as_ref() else {
            return;
        };

        if let Some(entry) = &subs.observer {
            if entry.wants(msg.events()) {
                if let Err(err) = entry.observer.observe(&msg).await {
                    log::warn!(
                        "observer {} vetoed message: {err:#}",
                        entry.observer.name()
                    );
                    return;
                }
            }
        }

        for info in index.all() {
            if !info.query.matches(msg.events()) {
                continue;
            }
            if let Err(err) = info.sub.publish(msg.for_subscription(info.id())) {
                log::warn!(
                    "evicting subscription {} of client {:?}: {}",
                    info.id(),
                    info.client_id,
                    err.as_label(),
                );
                evict.insert(info.id(), Arc::clone(info));
            }
        }
    }

    if !evict.is_empty() {
        let mut subs = server.subs.write().await;
        if let Some(index) = subs.index.as_mut() {
            remove_subs(index, &evict, SubscriptionError::Terminated);
        }
    }
}
