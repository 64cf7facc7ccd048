//! Dispatcher core: the server, its sender task, and lifecycle.
//!
//! The public API re-exported from here is [`Server`] and its argument
//! types. Everything else is an internal building block the server wires
//! together.
//!
//! ## Files & responsibilities
//! - **server.rs**: public facade; owns the publish channel, the
//!   subscription index and observer under the `subs` lock, validates and
//!   applies subscribe/unsubscribe/observe, gates everything on the phase.
//! - **sender.rs**: the single sender task (drain → observer → fan-out →
//!   evict) and the shutdown monitor that closes the publish channel once
//!   no publisher is mid-enqueue.
//! - **lifecycle.rs**: one-way `New → Running → Stopped` phase ladder and
//!   the stop/exited signals behind `stop`/`wait`.
//!
//! ## Wiring (module-level flow)
//! ```text
//! publishers                  Server                       subscribers
//!     │  publish_with_events    │                                │
//!     ├──── shared `queue` ────►│ mpsc (bounded)                 │
//!     │         hold            │    │                           │
//!                               ▼    ▼                           │
//!                        sender::run (one task)                  │
//!                          │ 1. observer (veto point)            │
//!                          │ 2. shared `subs` hold:              │
//!                          │      query.matches → sub.publish ──►│ next()
//!                          │ 3. exclusive `subs` hold:           │
//!                          │      evict over-capacity subs       │
//!                          ▼
//!                    on channel close:
//!                      terminate survivors, index → None,
//!                      mark exited (wakes every wait())
//!
//! stop() ──► lifecycle.request_stop ──► shutdown_monitor:
//!              exclusive `queue` hold, drop Sender (channel closes)
//! ```
//!
//! ## Notes
//! - Delivery order is canonical: whatever order the sender dequeues is
//!   the order every matching subscriber observes (P2/P3).
//! - The publisher lock is never taken while the subscriptions lock is
//!   held; the sender upgrades `subs` only after releasing its shared hold.

mod lifecycle;
mod sender;
mod server;

pub use server::{Server, SubscribeArgs, UnsubscribeArgs};
