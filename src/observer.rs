//! # Pre-delivery observer hook.
//!
//! Provides [`Observe`] — the extension point for a collaborator that must
//! see every published message *before* any subscriber does, e.g. an
//! indexer persisting events ahead of reactions to them.
//!
//! ## Rules
//! - At most one observer per server; re-registration is an error.
//! - The sender awaits the callback inline, so the observer runs strictly
//!   before fan-out for that message (happens-before).
//! - An observer error **vetoes** the message: it is logged and delivered
//!   to no subscriber, and the server keeps running.
//!
//! ## Example
//! ```rust,ignore
//! use querybus::{Message, Observe};
//! use async_trait::async_trait;
//!
//! struct Indexer;
//!
//! #[async_trait]
//! impl Observe<BlockEvent> for Indexer {
//!     async fn observe(&self, msg: &Message<BlockEvent>) -> anyhow::Result<()> {
//!         persist(msg.events()).await // subscribers only see the message if this succeeds
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Message;

/// Synchronous pre-delivery callback with veto power.
///
/// Registered via [`Server::observe`](crate::Server::observe), optionally
/// restricted to messages matching any of a list of queries.
#[async_trait]
pub trait Observe<M>: Send + Sync + 'static {
    /// Inspects one message before it is fanned out.
    ///
    /// Returning an error suppresses delivery of this message to every
    /// subscriber. Keep the work short: the sender loop, and with it all
    /// delivery, waits on this call.
    async fn observe(&self, msg: &Message<M>) -> anyhow::Result<()>;

    /// Name used in veto log lines.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
