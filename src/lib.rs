//! # querybus
//!
//! **querybus** is an in-process publish/subscribe dispatcher with
//! query-filtered delivery.
//!
//! A single logical publisher stream fans each message out to the
//! subscribers whose declared predicate matches the message's event
//! attributes. One sender task serializes deliveries, so every subscriber
//! observes the same message order; each subscription owns a bounded queue,
//! so a slow subscriber is evicted instead of stalling anyone else.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types                                  |
//! |-------------------|--------------------------------------------------------------------|--------------------------------------------|
//! | **Queries**       | Boolean predicates over event attributes, compiled from text.      | [`Query`], [`ParseError`]                  |
//! | **Subscriptions** | Bounded, cancellable FIFO queues with soft/hard capacity.          | [`Subscription`], [`SubscriptionId`]       |
//! | **Dispatch**      | Serialized publish path with per-subscriber fan-out and eviction.  | [`Server`], [`SubscribeArgs`]              |
//! | **Observation**   | A single pre-delivery hook that may veto a message.                | [`Observe`]                                |
//! | **Errors**        | Typed errors for server operations and subscription streams.       | [`ServerError`], [`SubscriptionError`]     |
//! | **Configuration** | Publish channel buffering.                                         | [`ServerConfig`]                           |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use querybus::{Event, Query, Server, ServerConfig, SubscribeArgs};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server: Arc<Server<String>> = Server::new(ServerConfig::default());
//!     server.start()?;
//!
//!     let query: Query = "account.name = 'John'".parse()?;
//!     let sub = server
//!         .subscribe_with_args(SubscribeArgs::new("johns-feed", query).with_limit(8))
//!         .await?;
//!
//!     let ctx = CancellationToken::new();
//!     server
//!         .publish_with_events(
//!             &ctx,
//!             "payload".to_string(),
//!             vec![Event::new("account").with_attribute("name", "John")],
//!         )
//!         .await?;
//!
//!     let msg = sub.next(&ctx).await?;
//!     assert_eq!(msg.data(), "payload");
//!
//!     server.stop();
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod observer;
mod query;
mod subscription;

// ---- Public re-exports ----

pub use config::ServerConfig;
pub use crate::core::{Server, SubscribeArgs, UnsubscribeArgs};
pub use error::{ServerError, SubscriptionError};
pub use events::{Event, EventAttribute, Message};
pub use observer::Observe;
pub use query::{ParseError, Query};
pub use subscription::{Subscription, SubscriptionId};
