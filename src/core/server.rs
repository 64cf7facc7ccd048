//! # Server: the public face of the dispatcher.
//!
//! [`Server`] accepts publishes, manages the subscription index and the
//! observer, and drives shutdown. The heavy lifting of delivery lives in
//! the sender task (`core/sender.rs`); everything here is bookkeeping
//! under two readers-writer locks:
//!
//! - `queue` — the publisher lock. Shared hold: an active publisher
//!   enqueueing. Exclusive hold: the shutdown monitor closing the channel
//!   by dropping the sender half, which is what guarantees no publisher is
//!   mid-enqueue at close.
//! - `subs` — the subscriptions lock. Shared hold: fan-out iteration and
//!   count queries. Exclusive hold: subscribe, unsubscribe, observer
//!   registration, eviction, final teardown.
//!
//! ## Lock ordering
//! The publisher lock is never taken while the subscriptions lock is held,
//! and the sender upgrades `subs` from shared to exclusive only *after*
//! releasing the shared hold (eviction happens after the fan-out loop).
//!
//! ## Rules
//! - `subscribe`/`publish`/`observe`/`unsubscribe` outside the `Running`
//!   phase return [`ServerError::Stopped`].
//! - `(client_id, query_string)` identifies at most one live subscription.
//! - `stop` is idempotent; `wait` may be called by any number of tasks.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::{lifecycle::Lifecycle, sender};
use crate::error::{ServerError, SubscriptionError};
use crate::events::Event;
use crate::observer::Observe;
use crate::query::Query;
use crate::subscription::{SubIndex, SubInfo, SubInfoSet, Subscription, SubscriptionId};

/// Parameters for [`Server::subscribe_with_args`].
#[derive(Clone, Debug)]
pub struct SubscribeArgs {
    /// Client id chosen by the caller; pairs with the query string for
    /// uniqueness.
    pub client_id: String,
    /// Filter query for events.
    pub query: Query,
    /// Hard queue capacity; `0` means 1.
    pub limit: usize,
    /// Soft queue quota; `0` uses `limit`.
    pub quota: usize,
}

impl SubscribeArgs {
    /// Creates args with default capacities (`limit = 1`).
    pub fn new(client_id: impl Into<String>, query: Query) -> Self {
        Self {
            client_id: client_id.into(),
            query,
            limit: 0,
            quota: 0,
        }
    }

    /// Sets the hard queue capacity.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the soft queue quota.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }
}

/// Parameters for [`Server::unsubscribe`].
///
/// The subscriber is required, plus at least one of the subscription id
/// or the registered query.
#[derive(Clone, Debug, Default)]
pub struct UnsubscribeArgs {
    /// Client id the subscriptions were registered under (required).
    pub subscriber: String,
    /// Server-assigned subscription id.
    pub id: Option<SubscriptionId>,
    /// The query registered with the subscription.
    pub query: Option<Query>,
}

impl UnsubscribeArgs {
    /// Checks the request identifies at least one removable subscription.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.subscriber.is_empty() {
            return Err(ServerError::MissingSubscriber);
        }
        if self.id.is_none() && self.query.is_none() {
            return Err(ServerError::UnderspecifiedUnsubscribe {
                subscriber: self.subscriber.clone(),
            });
        }
        Ok(())
    }
}

/// Item carried on the publish channel.
pub(crate) struct QueueItem<M> {
    pub(crate) data: M,
    pub(crate) events: Arc<[Event]>,
}

/// The registered observer and its optional query filter.
pub(crate) struct ObserverEntry<M> {
    pub(crate) observer: Arc<dyn Observe<M>>,
    queries: Vec<Query>,
}

impl<M> ObserverEntry<M> {
    /// Whether the observer wants this message: no queries means all of
    /// them, otherwise any-of.
    pub(crate) fn wants(&self, events: &[Event]) -> bool {
        self.queries.is_empty() || self.queries.iter().any(|q| q.matches(events))
    }
}

/// Index and observer under one lock; `index: None` is the stopped
/// sentinel the sender leaves behind.
pub(crate) struct SubsState<M> {
    pub(crate) index: Option<SubIndex<M>>,
    pub(crate) observer: Option<ObserverEntry<M>>,
}

/// Publish/subscribe dispatcher with query-filtered delivery.
///
/// - One sender task serializes all deliveries (canonical publish order)
/// - Per-subscription bounded queues isolate slow subscribers
/// - Slow subscribers are evicted instead of stalling anyone else
/// - An optional observer sees and may veto each message pre-delivery
pub struct Server<M> {
    cfg: ServerConfig,
    /// Publisher lock; `None` after the shutdown monitor closed the channel.
    pub(crate) queue: RwLock<Option<mpsc::Sender<QueueItem<M>>>>,
    /// Receiver side, claimed by the sender task at start.
    pub(crate) intake: RwLock<Option<mpsc::Receiver<QueueItem<M>>>>,
    /// Subscriptions lock: index + observer.
    pub(crate) subs: RwLock<SubsState<M>>,
    pub(crate) lifecycle: Lifecycle,
}

impl<M: Clone + Send + 'static> Server<M> {
    /// Creates a server with the given configuration (not yet started).
    pub fn new(cfg: ServerConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(cfg.buffer_capacity.max(1));

        Arc::new(Self {
            cfg,
            queue: RwLock::new(Some(tx)),
            intake: RwLock::new(Some(rx)),
            subs: RwLock::new(SubsState {
                index: Some(SubIndex::new()),
                observer: None,
            }),
            lifecycle: Lifecycle::new(),
        })
    }

    /// Creates a server with the default configuration (not yet started).
    pub fn default_config() -> Arc<Self> {
        Self::new(ServerConfig::default())
    }

    /// The configured publish channel capacity.
    pub fn buffer_capacity(&self) -> usize {
        self.cfg.buffer_capacity
    }

    /// Starts the sender and shutdown-monitor tasks.
    ///
    /// Valid once per instance: a second call reports `AlreadyStarted`,
    /// and a stopped server never restarts.
    pub fn start(self: &Arc<Self>) -> Result<(), ServerError> {
        self.lifecycle.begin_start()?;
        tokio::spawn(sender::shutdown_monitor(Arc::clone(self)));
        tokio::spawn(sender::run(Arc::clone(self)));
        Ok(())
    }

    /// Requests shutdown; idempotent and safe to call from any task.
    ///
    /// Publishers and subscribers start seeing [`ServerError::Stopped`]
    /// immediately; delivery of already-enqueued messages completes before
    /// remaining subscriptions are terminated. Use [`wait`](Self::wait) to
    /// block until that has happened.
    pub fn stop(&self) {
        self.lifecycle.request_stop();
    }

    /// Suspends until shutdown has completed.
    ///
    /// May be called by any number of tasks, before or after `stop`; all
    /// wake once the sender has drained the channel and terminated the
    /// remaining subscriptions.
    pub async fn wait(&self) {
        self.lifecycle.wait().await;
    }

    /// Creates a subscription for the client and query with a queue
    /// capacity of one. Shorthand for [`subscribe_with_args`](Self::subscribe_with_args).
    pub async fn subscribe(
        &self,
        client_id: impl Into<String>,
        query: Query,
    ) -> Result<Arc<Subscription<M>>, ServerError> {
        self.subscribe_with_args(SubscribeArgs::new(client_id, query))
            .await
    }

    /// Creates a subscription for the given arguments.
    ///
    /// Errors when the server is not running or a live subscription
    /// already exists for `(client_id, query_string)`. Capacities are
    /// normalized per [`SubscribeArgs`].
    pub async fn subscribe_with_args(
        &self,
        args: SubscribeArgs,
    ) -> Result<Arc<Subscription<M>>, ServerError> {
        let mut subs = self.subs.write().await;
        let index = match (self.lifecycle.is_running(), subs.index.as_mut()) {
            (true, Some(index)) => index,
            _ => return Err(ServerError::Stopped),
        };

        let query_key = args.query.to_string();
        if index.contains(&args.client_id, &query_key) {
            return Err(ServerError::AlreadySubscribed {
                client_id: args.client_id,
                query: query_key,
            });
        }

        let sub = Arc::new(Subscription::new(args.quota, args.limit));
        index.add(Arc::new(SubInfo {
            client_id: args.client_id,
            query: args.query,
            sub: Arc::clone(&sub),
        }));
        Ok(sub)
    }

    /// Registers the process-wide observer, optionally restricted to
    /// messages matching any of `queries` (empty observes everything).
    ///
    /// At most one observer may be registered per server.
    pub async fn observe(
        &self,
        observer: Arc<dyn Observe<M>>,
        queries: Vec<Query>,
    ) -> Result<(), ServerError> {
        let mut subs = self.subs.write().await;
        if !self.lifecycle.is_running() || subs.index.is_none() {
            return Err(ServerError::Stopped);
        }
        if subs.observer.is_some() {
            return Err(ServerError::ObserverAlreadyRegistered);
        }
        subs.observer = Some(ObserverEntry { observer, queries });
        Ok(())
    }

    /// Removes the subscriptions selected by `args`, terminating each with
    /// [`SubscriptionError::Unsubscribed`].
    ///
    /// Returns [`ServerError::SubscriptionNotFound`] when nothing matched.
    pub async fn unsubscribe(&self, args: UnsubscribeArgs) -> Result<(), ServerError> {
        args.validate()?;

        let mut subs = self.subs.write().await;
        let index = match (self.lifecycle.is_running(), subs.index.as_mut()) {
            (true, Some(index)) => index,
            _ => return Err(ServerError::Stopped),
        };

        let mut evict = index.find_client(&args.subscriber);
        if let Some(query) = &args.query {
            let with_query = index.find_query(&query.to_string());
            evict.retain(|id, _| with_query.contains_key(id));
        }
        if let Some(id) = args.id {
            evict = match index.find_id(id) {
                Some(info) if evict.contains_key(&id) => {
                    std::iter::once((id, info)).collect()
                }
                _ => SubInfoSet::new(),
            };
        }

        if evict.is_empty() {
            return Err(ServerError::SubscriptionNotFound);
        }
        remove_subs(index, &evict, SubscriptionError::Unsubscribed);
        Ok(())
    }

    /// Removes every subscription of `client_id`.
    ///
    /// Returns [`ServerError::SubscriptionNotFound`] if the client has none.
    pub async fn unsubscribe_all(&self, client_id: &str) -> Result<(), ServerError> {
        let mut subs = self.subs.write().await;
        let index = match (self.lifecycle.is_running(), subs.index.as_mut()) {
            (true, Some(index)) => index,
            _ => return Err(ServerError::Stopped),
        };

        let evict = index.find_client(client_id);
        if evict.is_empty() {
            return Err(ServerError::SubscriptionNotFound);
        }
        remove_subs(index, &evict, SubscriptionError::Unsubscribed);
        Ok(())
    }

    /// Number of distinct clients with live subscriptions.
    pub async fn num_clients(&self) -> usize {
        let subs = self.subs.read().await;
        subs.index.as_ref().map_or(0, SubIndex::num_clients)
    }

    /// Number of live subscriptions held by `client_id`.
    pub async fn num_client_subscriptions(&self, client_id: &str) -> usize {
        let subs = self.subs.read().await;
        subs.index
            .as_ref()
            .map_or(0, |index| index.num_client_subscriptions(client_id))
    }

    /// Publishes a message with no events. Only the match-all query and
    /// observers can see it.
    pub async fn publish(&self, ctx: &CancellationToken, data: M) -> Result<(), ServerError> {
        self.publish_with_events(ctx, data, Vec::new()).await
    }

    /// Publishes a message with the given events, enqueueing it for the
    /// sender in arrival order.
    ///
    /// Suspends while the publish channel is full. Returns
    /// [`ServerError::Stopped`] once shutdown has been requested and
    /// [`ServerError::Canceled`] when `ctx` fires before the enqueue.
    pub async fn publish_with_events(
        &self,
        ctx: &CancellationToken,
        data: M,
        events: Vec<Event>,
    ) -> Result<(), ServerError> {
        // Shared publisher hold for the whole enqueue; shutdown takes this
        // lock exclusively before closing the channel.
        let queue = self.queue.read().await;
        let tx = match (self.lifecycle.is_running(), queue.as_ref()) {
            (true, Some(tx)) => tx,
            _ => return Err(ServerError::Stopped),
        };

        let item = QueueItem {
            data,
            events: Arc::from(events),
        };
        tokio::select! {
            biased;
            _ = self.lifecycle.stop_requested().cancelled() => Err(ServerError::Stopped),
            _ = ctx.cancelled() => Err(ServerError::Canceled),
            sent = tx.send(item) => sent.map_err(|_| ServerError::Stopped),
        }
    }
}

/// Terminates and removes every subscription in `evict`. The caller holds
/// the exclusive `subs` lock.
pub(crate) fn remove_subs<M>(
    index: &mut SubIndex<M>,
    evict: &SubInfoSet<M>,
    reason: SubscriptionError,
) {
    for info in evict.values() {
        info.sub.stop(reason.clone());
    }
    index.remove_all(evict);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(source: &str) -> Query {
        Query::parse(source).unwrap()
    }

    #[tokio::test]
    async fn subscribe_requires_running_server() {
        let server: Arc<Server<u64>> = Server::default_config();
        let err = server.subscribe("alice", query("a EXISTS")).await;
        assert_eq!(err.unwrap_err(), ServerError::Stopped);

        server.start().unwrap();
        server.subscribe("alice", query("a EXISTS")).await.unwrap();

        server.stop();
        let err = server.subscribe("alice", query("b EXISTS")).await;
        assert_eq!(err.unwrap_err(), ServerError::Stopped);
    }

    #[tokio::test]
    async fn duplicate_client_query_pair_is_rejected() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        server.subscribe("alice", query("a EXISTS")).await.unwrap();
        let err = server
            .subscribe("alice", query("a EXISTS"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServerError::AlreadySubscribed {
                client_id: "alice".into(),
                query: "a EXISTS".into(),
            }
        );

        // Same query, different client: fine. Same client, different query: fine.
        server.subscribe("bob", query("a EXISTS")).await.unwrap();
        server.subscribe("alice", query("b EXISTS")).await.unwrap();

        server.stop();
        server.wait().await;
    }

    #[tokio::test]
    async fn start_is_valid_once() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();
        assert_eq!(server.start().unwrap_err(), ServerError::AlreadyStarted);

        server.stop();
        server.wait().await;
        assert_eq!(server.start().unwrap_err(), ServerError::Stopped);
    }

    #[tokio::test]
    async fn unsubscribe_validation() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        let err = server
            .unsubscribe(UnsubscribeArgs::default())
            .await
            .unwrap_err();
        assert_eq!(err, ServerError::MissingSubscriber);

        let err = server
            .unsubscribe(UnsubscribeArgs {
                subscriber: "alice".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServerError::UnderspecifiedUnsubscribe {
                subscriber: "alice".into(),
            }
        );

        server.stop();
        server.wait().await;
    }

    #[tokio::test]
    async fn unsubscribe_narrows_by_query_and_id() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        let a = server.subscribe("alice", query("a EXISTS")).await.unwrap();
        let _b = server.subscribe("alice", query("b EXISTS")).await.unwrap();

        // Wrong client.
        let err = server
            .unsubscribe(UnsubscribeArgs {
                subscriber: "bob".into(),
                query: Some(query("a EXISTS")),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServerError::SubscriptionNotFound);

        // By query: only the matching registration goes.
        server
            .unsubscribe(UnsubscribeArgs {
                subscriber: "alice".into(),
                query: Some(query("a EXISTS")),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(server.num_client_subscriptions("alice").await, 1);

        let ctx = CancellationToken::new();
        assert_eq!(
            a.next(&ctx).await.unwrap_err(),
            SubscriptionError::Unsubscribed
        );

        server.stop();
        server.wait().await;
    }

    #[tokio::test]
    async fn unsubscribe_by_id_only_removes_that_subscription() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        let a = server.subscribe("alice", query("a EXISTS")).await.unwrap();
        let _b = server.subscribe("alice", query("b EXISTS")).await.unwrap();

        server
            .unsubscribe(UnsubscribeArgs {
                subscriber: "alice".into(),
                id: Some(a.id()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(server.num_client_subscriptions("alice").await, 1);

        // The id is gone now.
        let err = server
            .unsubscribe(UnsubscribeArgs {
                subscriber: "alice".into(),
                id: Some(a.id()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServerError::SubscriptionNotFound);

        server.stop();
        server.wait().await;
    }

    #[tokio::test]
    async fn unsubscribe_all_and_counts() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        server.subscribe("alice", query("a EXISTS")).await.unwrap();
        server.subscribe("alice", query("b EXISTS")).await.unwrap();
        server.subscribe("bob", query("a EXISTS")).await.unwrap();

        assert_eq!(server.num_clients().await, 2);
        assert_eq!(server.num_client_subscriptions("alice").await, 2);

        server.unsubscribe_all("alice").await.unwrap();
        assert_eq!(server.num_clients().await, 1);
        assert_eq!(
            server.unsubscribe_all("alice").await.unwrap_err(),
            ServerError::SubscriptionNotFound
        );

        server.stop();
        server.wait().await;
    }

    #[tokio::test]
    async fn observer_registration_is_exclusive() {
        struct Nop;

        #[async_trait::async_trait]
        impl Observe<u64> for Nop {
            async fn observe(&self, _msg: &crate::events::Message<u64>) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        server.observe(Arc::new(Nop), Vec::new()).await.unwrap();
        assert_eq!(
            server.observe(Arc::new(Nop), Vec::new()).await.unwrap_err(),
            ServerError::ObserverAlreadyRegistered
        );

        server.stop();
        server.wait().await;
    }

    #[tokio::test]
    async fn publish_after_stop_is_refused() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();
        server.stop();
        server.wait().await;

        let ctx = CancellationToken::new();
        assert_eq!(
            server.publish(&ctx, 1).await.unwrap_err(),
            ServerError::Stopped
        );
    }

    #[tokio::test]
    async fn publish_respects_caller_cancellation() {
        let server: Arc<Server<u64>> = Server::default_config();
        server.start().unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();

        // A canceled context aborts the enqueue before it is attempted.
        assert_eq!(
            server.publish(&ctx, 1).await.unwrap_err(),
            ServerError::Canceled
        );

        server.stop();
        server.wait().await;
    }
}
