//! # Subscription index: the relations the sender and server query.
//!
//! Keeps every live subscription reachable three ways:
//! - `by_id` — eviction and id-narrowed unsubscribes
//! - `by_client` — per-client unsubscribe and counting
//! - `by_query` — duplicate detection for `(client, query)` uniqueness
//!
//! The index is **not** internally synchronized; the server's `subs`
//! readers-writer lock protects it (shared for fan-out and lookups,
//! exclusive for add/remove).

use std::collections::HashMap;
use std::sync::Arc;

use crate::query::Query;
use crate::subscription::{Subscription, SubscriptionId};

/// One registration: owning client, compiled query, shared subscription.
pub(crate) struct SubInfo<M> {
    pub(crate) client_id: String,
    pub(crate) query: Query,
    pub(crate) sub: Arc<Subscription<M>>,
}

impl<M> SubInfo<M> {
    pub(crate) fn id(&self) -> SubscriptionId {
        self.sub.id()
    }
}

/// A set of registrations keyed by subscription id.
pub(crate) type SubInfoSet<M> = HashMap<SubscriptionId, Arc<SubInfo<M>>>;

/// The three relations plus the iteration view.
pub(crate) struct SubIndex<M> {
    by_id: HashMap<SubscriptionId, Arc<SubInfo<M>>>,
    by_client: HashMap<String, SubInfoSet<M>>,
    by_query: HashMap<String, SubInfoSet<M>>,
}

impl<M> SubIndex<M> {
    pub(crate) fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_client: HashMap::new(),
            by_query: HashMap::new(),
        }
    }

    /// Inserts into every relation.
    ///
    /// Precondition: `contains(info.client_id, &info.query.to_string())`
    /// is false; the server checks under its exclusive lock before calling.
    pub(crate) fn add(&mut self, info: Arc<SubInfo<M>>) {
        let id = info.id();
        let query_key = info.query.to_string();

        self.by_id.insert(id, Arc::clone(&info));
        self.by_client
            .entry(info.client_id.clone())
            .or_default()
            .insert(id, Arc::clone(&info));
        self.by_query.entry(query_key).or_default().insert(id, info);
    }

    /// True if a live subscription exists for this client and query string.
    pub(crate) fn contains(&self, client_id: &str, query_str: &str) -> bool {
        self.by_client
            .get(client_id)
            .is_some_and(|set| set.values().any(|si| si.query.to_string() == query_str))
    }

    /// All registrations of one client (empty set if none).
    pub(crate) fn find_client(&self, client_id: &str) -> SubInfoSet<M> {
        self.by_client.get(client_id).cloned().unwrap_or_default()
    }

    /// All registrations under one query string (empty set if none).
    pub(crate) fn find_query(&self, query_str: &str) -> SubInfoSet<M> {
        self.by_query.get(query_str).cloned().unwrap_or_default()
    }

    /// Looks up a single registration by subscription id.
    pub(crate) fn find_id(&self, id: SubscriptionId) -> Option<Arc<SubInfo<M>>> {
        self.by_id.get(&id).cloned()
    }

    /// Removes each entry of `evict` from every relation.
    pub(crate) fn remove_all(&mut self, evict: &SubInfoSet<M>) {
        for (id, info) in evict {
            self.by_id.remove(id);

            if let Some(set) = self.by_client.get_mut(&info.client_id) {
                set.remove(id);
                if set.is_empty() {
                    self.by_client.remove(&info.client_id);
                }
            }

            let query_key = info.query.to_string();
            if let Some(set) = self.by_query.get_mut(&query_key) {
                set.remove(id);
                if set.is_empty() {
                    self.by_query.remove(&query_key);
                }
            }
        }
    }

    /// The iteration view the sender fans out over.
    pub(crate) fn all(&self) -> impl Iterator<Item = &Arc<SubInfo<M>>> {
        self.by_id.values()
    }

    /// Number of distinct clients with live subscriptions.
    pub(crate) fn num_clients(&self) -> usize {
        self.by_client.len()
    }

    /// Number of live subscriptions for one client.
    pub(crate) fn num_client_subscriptions(&self, client_id: &str) -> usize {
        self.by_client.get(client_id).map_or(0, HashMap::len)
    }
}
