//! # Server configuration.
//!
//! [`ServerConfig`] defines the dispatcher's tunables. There is exactly
//! one today: the capacity of the publish channel between publishers and
//! the sender task.
//!
//! # Example
//! ```
//! use querybus::ServerConfig;
//!
//! let mut cfg = ServerConfig::default();
//! cfg.buffer_capacity = 16;
//!
//! assert_eq!(cfg.buffer_capacity, 16);
//! ```

/// Configuration for a [`Server`](crate::Server).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Capacity of the publish channel: how many messages publishers can
    /// enqueue ahead of the sender before they suspend.
    ///
    /// `0` (the default) requests synchronous publishing and is normalized
    /// to a channel of capacity 1, the minimum a bounded channel supports;
    /// a publisher can then run at most one message ahead of delivery.
    pub buffer_capacity: usize,
}

impl Default for ServerConfig {
    /// Provides a default configuration:
    /// - `buffer_capacity = 0` (synchronous publishing)
    fn default() -> Self {
        Self { buffer_capacity: 0 }
    }
}
