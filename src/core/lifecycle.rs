//! # Server lifecycle: one-way phase transitions and exit signaling.
//!
//! Phases move `New → Running → Stopped` (or `New → Stopped` when a server
//! is stopped without ever starting). Transitions are compare-and-swap on
//! an atomic, so concurrent `start`/`stop` callers race safely and every
//! loser observes a consistent phase.
//!
//! Two cancellation tokens carry the signals:
//! - `stop` fires when shutdown is requested; the shutdown monitor and
//!   in-flight publishers watch it.
//! - `exited` fires once the sender has drained the queue and terminated
//!   the remaining subscriptions; `wait` blocks on it, any number of times.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;

use crate::error::ServerError;

const NEW: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Atomic phase ladder plus the stop/exited signals.
pub(crate) struct Lifecycle {
    phase: AtomicU8,
    stop: CancellationToken,
    exited: CancellationToken,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(NEW),
            stop: CancellationToken::new(),
            exited: CancellationToken::new(),
        }
    }

    /// True while the server accepts publishes and subscriptions.
    pub(crate) fn is_running(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == RUNNING
    }

    /// Attempts the `New → Running` transition.
    ///
    /// Fails with `AlreadyStarted` on a second start and `Stopped` once
    /// the server has been stopped (phases never move backwards).
    pub(crate) fn begin_start(&self) -> Result<(), ServerError> {
        match self
            .phase
            .compare_exchange(NEW, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Ok(()),
            Err(RUNNING) => Err(ServerError::AlreadyStarted),
            Err(_) => Err(ServerError::Stopped),
        }
    }

    /// Requests shutdown; idempotent.
    ///
    /// Moves the phase to `Stopped` immediately so gated operations start
    /// refusing, and fires the stop signal. A server that never ran has no
    /// sender to drain, so its exit signal fires here too.
    pub(crate) fn request_stop(&self) {
        let prev = self.phase.swap(STOPPED, Ordering::SeqCst);
        self.stop.cancel();
        if prev == NEW {
            self.exited.cancel();
        }
    }

    /// Fired when shutdown has been requested.
    pub(crate) fn stop_requested(&self) -> &CancellationToken {
        &self.stop
    }

    /// Marks the sender's exit; wakes every `wait` caller.
    pub(crate) fn mark_exited(&self) {
        self.exited.cancel();
    }

    /// Suspends until shutdown has fully completed.
    pub(crate) async fn wait(&self) {
        self.exited.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_valid_once() {
        let lc = Lifecycle::new();
        assert!(!lc.is_running());

        lc.begin_start().unwrap();
        assert!(lc.is_running());
        assert_eq!(lc.begin_start(), Err(ServerError::AlreadyStarted));
    }

    #[test]
    fn no_restart_after_stop() {
        let lc = Lifecycle::new();
        lc.begin_start().unwrap();
        lc.request_stop();

        assert!(!lc.is_running());
        assert_eq!(lc.begin_start(), Err(ServerError::Stopped));
    }

    #[tokio::test]
    async fn stop_before_start_releases_waiters() {
        let lc = Lifecycle::new();
        lc.request_stop();
        lc.request_stop(); // idempotent

        // Without a sender to drain, wait must return immediately.
        lc.wait().await;
        assert_eq!(lc.begin_start(), Err(ServerError::Stopped));
    }

    #[tokio::test]
    async fn wait_wakes_all_waiters_after_exit() {
        use std::sync::Arc;

        let lc = Arc::new(Lifecycle::new());
        lc.begin_start().unwrap();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let lc = Arc::clone(&lc);
                tokio::spawn(async move { lc.wait().await })
            })
            .collect();

        lc.request_stop();
        lc.mark_exited();

        for w in waiters {
            w.await.unwrap();
        }
    }
}
