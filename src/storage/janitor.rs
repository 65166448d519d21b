//! Background Janitor
//!
//! Reads already treat expired items as absent ("lazy expiry"), so the
//! janitor is not what makes expiry correct. Its job is to reclaim memory:
//! an item that expires and is never read again would otherwise stay in its
//! shard forever.
//!
//! ## Design
//!
//! The janitor runs as a Tokio task and:
//! 1. Waits for the next tick of a fixed interval
//! 2. Sweeps every shard in order, each under its own lock
//! 3. Logs how many items it purged
//!
//! A stop signal wakes it up immediately, even in the middle of an interval.
//!
//! ## Lifecycle
//!
//! ```text
//!   start() ──> running ──stop()/drop──> stopped
//! ```
//!
//! Stopped is terminal; a janitor is never restarted. Each sharded cache owns
//! at most one. Starting a second janitor by hand over the same router is not
//! prevented: both keep sweeping until each one is stopped or dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::{self, Handle};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::storage::Router;

/// Name of the OS thread used when no Tokio runtime is available.
const JANITOR_THREAD_NAME: &str = "flashcache-janitor";

/// A handle to the running janitor.
///
/// When this handle is dropped, the janitor task will be stopped.
#[derive(Debug)]
pub struct Janitor {
    /// Time between sweeps
    interval: Duration,

    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Set by the first call to `stop`
    stopped: AtomicBool,
}

impl Janitor {
    /// Starts a janitor sweeping `router` every `interval`.
    ///
    /// The task is spawned on the current Tokio runtime if there is one.
    /// Otherwise it gets its own thread driving a single-threaded runtime.
    ///
    /// # Example
    ///
    /// ```
    /// use flashcache::storage::{native_key_bytes, Janitor, Router, SeedSource};
    /// use std::num::NonZeroUsize;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let router: Arc<Router<String, u32>> = Arc::new(Router::new(
    ///     NonZeroUsize::new(4).unwrap(),
    ///     None,
    ///     (0, SeedSource::Fixed),
    ///     native_key_bytes::<String>,
    /// ));
    ///
    /// let janitor = Janitor::start(Arc::clone(&router), Duration::from_secs(1));
    /// assert!(janitor.is_running());
    ///
    /// janitor.stop();
    /// assert!(!janitor.is_running());
    /// ```
    pub fn start<K, V>(router: Arc<Router<K, V>>, interval: Duration) -> Self
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = janitor_loop(router, interval, shutdown_rx);

        match Handle::try_current() {
            Ok(handle) => {
                let join = handle.spawn(task);
                handle.spawn(async move {
                    if let Err(err) = join.await {
                        if err.is_panic() {
                            error!(
                                error = %err,
                                "Janitor task panicked; expired items will only be purged manually"
                            );
                        }
                    }
                });
            }
            Err(_) => {
                let spawned = thread::Builder::new()
                    .name(JANITOR_THREAD_NAME.to_string())
                    .spawn(move || {
                        match runtime::Builder::new_current_thread().enable_time().build() {
                            Ok(rt) => rt.block_on(task),
                            Err(err) => error!(
                                error = %err,
                                "Failed to build a runtime for the janitor; expired items will only be purged manually"
                            ),
                        }
                    });

                if let Err(err) = spawned {
                    error!(
                        error = %err,
                        "Failed to spawn the janitor thread; expired items will only be purged manually"
                    );
                }
            }
        }

        info!(
            interval_ms = interval.as_millis() as u64,
            "Background janitor started"
        );

        Self {
            interval,
            shutdown_tx,
            stopped: AtomicBool::new(false),
        }
    }

    /// Time between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true until the janitor is stopped or its task has exited.
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && !self.shutdown_tx.is_closed()
    }

    /// Stops the janitor.
    ///
    /// Only the first call has an effect; later calls return immediately.
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // The task may already be gone; nothing to signal then
        let _ = self.shutdown_tx.send(true);
        info!("Background janitor stopped");
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main janitor loop.
async fn janitor_loop<K, V>(
    router: Arc<Router<K, V>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let Some(start) = time::Instant::now().checked_add(interval) else {
        warn!(
            interval_secs = interval.as_secs(),
            "Janitor interval is too long to schedule; no sweep will run"
        );
        wait_for_shutdown(&mut shutdown_rx).await;
        return;
    };

    let mut ticker = time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Wait for the next tick or the shutdown signal
        tokio::select! {
            biased;

            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Janitor received shutdown signal");
                    return;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let purged = router.delete_expired();

        if purged > 0 {
            debug!(
                purged = purged,
                items_remaining = router.item_count(),
                "Expired items purged"
            );
        } else {
            trace!("Janitor sweep found no expired items");
        }
    }
}

/// Parks until the stop signal arrives or the handle is gone.
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
    debug!("Janitor received shutdown signal");
}
