//! Graceful shutdown management for the consumer

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// Shared shutdown flag plus in-flight event tracking.
///
/// Pipelines stop between events once shutdown begins; an event already being
/// handled is finished and published first.
#[derive(Debug)]
pub struct ShutdownState {
    /// Whether shutdown has been initiated
    shutting_down: AtomicBool,
    /// Number of events between receive and publish
    inflight_messages: AtomicUsize,
    /// Shutdown initiated timestamp
    shutdown_start: Mutex<Option<Instant>>,
    /// Wakes tasks waiting in `select!`
    signal: watch::Sender<bool>,
}

impl ShutdownState {
    /// Create a new shutdown state
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            shutting_down: AtomicBool::new(false),
            inflight_messages: AtomicUsize::new(0),
            shutdown_start: Mutex::new(None),
            signal,
        }
    }

    /// Begin the shutdown process. Idempotent.
    pub fn begin_shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shutdown_start.lock() = Some(Instant::now());
        self.signal.send_replace(true);
        info!("Shutdown initiated");
    }

    /// Check if shutdown is in progress
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has begun
    pub async fn wait_for_signal(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail if it was dropped
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    fn complete_shutdown(&self) {
        if let Some(start) = *self.shutdown_start.lock() {
            info!("Shutdown completed in {:?}", start.elapsed());
        }
    }

    /// Add an in-flight event
    pub fn add_inflight_message(&self) {
        let count = self.inflight_messages.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("In-flight messages: {}", count);
    }

    /// Remove an in-flight event
    pub fn remove_inflight_message(&self) {
        let previous = self
            .inflight_messages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if let Ok(count) = previous {
            debug!("In-flight messages: {}", count - 1);
        }
    }

    /// Get the count of in-flight events
    pub fn inflight_count(&self) -> usize {
        self.inflight_messages.load(Ordering::SeqCst)
    }

    /// Wait for in-flight events to drain
    pub async fn wait_for_completion(&self, timeout: Duration) -> Result<(), String> {
        let deadline = Instant::now() + timeout;

        while self.inflight_count() > 0 {
            if Instant::now() > deadline {
                return Err(format!(
                    "Shutdown timeout with {} messages still in flight",
                    self.inflight_count()
                ));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        self.complete_shutdown();
        Ok(())
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
