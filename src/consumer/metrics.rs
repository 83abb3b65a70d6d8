//! Consumer metrics collection

use crate::error::StatsError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Consumer metrics collector. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct ConsumerMetrics {
    /// Total payloads received from the source
    pub messages_consumed: Arc<AtomicU64>,
    /// Events that updated the aggregator
    pub messages_processed: Arc<AtomicU64>,
    /// Events missing a required field
    pub rejected_invalid: Arc<AtomicU64>,
    /// Events whose timestamp could not be interpreted
    pub rejected_malformed: Arc<AtomicU64>,
    /// Payloads that were not a JSON object
    pub decode_failures: Arc<AtomicU64>,
    /// Statistics records delivered
    pub records_published: Arc<AtomicU64>,
    /// Statistics records that could not be delivered
    pub publish_failures: Arc<AtomicU64>,
    /// Transport restarts performed by the supervisor
    pub restarts: Arc<AtomicU64>,
    start_time: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSummary {
    /// Payloads received
    pub consumed: u64,
    /// Events ingested
    pub processed: u64,
    /// Events rejected for missing fields
    pub rejected_invalid: u64,
    /// Events rejected for malformed timestamps
    pub rejected_malformed: u64,
    /// Undecodable payloads
    pub decode_failures: u64,
    /// Records published
    pub published: u64,
    /// Records not published
    pub publish_failures: u64,
    /// Supervisor restarts
    pub restarts: u64,
}

impl ConsumerMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            messages_consumed: Arc::new(AtomicU64::new(0)),
            messages_processed: Arc::new(AtomicU64::new(0)),
            rejected_invalid: Arc::new(AtomicU64::new(0)),
            rejected_malformed: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            records_published: Arc::new(AtomicU64::new(0)),
            publish_failures: Arc::new(AtomicU64::new(0)),
            restarts: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a consumed payload
    pub fn increment_consumed(&self) {
        self.messages_consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ingested event
    pub fn increment_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected event under the counter for its error kind
    pub fn record_rejection(&self, error: &StatsError) {
        let counter = match error {
            StatsError::InvalidEvent { .. } => &self.rejected_invalid,
            StatsError::MalformedTimestamp { .. } => &self.rejected_malformed,
            StatsError::Decode(_) => &self.decode_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered statistics record
    pub fn increment_published(&self) {
        self.records_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a statistics record that was dropped
    pub fn increment_publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a supervisor restart
    pub fn increment_restarts(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get messages per second since creation
    pub fn messages_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.messages_consumed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Share of consumed payloads that were ingested
    pub fn success_rate(&self) -> f64 {
        let total = self.messages_consumed.load(Ordering::Relaxed);
        let processed = self.messages_processed.load(Ordering::Relaxed);

        if total > 0 {
            processed as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Copy all counters
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            consumed: self.messages_consumed.load(Ordering::Relaxed),
            processed: self.messages_processed.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            rejected_malformed: self.rejected_malformed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            published: self.records_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }

    /// Emit the counters as one structured log line
    pub fn log_summary(&self) {
        let s = self.summary();
        info!(
            consumed = s.consumed,
            processed = s.processed,
            rejected_invalid = s.rejected_invalid,
            rejected_malformed = s.rejected_malformed,
            decode_failures = s.decode_failures,
            published = s.published,
            publish_failures = s.publish_failures,
            restarts = s.restarts,
            "Consumer stats - Messages/sec: {:.2}, Success rate: {:.2}%",
            self.messages_per_second(),
            self.success_rate() * 100.0
        );
    }
}

impl Default for ConsumerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
