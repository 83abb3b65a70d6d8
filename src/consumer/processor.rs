//! Message processor trait and the login statistics processor

use crate::aggregation::{Aggregator, StatisticsSnapshot};
use crate::consumer::metrics::ConsumerMetrics;
use crate::error::StatsError;
use crate::event::{LoginEvent, RawEvent};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns one inbound payload into the statistics record to publish
#[async_trait]
pub trait MessageProcessor: Send + Sync + 'static {
    /// Error type for processing
    type Error: std::error::Error + Send + Sync + Debug;

    /// Process a single payload
    async fn process(&self, payload: &[u8]) -> Result<StatisticsSnapshot, Self::Error>;

    /// Called when a payload produced a statistics record
    async fn on_success(&self, _snapshot: &StatisticsSnapshot) {}

    /// Called when processing fails; the payload is then discarded
    async fn on_failure(&self, error: &Self::Error, payload: &[u8]);

    /// Get processor name for logs
    fn name(&self) -> &str {
        "MessageProcessor"
    }
}

/// Decode, validate, ingest and snapshot one login record
pub struct LoginProcessor {
    aggregator: Arc<Aggregator>,
    metrics: ConsumerMetrics,
}

impl LoginProcessor {
    /// Create a processor feeding `aggregator`
    pub fn new(aggregator: Arc<Aggregator>, metrics: ConsumerMetrics) -> Self {
        Self { aggregator, metrics }
    }

    /// Synchronous core of [`MessageProcessor::process`]
    pub fn handle(&self, payload: &[u8]) -> Result<StatisticsSnapshot, StatsError> {
        let raw = RawEvent::from_slice(payload)?;
        debug!(message = ?raw.fields(), "Consumed message");

        let event = LoginEvent::from_raw(&raw)?;
        let snapshot = self.aggregator.ingest_and_snapshot(&event)?;
        debug!(stats = ?snapshot, "Stats");
        Ok(snapshot)
    }
}

#[async_trait]
impl MessageProcessor for LoginProcessor {
    type Error = StatsError;

    async fn process(&self, payload: &[u8]) -> Result<StatisticsSnapshot, Self::Error> {
        self.handle(payload)
    }

    async fn on_success(&self, _snapshot: &StatisticsSnapshot) {
        self.metrics.increment_processed();
    }

    async fn on_failure(&self, error: &Self::Error, payload: &[u8]) {
        self.metrics.record_rejection(error);
        warn!(
            kind = error.kind(),
            payload = %String::from_utf8_lossy(payload),
            "Discarding login event: {}",
            error
        );
    }

    fn name(&self) -> &str {
        "LoginProcessor"
    }
}
