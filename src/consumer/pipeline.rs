//! One run of the receive → validate → ingest → snapshot → publish loop

use crate::consumer::error::ConsumerResult;
use crate::consumer::metrics::ConsumerMetrics;
use crate::consumer::processor::MessageProcessor;
use crate::consumer::retry::RetryPolicy;
use crate::consumer::shutdown::ShutdownState;
use crate::consumer::transport::{EventSource, StatsSink};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a pipeline run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source has no more payloads
    Exhausted,
    /// Shutdown was requested
    Shutdown,
}

/// Drives events from a source through a processor into a sink.
///
/// Each event runs inside its own failure boundary: a rejected event or a
/// record that cannot be published is logged and the loop moves on. Only a
/// failing source ends the run with an error.
pub struct Pipeline<P: MessageProcessor> {
    processor: Arc<P>,
    metrics: ConsumerMetrics,
    shutdown: Arc<ShutdownState>,
    publish_retry: RetryPolicy,
}

impl<P: MessageProcessor> Pipeline<P> {
    /// Create a pipeline around `processor`
    pub fn new(processor: Arc<P>, metrics: ConsumerMetrics, shutdown: Arc<ShutdownState>) -> Self {
        Self {
            processor,
            metrics,
            shutdown,
            publish_retry: RetryPolicy::publish(),
        }
    }

    /// Set how often a statistics record is retried before it is dropped
    pub fn with_publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.publish_retry = policy;
        self
    }

    /// Metrics shared with this pipeline
    pub fn metrics(&self) -> &ConsumerMetrics {
        &self.metrics
    }

    /// Shutdown state observed between events
    pub fn shutdown_state(&self) -> &Arc<ShutdownState> {
        &self.shutdown
    }

    /// Consume `source` until it is exhausted, fails, or shutdown begins
    pub async fn run<S, K>(&self, source: &mut S, sink: &K) -> ConsumerResult<RunOutcome>
    where
        S: EventSource + ?Sized,
        K: StatsSink + ?Sized,
    {
        info!(processor = self.processor.name(), "Pipeline started");

        loop {
            if self.shutdown.is_shutting_down() {
                return Ok(RunOutcome::Shutdown);
            }

            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait_for_signal() => return Ok(RunOutcome::Shutdown),
                next = source.next_payload() => next,
            };

            match next {
                Some(Ok(payload)) => {
                    self.shutdown.add_inflight_message();
                    self.handle(&payload, sink).await;
                    self.shutdown.remove_inflight_message();
                }
                Some(Err(e)) => {
                    error!("Source failed: {}", e);
                    return Err(e);
                }
                None => {
                    info!("Source exhausted");
                    return Ok(RunOutcome::Exhausted);
                }
            }
        }
    }

    /// Process and publish one payload. Never fails.
    pub async fn handle<K: StatsSink + ?Sized>(&self, payload: &[u8], sink: &K) {
        self.metrics.increment_consumed();

        let snapshot = match self.processor.process(payload).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.processor.on_failure(&e, payload).await;
                return;
            }
        };
        self.processor.on_success(&snapshot).await;

        match self
            .publish_retry
            .retry(|| sink.publish(&snapshot), |e| e.is_retryable())
            .await
        {
            Ok(()) => {
                self.metrics.increment_published();
                debug!("Statistics published");
            }
            Err(e) => {
                self.metrics.increment_publish_failed();
                error!("Error sending statistics: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{Aggregator, StatisticsSnapshot};
    use crate::consumer::error::ConsumerError;
    use crate::consumer::processor::LoginProcessor;
    use crate::consumer::transport::{ChannelSink, ChannelSource};
    use crate::event::EventBuilder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn pipeline() -> Pipeline<LoginProcessor> {
        let metrics = ConsumerMetrics::new();
        let processor = LoginProcessor::new(Arc::new(Aggregator::default()), metrics.clone());
        Pipeline::new(Arc::new(processor), metrics, Arc::new(ShutdownState::new()))
    }

    fn login(user: &str) -> Vec<u8> {
        serde_json::to_vec(&EventBuilder::login(user, "web", "US", 1_700_000_000).build()).unwrap()
    }

    struct FlakySink {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl StatsSink for FlakySink {
        async fn publish(&self, _snapshot: &StatisticsSnapshot) -> ConsumerResult<()> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(ConsumerError::ConnectionError("broker unavailable".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_until_exhausted() {
        let pipeline = pipeline();
        let (tx, mut source) = ChannelSource::new(8);
        let (sink, mut published) = ChannelSink::new();

        tx.send(login("u1")).await.unwrap();
        tx.send(b"garbage".to_vec()).await.unwrap();
        tx.send(br#"{"user_id": "u2"}"#.to_vec()).await.unwrap();
        tx.send(login("u2")).await.unwrap();
        drop(tx);

        let outcome = pipeline.run(&mut source, &sink).await.unwrap();
        assert_eq!(outcome, RunOutcome::Exhausted);

        let first = published.recv().await.unwrap();
        let second = published.recv().await.unwrap();
        assert!(published.try_recv().is_err());
        assert_eq!(first.max_logins_per_user, 1);
        assert_eq!(second.average_logins_per_user, 1.0);
        assert_eq!(second.user_login_per_device_type["web"], 2);

        let summary = pipeline.metrics().summary();
        assert_eq!(summary.consumed, 4);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.published, 2);
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(summary.rejected_invalid, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_waiting_run() {
        let pipeline = pipeline();
        let (_tx, mut source) = ChannelSource::new(1);
        let (sink, _published) = ChannelSink::new();
        let shutdown = pipeline.shutdown_state().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.begin_shutdown();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), pipeline.run(&mut source, &sink))
            .await
            .expect("pipeline ignored shutdown")
            .unwrap();
        assert_eq!(outcome, RunOutcome::Shutdown);
    }

    #[tokio::test]
    async fn test_publish_is_retried_then_dropped() {
        let pipeline = pipeline().with_publish_retry(RetryPolicy {
            max_retries: Some(1),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            jitter: 0.0,
        });

        let sink = FlakySink { failures_left: AtomicU32::new(1) };
        pipeline.handle(&login("u1"), &sink).await;
        assert_eq!(pipeline.metrics().summary().published, 1);

        let sink = FlakySink { failures_left: AtomicU32::new(5) };
        pipeline.handle(&login("u1"), &sink).await;
        let summary = pipeline.metrics().summary();
        assert_eq!(summary.published, 1);
        assert_eq!(summary.publish_failures, 1);
        // The event still counted even though its record was dropped
        assert_eq!(summary.processed, 2);
    }
}
