//! Supervised restart loop around pipeline runs

use crate::consumer::error::{ConsumerResult, ErrorSeverity};
use crate::consumer::pipeline::{Pipeline, RunOutcome};
use crate::consumer::processor::MessageProcessor;
use crate::consumer::retry::RetryPolicy;
use crate::consumer::transport::{StatsSink, Transport};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Keeps a pipeline running across transport failures.
///
/// A failed connect or a failed run is logged, followed by a backoff and a new
/// connection. Aggregator state lives in the processor, which outlives every
/// connection, so counts carry over restarts. The supervisor gives up on a
/// fatal error, or after the policy's `max_retries` consecutive runs that made
/// no progress when a limit is set.
pub struct Supervisor<P: MessageProcessor, T: Transport> {
    pipeline: Pipeline<P>,
    transport: T,
    policy: RetryPolicy,
}

impl<P: MessageProcessor, T: Transport> Supervisor<P, T> {
    /// Create a supervisor
    pub fn new(pipeline: Pipeline<P>, transport: T, policy: RetryPolicy) -> Self {
        Self {
            pipeline,
            transport,
            policy,
        }
    }

    /// The supervised pipeline
    pub fn pipeline(&self) -> &Pipeline<P> {
        &self.pipeline
    }

    /// Run until the source is exhausted, shutdown is requested, or restarts
    /// are exhausted
    pub async fn run(&self) -> ConsumerResult<RunOutcome> {
        let shutdown = self.pipeline.shutdown_state().clone();
        let metrics = self.pipeline.metrics().clone();
        let mut failures: u32 = 0;

        loop {
            if shutdown.is_shutting_down() {
                return Ok(RunOutcome::Shutdown);
            }

            let consumed_before = metrics.summary().consumed;
            let error = match self.run_once().await {
                Ok(outcome) => {
                    info!(transport = self.transport.name(), ?outcome, "Pipeline finished");
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            if error.severity() == ErrorSeverity::Fatal {
                error!(transport = self.transport.name(), "Fatal error, not restarting: {}", error);
                return Err(error);
            }

            if metrics.summary().consumed > consumed_before {
                failures = 0;
            }
            failures = failures.saturating_add(1);
            if !self.policy.should_retry(failures) {
                error!(
                    transport = self.transport.name(),
                    failures, "Giving up after repeated failures: {}", error
                );
                return Err(error);
            }

            let backoff = self.policy.backoff(failures);
            warn!(
                transport = self.transport.name(),
                attempt = failures,
                "Restarting in {:?} after error: {}",
                backoff,
                error
            );
            metrics.increment_restarts();

            tokio::select! {
                _ = shutdown.wait_for_signal() => return Ok(RunOutcome::Shutdown),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn run_once(&self) -> ConsumerResult<RunOutcome> {
        let (mut source, sink) = self.transport.connect().await?;
        info!(transport = self.transport.name(), "Transport connected");
        let outcome = self.pipeline.run(&mut source, &sink).await;
        if let Err(e) = sink.close().await {
            warn!(transport = self.transport.name(), "Failed to close sink: {}", e);
        }
        outcome
    }
}

/// Log metrics every `interval` until shutdown
pub fn spawn_metrics_reporter<P: MessageProcessor>(
    pipeline: &Pipeline<P>,
    interval: Duration,
) -> JoinHandle<()> {
    let metrics = pipeline.metrics().clone();
    let shutdown = pipeline.shutdown_state().clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => metrics.log_summary(),
                _ = shutdown.wait_for_signal() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{Aggregator, StatisticsSnapshot};
    use crate::consumer::error::ConsumerError;
    use crate::consumer::metrics::ConsumerMetrics;
    use crate::consumer::processor::LoginProcessor;
    use crate::consumer::shutdown::ShutdownState;
    use crate::consumer::transport::ChannelSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Refuses the first `refusals` connects, then hands out an empty source
    struct FlakyTransport {
        attempts: AtomicU32,
        refusals: u32,
        fatal: bool,
        closes: Arc<AtomicU32>,
    }

    impl FlakyTransport {
        fn refusing(refusals: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                refusals,
                fatal: false,
                closes: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    struct CountingSink {
        closes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl StatsSink for CountingSink {
        async fn publish(&self, _snapshot: &StatisticsSnapshot) -> ConsumerResult<()> {
            Ok(())
        }

        async fn close(&self) -> ConsumerResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        type Source = ChannelSource;
        type Sink = CountingSink;

        async fn connect(&self) -> ConsumerResult<(ChannelSource, CountingSink)> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fatal {
                return Err(ConsumerError::ConfigError("bad brokers".into()));
            }
            if attempt < self.refusals {
                return Err(ConsumerError::ConnectionError("connection refused".into()));
            }
            let (_tx, source) = ChannelSource::new(1);
            Ok((source, CountingSink { closes: self.closes.clone() }))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn pipeline() -> Pipeline<LoginProcessor> {
        let metrics = ConsumerMetrics::new();
        let processor = LoginProcessor::new(Arc::new(Aggregator::default()), metrics.clone());
        Pipeline::new(Arc::new(processor), metrics, Arc::new(ShutdownState::new()))
    }

    fn fixed(max_retries: Option<u32>, backoff: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: backoff,
            max_backoff: backoff,
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_policy() {
        let supervisor = Supervisor::new(
            pipeline(),
            FlakyTransport::refusing(u32::MAX),
            fixed(Some(2), Duration::from_millis(1)),
        );

        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(err, ConsumerError::ConnectionError(_)));
        assert_eq!(supervisor.transport.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(supervisor.pipeline().metrics().summary().restarts, 2);
    }

    #[tokio::test]
    async fn test_unbounded_policy_outlasts_long_outage() {
        let supervisor = Supervisor::new(
            pipeline(),
            FlakyTransport::refusing(1_500),
            fixed(None, Duration::ZERO),
        );

        let outcome = supervisor.run().await.unwrap();
        assert_eq!(outcome, RunOutcome::Exhausted);
        assert_eq!(supervisor.transport.attempts.load(Ordering::SeqCst), 1_501);
        assert_eq!(supervisor.pipeline().metrics().summary().restarts, 1_500);
    }

    #[tokio::test]
    async fn test_sink_closed_after_run() {
        let transport = FlakyTransport::refusing(0);
        let closes = transport.closes.clone();
        let supervisor = Supervisor::new(pipeline(), transport, RetryPolicy::restart());

        assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Exhausted);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let transport = FlakyTransport {
            fatal: true,
            ..FlakyTransport::refusing(0)
        };
        let supervisor = Supervisor::new(pipeline(), transport, RetryPolicy::restart());

        assert!(supervisor.run().await.is_err());
        assert_eq!(supervisor.transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_backoff() {
        let supervisor = Supervisor::new(
            pipeline(),
            FlakyTransport::refusing(u32::MAX),
            fixed(None, Duration::from_secs(3600)),
        );
        let shutdown = supervisor.pipeline().shutdown_state().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.begin_shutdown();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), supervisor.run())
            .await
            .expect("backoff not interrupted")
            .unwrap();
        assert_eq!(outcome, RunOutcome::Shutdown);
    }
}
