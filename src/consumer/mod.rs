//! Transport layer for the login statistics service
//!
//! This module provides everything around the aggregation core:
//! - Transport seams ([`EventSource`], [`StatsSink`], [`Transport`])
//! - Stdin/stdout and in-process channel transports
//! - A Redpanda/Kafka transport (feature `kafka`)
//! - A per-event failure boundary ([`Pipeline`])
//! - A restart loop with backoff ([`Supervisor`])
//! - Metrics and graceful shutdown
//!
//! # Example
//!
//! ```no_run
//! use login_stats::consumer::{
//!     ConsumerMetrics, LoginProcessor, Pipeline, RetryPolicy, ShutdownState, StdioTransport,
//!     Supervisor,
//! };
//! use login_stats::Aggregator;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let metrics = ConsumerMetrics::new();
//! let aggregator = Arc::new(Aggregator::default());
//! let processor = Arc::new(LoginProcessor::new(aggregator, metrics.clone()));
//! let pipeline = Pipeline::new(processor, metrics, Arc::new(ShutdownState::new()));
//!
//! Supervisor::new(pipeline, StdioTransport, RetryPolicy::restart())
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod retry;
pub mod shutdown;
pub mod supervisor;
pub mod transport;

pub use config::{ConsumerConfig, ConsumerConfigBuilder};
pub use error::{ConsumerError, ConsumerResult, ErrorSeverity};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaSink, KafkaSource, KafkaTransport};
pub use metrics::{ConsumerMetrics, MetricsSummary};
pub use pipeline::{Pipeline, RunOutcome};
pub use processor::{LoginProcessor, MessageProcessor};
pub use retry::RetryPolicy;
pub use shutdown::ShutdownState;
pub use supervisor::{spawn_metrics_reporter, Supervisor};
pub use transport::{
    ChannelSink, ChannelSource, EventSource, LinesSource, StatsSink, StdioTransport, Transport,
    WriterSink,
};

use crate::aggregation::{Aggregator, AggregatorConfig};
use std::sync::Arc;
use tracing::info;

/// Wire an aggregator, processor and pipeline from `config`
pub fn build_pipeline(config: &ConsumerConfig) -> (Arc<Aggregator>, Pipeline<LoginProcessor>) {
    info!(time_zone = %config.time_zone, "Creating login statistics pipeline");
    let metrics = ConsumerMetrics::new();
    let aggregator = Arc::new(Aggregator::new(
        AggregatorConfig::default().with_time_zone(config.time_zone),
    ));
    let processor = Arc::new(LoginProcessor::new(aggregator.clone(), metrics.clone()));
    let pipeline = Pipeline::new(processor, metrics, Arc::new(ShutdownState::new()))
        .with_publish_retry(config.publish_retry.clone());
    (aggregator, pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::HourZone;

    #[test]
    fn test_build_pipeline_uses_config_zone() {
        let config = ConsumerConfig::builder().time_zone(HourZone::Local).build();
        let (aggregator, pipeline) = build_pipeline(&config);
        assert_eq!(aggregator.time_zone(), HourZone::Local);
        assert!(!pipeline.shutdown_state().is_shutting_down());
    }
}
