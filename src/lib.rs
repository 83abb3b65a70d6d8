//! Streaming user-login statistics
//!
//! This library consumes user-login events, keeps running counters per user,
//! device type, location and hour of day, and derives a statistics record after
//! every accepted event. The aggregation core ([`validate`], [`Aggregator`]) has
//! no knowledge of transports; the [`consumer`] module drives it from stdin or
//! Redpanda/Kafka.
//!
//! # Example
//!
//! ```
//! use login_stats::{validate, Aggregator, LoginEvent, RawEvent};
//!
//! # fn example() -> login_stats::Result<()> {
//! let aggregator = Aggregator::default();
//! let raw = RawEvent::from_slice(br#"{
//!     "user_id": "u1", "device_type": "android", "device_id": "d1",
//!     "locale": "RU", "timestamp": 1700000000
//! }"#)?;
//!
//! if validate::is_valid(&raw) {
//!     aggregator.ingest(&LoginEvent::from_raw(&raw)?)?;
//! }
//!
//! let stats = aggregator.snapshot();
//! assert_eq!(stats.max_logins_per_user, 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Redpanda Integration
//!
//! ```ignore
//! use login_stats::consumer::{build_pipeline, ConsumerConfig, KafkaTransport, Supervisor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ConsumerConfig::builder()
//!     .brokers("localhost:9092")
//!     .input_topic("user-login")
//!     .stats_topic("user-device-stats")
//!     .build();
//!
//! let (_aggregator, pipeline) = build_pipeline(&config);
//! let transport = KafkaTransport::new(config.clone())?;
//! Supervisor::new(pipeline, transport, config.restart_policy).run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

// Re-export commonly used items
pub use aggregation::{Aggregator, AggregatorConfig, AggregatorState, HourZone, StatisticsSnapshot};
pub use error::{Result, StatsError};
pub use event::{LoginEvent, RawEvent};
pub use validate::{is_valid, REQUIRED_FIELDS};

/// Login counters and statistics derivation
pub mod aggregation;

/// Error types
pub mod error;

/// Inbound login records
pub mod event;

/// Required-field validation gate
pub mod validate;

/// Transports, pipeline and supervision
pub mod consumer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`. With
/// `json` set, log lines are emitted as JSON objects.
pub fn init_tracing(default_filter: &str, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays free for statistics records
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
