//! Consumer configuration structures

use crate::aggregation::HourZone;
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::consumer::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Extra librdkafka properties that may be passed through
pub const ALLOWED_KAFKA_PROPS: &[&str] = &[
    // Compression settings
    "compression.type",
    "compression.level",
    // Fetch settings
    "fetch.min.bytes",
    "fetch.max.wait.ms",
    "fetch.max.bytes",
    "max.partition.fetch.bytes",
    // Request settings
    "request.timeout.ms",
    "metadata.max.age.ms",
    // Connection settings
    "reconnect.backoff.ms",
    "reconnect.backoff.max.ms",
    "socket.keepalive.enable",
    // Security
    "security.protocol",
    "sasl.mechanisms",
    "sasl.username",
    "sasl.password",
    // Monitoring
    "statistics.interval.ms",
    "client.id",
];

/// Login-stats consumer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topic carrying login events
    pub input_topic: String,

    /// Topic receiving statistics records
    pub stats_topic: String,

    /// Offset reset policy (earliest, latest, none)
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    pub session_timeout_ms: u32,

    /// Time to wait for the broker to acknowledge a statistics record
    pub message_timeout: Duration,

    /// Zone used to bucket login hours; `local` for the host zone
    pub time_zone: HourZone,

    /// Retries for a single statistics record before it is dropped
    pub publish_retry: RetryPolicy,

    /// Backoff between transport restarts
    pub restart_policy: RetryPolicy,

    /// Interval between metrics log lines
    pub metrics_interval: Duration,

    /// How long shutdown waits for an in-flight event
    pub shutdown_timeout: Duration,

    /// Additional Kafka properties, restricted to [`ALLOWED_KAFKA_PROPS`]
    pub kafka_properties: HashMap<String, String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "kafka:9092".to_string(),
            group_id: "login-stats".to_string(),
            input_topic: "user-login".to_string(),
            stats_topic: "user-device-stats".to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: 30000,
            message_timeout: Duration::from_secs(30),
            time_zone: HourZone::default(),
            publish_retry: RetryPolicy::default(),
            restart_policy: RetryPolicy::restart(),
            metrics_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(10),
            kafka_properties: HashMap::new(),
        }
    }
}

/// Builder for ConsumerConfig
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl ConsumerConfigBuilder {
    /// Create a new consumer config builder
    pub fn new() -> Self {
        Self {
            config: ConsumerConfig::default(),
        }
    }

    /// Set the broker addresses
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.config.brokers = brokers.into();
        self
    }

    /// Set the consumer group ID
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.config.group_id = group_id.into();
        self
    }

    /// Set the login event topic
    pub fn input_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.input_topic = topic.into();
        self
    }

    /// Set the statistics topic
    pub fn stats_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.stats_topic = topic.into();
        self
    }

    /// Set the offset reset policy
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.config.auto_offset_reset = policy.into();
        self
    }

    /// Set the hour bucketing zone
    pub fn time_zone(mut self, zone: HourZone) -> Self {
        self.config.time_zone = zone;
        self
    }

    /// Set the publish retry policy
    pub fn publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.publish_retry = policy;
        self
    }

    /// Set the restart policy
    pub fn restart_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.restart_policy = policy;
        self
    }

    /// Set the metrics reporting interval
    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.config.metrics_interval = interval;
        self
    }

    /// Add a custom Kafka property
    pub fn kafka_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.kafka_properties.insert(key.into(), value.into());
        self
    }

    /// Build the consumer configuration
    pub fn build(self) -> ConsumerConfig {
        self.config
    }
}

impl Default for ConsumerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerConfig {
    /// Create a new consumer config builder
    pub fn builder() -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::new()
    }

    /// Load a YAML configuration file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConsumerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|e| {
            ConsumerError::ConfigError(format!("{}: {}", path.display(), e))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.brokers.trim().is_empty() {
            return Err("Brokers cannot be empty".to_string());
        }

        if self.group_id.trim().is_empty() {
            return Err("Group ID cannot be empty".to_string());
        }

        if self.input_topic.trim().is_empty() || self.stats_topic.trim().is_empty() {
            return Err("Topics cannot be empty".to_string());
        }

        if self.input_topic == self.stats_topic {
            return Err("Statistics topic must differ from the input topic".to_string());
        }

        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest" | "none") {
            return Err(format!(
                "Invalid auto_offset_reset '{}', expected earliest, latest or none",
                self.auto_offset_reset
            ));
        }

        if self.metrics_interval.is_zero() {
            return Err("Metrics interval must be greater than 0".to_string());
        }

        if self.message_timeout.is_zero() {
            return Err("Message timeout must be greater than 0".to_string());
        }

        self.publish_retry
            .validate()
            .map_err(|e| format!("publish_retry: {}", e))?;
        if self.publish_retry.max_retries.is_none() {
            return Err("publish_retry must set max_retries".to_string());
        }
        self.restart_policy
            .validate()
            .map_err(|e| format!("restart_policy: {}", e))?;

        for key in self.kafka_properties.keys() {
            if !ALLOWED_KAFKA_PROPS.contains(&key.as_str()) {
                return Err(format!(
                    "Disallowed Kafka property '{}'. Allowed properties: {:?}",
                    key, ALLOWED_KAFKA_PROPS
                ));
            }
        }

        Ok(())
    }
}
