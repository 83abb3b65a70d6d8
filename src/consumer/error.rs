//! Transport-layer error types

use std::io;
use thiserror::Error;

/// Result type for consumer operations
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Consumer error types
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Kafka client errors
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    KafkaError(#[from] rdkafka::error::KafkaError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Statistics record could not be encoded
    #[error("Encode error: {0}")]
    EncodeError(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Channel errors
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl ConsumerError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "kafka")]
            ConsumerError::KafkaError(e) => {
                !matches!(e, rdkafka::error::KafkaError::ClientCreation(_))
            }
            ConsumerError::ConnectionError(_) => true,
            ConsumerError::IoError(_) => true,
            ConsumerError::ChannelError(_) => true,
            ConsumerError::EncodeError(_) => false,
            ConsumerError::ConfigError(_) => false,
        }
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ConsumerError::ConfigError(_) => ErrorSeverity::Fatal,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that end the current run; the supervisor restarts it
    Error,
    /// Fatal errors that stop the supervisor
    Fatal,
}
