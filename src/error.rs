//! Error types for the aggregation core

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors raised while gating or ingesting a single login event.
///
/// Every variant is recoverable per event: the driving loop logs it and moves
/// on to the next record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    /// One or more required fields are absent from the record
    #[error("invalid event: missing required fields {missing:?}")]
    InvalidEvent {
        /// Names of the absent fields, in required-field order
        missing: Vec<&'static str>,
    },

    /// The timestamp is present but cannot be turned into a point in time
    #[error("malformed timestamp: {value}")]
    MalformedTimestamp {
        /// Compact JSON rendering of the offending value
        value: String,
    },

    /// The payload is not a JSON object
    #[error("decode error: {0}")]
    Decode(String),
}

impl StatsError {
    /// Short label used for metrics and structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            StatsError::InvalidEvent { .. } => "invalid_event",
            StatsError::MalformedTimestamp { .. } => "malformed_timestamp",
            StatsError::Decode(_) => "decode",
        }
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Decode(err.to_string())
    }
}
