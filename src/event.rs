//! Inbound login records
//!
//! A [`RawEvent`] is the loosely-typed JSON object handed over by the transport.
//! It may miss fields or carry extra ones. Once it has passed the validation gate
//! it is viewed as a [`LoginEvent`], whose categorical fields are normalised to
//! string keys. The timestamp stays a raw JSON value until ingestion, because
//! interpreting it is the aggregator's job and may fail.
use crate::error::{Result, StatsError};
use crate::validate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Export EventBuilder for tests
pub use builder::EventBuilder;

/// Test helpers for building raw events
pub mod builder;

/// Decoded but unvalidated inbound record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent {
    fields: Map<String, Value>,
}

impl RawEvent {
    /// Wrap an already decoded JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Decode a transport payload. Anything but a JSON object is a decode error.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Value>(payload)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(StatsError::Decode(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Whether the record carries `key`, whatever its value
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields of the record
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for RawEvent {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Typed view over a validated record
#[derive(Debug, Clone, PartialEq)]
pub struct LoginEvent {
    /// User identifier key
    pub user_id: String,
    /// Device category, e.g. `android` or `iOS`
    pub device_type: String,
    /// Device identifier; carried but not aggregated
    pub device_id: String,
    /// Location code
    pub locale: String,
    /// Seconds since epoch, uninterpreted
    pub timestamp: Value,
}

impl LoginEvent {
    /// Build an event from already typed parts
    pub fn new(
        user_id: impl Into<String>,
        device_type: impl Into<String>,
        device_id: impl Into<String>,
        locale: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            device_type: device_type.into(),
            device_id: device_id.into(),
            locale: locale.into(),
            timestamp: Value::from(timestamp),
        }
    }

    /// View a raw record as a login event.
    ///
    /// Fails with [`StatsError::InvalidEvent`] when a required field is absent.
    pub fn from_raw(raw: &RawEvent) -> Result<Self> {
        validate::check(raw)?;
        let field = |name: &str| raw.get(name).map(key_text).unwrap_or_default();
        Ok(Self {
            user_id: field("user_id"),
            device_type: field("device_type"),
            device_id: field("device_id"),
            locale: field("locale"),
            timestamp: raw.get("timestamp").cloned().unwrap_or(Value::Null),
        })
    }
}

impl TryFrom<&RawEvent> for LoginEvent {
    type Error = StatsError;

    fn try_from(raw: &RawEvent) -> Result<Self> {
        Self::from_raw(raw)
    }
}

/// Map key for a categorical JSON value.
///
/// Strings are used verbatim; anything else becomes its compact JSON text, which
/// is also how a JSON object renders a non-string key.
pub fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
