use super::RawEvent;
use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};

/// Builder for creating raw login records
pub struct EventBuilder {
    fields: Map<String, Value>,
}

impl EventBuilder {
    /// Create an empty EventBuilder
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Start from a complete login record. `device_id` is derived from the user.
    pub fn login(user_id: &str, device_type: &str, locale: &str, timestamp: i64) -> Self {
        Self::new()
            .field("user_id", user_id)
            .field("device_type", device_type)
            .field("device_id", format!("{}-{}", user_id, device_type))
            .field("locale", locale)
            .field("timestamp", timestamp)
    }

    /// Add a field to the record
    pub fn field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Drop a field from the record
    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// Set `timestamp` to the epoch seconds of `at`
    pub fn timestamp<Tz: TimeZone>(self, at: DateTime<Tz>) -> Self {
        self.field("timestamp", at.timestamp())
    }

    /// Build the RawEvent
    pub fn build(self) -> RawEvent {
        RawEvent::new(self.fields)
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
