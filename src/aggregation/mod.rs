//! Running login statistics
//!
//! The [`Aggregator`] owns an [`AggregatorState`] behind a lock. Each ingest holds
//! the write lock for the whole four-counter update, and snapshots are taken
//! under the read lock, so readers never see an event half applied.

use crate::error::{Result, StatsError};
use crate::event::LoginEvent;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

/// Configuration types for aggregation
pub mod config;
/// Derived statistics view
pub mod snapshot;
/// Counter storage
pub mod state;

pub use config::{AggregatorConfig, HourZone};
pub use snapshot::{StatisticsSnapshot, MORNING_HOURS, NIGHT_HOURS};
pub use state::AggregatorState;

/// Stateful owner of all login counters
#[derive(Debug, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
    state: RwLock<AggregatorState>,
}

impl Aggregator {
    /// Create an aggregator with empty state
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            state: RwLock::new(AggregatorState::new()),
        }
    }

    /// Create an aggregator bucketing hours in `zone`
    pub fn with_time_zone(zone: HourZone) -> Self {
        Self::new(AggregatorConfig::default().with_time_zone(zone))
    }

    /// Zone used for hour-of-day bucketing
    pub fn time_zone(&self) -> HourZone {
        self.config.time_zone
    }

    /// Count one validated login.
    ///
    /// The hour of day is derived before any counter is touched, so a
    /// [`StatsError::MalformedTimestamp`] leaves the state unchanged.
    pub fn ingest(&self, event: &LoginEvent) -> Result<()> {
        let hour = self.hour_of_day(&event.timestamp)?;
        self.state
            .write()
            .record(&event.user_id, &event.device_type, &event.locale, hour);
        trace!(user_id = %event.user_id, hour, "login counted");
        Ok(())
    }

    /// Derive the current statistics. Never mutates state.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot::from_state(&self.state.read())
    }

    /// Ingest and snapshot under one exclusive lock, so the returned statistics
    /// include this event and no later one
    pub fn ingest_and_snapshot(&self, event: &LoginEvent) -> Result<StatisticsSnapshot> {
        let hour = self.hour_of_day(&event.timestamp)?;
        let mut state = self.state.write();
        state.record(&event.user_id, &event.device_type, &event.locale, hour);
        Ok(StatisticsSnapshot::from_state(&state))
    }

    /// Number of logins counted so far
    pub fn total_logins(&self) -> u64 {
        self.state.read().total_logins()
    }

    /// Number of distinct users seen so far
    pub fn distinct_users(&self) -> usize {
        self.state.read().distinct_users()
    }

    /// Consistent copy of the raw counters
    pub fn state(&self) -> AggregatorState {
        self.state.read().clone()
    }

    fn hour_of_day(&self, timestamp: &Value) -> Result<u32> {
        epoch_seconds(timestamp)
            .and_then(|secs| self.config.time_zone.hour_of(secs))
            .ok_or_else(|| StatsError::MalformedTimestamp {
                value: timestamp.to_string(),
            })
    }
}

/// Whole seconds since the epoch. Fractional seconds are floored.
fn epoch_seconds(timestamp: &Value) -> Option<i64> {
    let Value::Number(number) = timestamp else {
        return None;
    };
    if let Some(secs) = number.as_i64() {
        return Some(secs);
    }
    if number.is_u64() {
        return None;
    }
    let secs = number.as_f64()?.floor();
    if secs.is_finite() && secs >= i64::MIN as f64 && secs < i64::MAX as f64 {
        Some(secs as i64)
    } else {
        None
    }
}
