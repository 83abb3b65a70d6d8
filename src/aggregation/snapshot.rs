use super::state::AggregatorState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// Hours counted as night logins
pub const NIGHT_HOURS: Range<usize> = 0..6;
/// Hours counted as morning logins
pub const MORNING_HOURS: Range<usize> = 6..12;

/// Point-in-time statistics derived from [`AggregatorState`].
///
/// Field names are the wire names of the published statistics record and must
/// not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Total logins divided by distinct users; 0 before the first login
    pub average_logins_per_user: f64,
    /// Fewest logins of any user; 0 before the first login
    pub min_logins_per_user: u64,
    /// Most logins of any user; 0 before the first login
    pub max_logins_per_user: u64,
    /// Number of distinct device types
    pub different_device_types: usize,
    /// Number of distinct locales
    pub different_locations: usize,
    /// Logins with hour of day in [0, 6)
    pub logins_at_night: u64,
    /// Logins with hour of day in [6, 12)
    pub logins_in_morning: u64,
    /// Logins per device type
    pub user_login_per_device_type: BTreeMap<String, u64>,
    /// Logins per locale
    pub user_login_per_location: BTreeMap<String, u64>,
}

impl StatisticsSnapshot {
    /// Derive the statistics view of `state`
    pub fn from_state(state: &AggregatorState) -> Self {
        let per_user = state.logins_per_user().values();
        let min_logins_per_user = per_user.clone().copied().min().unwrap_or(0);
        let max_logins_per_user = per_user.copied().max().unwrap_or(0);

        let average_logins_per_user = match state.distinct_users() {
            0 => 0.0,
            users => state.total_logins() as f64 / users as f64,
        };

        Self {
            average_logins_per_user,
            min_logins_per_user,
            max_logins_per_user,
            different_device_types: state.logins_per_device_type().len(),
            different_locations: state.logins_per_location().len(),
            logins_at_night: state.logins_between(NIGHT_HOURS),
            logins_in_morning: state.logins_between(MORNING_HOURS),
            user_login_per_device_type: state.logins_per_device_type().clone(),
            user_login_per_location: state.logins_per_location().clone(),
        }
    }

    /// Encode as a JSON statistics record
    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl Default for StatisticsSnapshot {
    fn default() -> Self {
        Self::from_state(&AggregatorState::new())
    }
}
