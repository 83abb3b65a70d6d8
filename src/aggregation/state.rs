use std::collections::{BTreeMap, HashMap};

/// Hours in a day; `logins_per_hour` is indexed by hour of day
pub const HOURS_PER_DAY: usize = 24;

/// Running login counters.
///
/// All four mappings partition the same event count by a different key, so their
/// value sums always agree. Nothing is ever removed or decremented.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorState {
    logins_per_user: HashMap<String, u64>,
    logins_per_device_type: BTreeMap<String, u64>,
    logins_per_location: BTreeMap<String, u64>,
    logins_per_hour: [u64; HOURS_PER_DAY],
    total_logins: u64,
}

impl AggregatorState {
    /// Create a state with every mapping empty
    pub fn new() -> Self {
        Self {
            logins_per_user: HashMap::new(),
            logins_per_device_type: BTreeMap::new(),
            logins_per_location: BTreeMap::new(),
            logins_per_hour: [0; HOURS_PER_DAY],
            total_logins: 0,
        }
    }

    /// Count one login in every mapping.
    ///
    /// `hour` must already be reduced to 0-23.
    pub(crate) fn record(&mut self, user_id: &str, device_type: &str, locale: &str, hour: u32) {
        debug_assert!((hour as usize) < HOURS_PER_DAY);

        *self.logins_per_user.entry(user_id.to_owned()).or_insert(0) += 1;
        *self.logins_per_device_type.entry(device_type.to_owned()).or_insert(0) += 1;
        *self.logins_per_location.entry(locale.to_owned()).or_insert(0) += 1;
        self.logins_per_hour[hour as usize % HOURS_PER_DAY] += 1;
        self.total_logins += 1;
    }

    /// Logins per user
    pub fn logins_per_user(&self) -> &HashMap<String, u64> {
        &self.logins_per_user
    }

    /// Logins per device type
    pub fn logins_per_device_type(&self) -> &BTreeMap<String, u64> {
        &self.logins_per_device_type
    }

    /// Logins per locale
    pub fn logins_per_location(&self) -> &BTreeMap<String, u64> {
        &self.logins_per_location
    }

    /// Logins per hour of day
    pub fn logins_per_hour(&self) -> &[u64; HOURS_PER_DAY] {
        &self.logins_per_hour
    }

    /// Sum of logins over an hour range, clamped to the day
    pub fn logins_between(&self, hours: std::ops::Range<usize>) -> u64 {
        let end = hours.end.min(HOURS_PER_DAY);
        let start = hours.start.min(end);
        self.logins_per_hour[start..end].iter().sum()
    }

    /// Number of ingested events
    pub fn total_logins(&self) -> u64 {
        self.total_logins
    }

    /// Number of distinct users seen
    pub fn distinct_users(&self) -> usize {
        self.logins_per_user.len()
    }

    /// Whether nothing has been ingested yet
    pub fn is_empty(&self) -> bool {
        self.total_logins == 0
    }
}

impl Default for AggregatorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_empty() {
        let state = AggregatorState::new();
        assert!(state.is_empty());
        assert_eq!(state.distinct_users(), 0);
        assert!(state.logins_per_device_type().is_empty());
        assert!(state.logins_per_location().is_empty());
        assert_eq!(state.logins_between(0..24), 0);
    }

    #[test]
    fn test_record_increments_every_mapping() {
        let mut state = AggregatorState::new();
        state.record("u1", "mobile", "US", 2);
        state.record("u1", "web", "US", 23);

        assert_eq!(state.logins_per_user()["u1"], 2);
        assert_eq!(state.logins_per_device_type()["mobile"], 1);
        assert_eq!(state.logins_per_device_type()["web"], 1);
        assert_eq!(state.logins_per_location()["US"], 2);
        assert_eq!(state.logins_per_hour()[2], 1);
        assert_eq!(state.logins_per_hour()[23], 1);
        assert_eq!(state.total_logins(), 2);
    }

    #[test]
    fn test_logins_between_clamps() {
        let mut state = AggregatorState::new();
        state.record("u1", "mobile", "US", 5);
        state.record("u1", "mobile", "US", 6);
        assert_eq!(state.logins_between(0..6), 1);
        assert_eq!(state.logins_between(6..12), 1);
        assert_eq!(state.logins_between(12..100), 0);
        assert_eq!(state.logins_between(30..40), 0);
    }
}
