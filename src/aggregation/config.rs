use chrono::{DateTime, Local, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time zone in which epoch timestamps are turned into an hour of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HourZone {
    /// The host's local time zone. Results depend on the machine's TZ setting.
    Local,
    /// A fixed IANA zone, e.g. `UTC` or `Europe/Berlin`
    Named(Tz),
}

impl HourZone {
    /// Hour of day (0-23) for `secs` seconds since the epoch, or `None` when the
    /// instant is outside the representable range
    pub fn hour_of(&self, secs: i64) -> Option<u32> {
        let instant = DateTime::<Utc>::from_timestamp(secs, 0)?;
        let hour = match self {
            HourZone::Local => instant.with_timezone(&Local).hour(),
            HourZone::Named(tz) => instant.with_timezone(tz).hour(),
        };
        Some(hour)
    }
}

impl Default for HourZone {
    fn default() -> Self {
        HourZone::Named(Tz::UTC)
    }
}

impl fmt::Display for HourZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HourZone::Local => f.write_str("local"),
            HourZone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl FromStr for HourZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(HourZone::Local);
        }
        s.parse::<Tz>()
            .map(HourZone::Named)
            .map_err(|e| format!("unknown time zone '{}': {}", s, e))
    }
}

impl TryFrom<String> for HourZone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HourZone> for String {
    fn from(zone: HourZone) -> Self {
        zone.to_string()
    }
}

/// Configuration for the aggregator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Zone used for hour-of-day bucketing
    #[serde(default)]
    pub time_zone: HourZone,
}

impl AggregatorConfig {
    /// Use `zone` for hour bucketing
    pub fn with_time_zone(mut self, zone: HourZone) -> Self {
        self.time_zone = zone;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_zone_is_utc() {
        assert_eq!(HourZone::default(), HourZone::Named(Tz::UTC));
        assert_eq!(HourZone::default().to_string(), "UTC");
    }

    #[test]
    fn test_parse_zone() {
        assert_eq!("local".parse::<HourZone>().unwrap(), HourZone::Local);
        assert_eq!("LOCAL".parse::<HourZone>().unwrap(), HourZone::Local);
        assert_eq!(
            "Asia/Tokyo".parse::<HourZone>().unwrap(),
            HourZone::Named(chrono_tz::Asia::Tokyo)
        );
        assert!("Mars/Olympus_Mons".parse::<HourZone>().is_err());
    }

    #[test]
    fn test_hour_of() {
        // 2023-11-14T22:13:20Z
        let secs = 1_700_000_000;
        assert_eq!(HourZone::default().hour_of(secs), Some(22));
        assert_eq!(HourZone::Named(chrono_tz::Asia::Tokyo).hour_of(secs), Some(7));
        assert_eq!(HourZone::default().hour_of(0), Some(0));
        assert_eq!(HourZone::default().hour_of(-1), Some(23));
        assert_eq!(HourZone::default().hour_of(i64::MAX), None);
    }

    #[test]
    fn test_local_zone_yields_an_hour() {
        let hour = HourZone::Local.hour_of(1_700_000_000).unwrap();
        assert!(hour < 24);
    }

    #[test]
    fn test_config_yaml() {
        let config: AggregatorConfig = serde_yaml::from_str("time_zone: Europe/Berlin").unwrap();
        assert_eq!(config.time_zone, HourZone::Named(chrono_tz::Europe::Berlin));

        let config: AggregatorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AggregatorConfig::default());

        assert!(serde_yaml::from_str::<AggregatorConfig>("time_zone: Nowhere/Else").is_err());
    }
}
