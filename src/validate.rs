use crate::error::{Result, StatsError};
use crate::event::RawEvent;

/// Fields every login record must carry before it may touch aggregator state
pub const REQUIRED_FIELDS: [&str; 5] = ["user_id", "device_type", "device_id", "locale", "timestamp"];

/// Validates that every required field is present as a key.
///
/// Presence only: empty strings, `null` and non-numeric timestamps all pass.
pub fn is_valid(record: &RawEvent) -> bool {
    REQUIRED_FIELDS.iter().all(|field| record.contains_key(field))
}

/// Like [`is_valid`], but reports which fields are missing
pub fn check(record: &RawEvent) -> Result<()> {
    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !record.contains_key(field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StatsError::InvalidEvent { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;
    use serde_json::Value;

    fn complete() -> EventBuilder {
        EventBuilder::login("u1", "mobile", "US", 1_700_000_000)
    }

    #[test]
    fn test_complete_record_is_valid() {
        assert!(is_valid(&complete().build()));
        assert!(check(&complete().build()).is_ok());
    }

    #[test]
    fn test_each_missing_field_is_invalid() {
        for field in REQUIRED_FIELDS {
            let record = complete().without(field).build();
            assert!(!is_valid(&record), "record without {} passed", field);
            assert_eq!(
                check(&record),
                Err(StatsError::InvalidEvent { missing: vec![field] })
            );
        }
    }

    #[test]
    fn test_presence_only() {
        let record = complete()
            .field("user_id", "")
            .field("locale", Value::Null)
            .field("timestamp", "not a number")
            .build();
        assert!(is_valid(&record));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let record = complete().field("ip", "10.0.0.1").build();
        assert!(is_valid(&record));
    }

    #[test]
    fn test_empty_record_reports_all_fields() {
        let err = check(&RawEvent::default()).unwrap_err();
        assert_eq!(
            err,
            StatsError::InvalidEvent {
                missing: REQUIRED_FIELDS.to_vec()
            }
        );
    }
}
