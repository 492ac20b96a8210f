//! Recurrence pattern types and expansion math
//!
//! A class template carries a weekly or daily recurrence pattern plus local
//! HH:MM start/end times and an IANA timezone. This module answers two pure
//! questions: does a calendar day qualify, and what UTC window does a
//! qualifying day's class occupy.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Recurrence kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Weekly,
    Daily,
}

/// Recurrence pattern stored on a Class (JSON column)
///
/// `days_of_week` uses 0 = Sunday .. 6 = Saturday and is only meaningful
/// for weekly patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    pub pattern: RecurrenceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    pub timezone: String,
}

impl RecurrencePattern {
    /// Whether the pattern produces an instance on this calendar day
    pub fn day_qualifies(&self, date: NaiveDate) -> bool {
        match self.pattern {
            RecurrenceKind::Daily => true,
            RecurrenceKind::Weekly => {
                let weekday = date.weekday().num_days_from_sunday() as u8;
                self.days_of_week
                    .as_ref()
                    .is_some_and(|days| days.contains(&weekday))
            }
        }
    }

    /// Parse the configured IANA timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| Error::InvalidInput(format!("Unknown timezone: {}", self.timezone)))
    }

    /// Validate the pattern on input: weekly needs at least one weekday,
    /// weekday numbers stay in 0..=6, and the timezone must resolve.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        match self.pattern {
            RecurrenceKind::Daily => Ok(()),
            RecurrenceKind::Weekly => match &self.days_of_week {
                Some(days) if !days.is_empty() => {
                    if let Some(bad) = days.iter().find(|d| **d > 6) {
                        return Err(Error::InvalidInput(format!(
                            "daysOfWeek entries must be 0-6, got {}",
                            bad
                        )));
                    }
                    Ok(())
                }
                _ => Err(Error::InvalidInput(
                    "Weekly pattern requires non-empty daysOfWeek".to_string(),
                )),
            },
        }
    }
}

/// Parse an "HH:MM" local time string
pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| Error::InvalidInput(format!("Invalid HH:MM time: {}", value)))
}

/// Combine a calendar date with a local HH:MM time in the given timezone,
/// yielding the UTC instant.
///
/// DST handling: an ambiguous local time resolves to its earliest
/// occurrence; a local time inside a spring-forward gap yields None and the
/// caller skips that date.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly(days: &[u8], tz: &str) -> RecurrencePattern {
        RecurrencePattern {
            pattern: RecurrenceKind::Weekly,
            days_of_week: Some(days.to_vec()),
            timezone: tz.to_string(),
        }
    }

    #[test]
    fn test_daily_pattern_qualifies_every_day() {
        let pattern = RecurrencePattern {
            pattern: RecurrenceKind::Daily,
            days_of_week: None,
            timezone: "UTC".to_string(),
        };

        let mut date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        for _ in 0..7 {
            assert!(pattern.day_qualifies(date));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_weekly_pattern_matches_configured_days() {
        // 1 = Monday, 3 = Wednesday
        let pattern = weekly(&[1, 3], "UTC");

        // 2025-03-03 is a Monday
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let wednesday = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();

        assert!(pattern.day_qualifies(monday));
        assert!(!pattern.day_qualifies(tuesday));
        assert!(pattern.day_qualifies(wednesday));
        assert!(!pattern.day_qualifies(sunday));
    }

    #[test]
    fn test_sunday_is_zero() {
        let pattern = weekly(&[0], "UTC");
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert!(pattern.day_qualifies(sunday));
    }

    #[test]
    fn test_validate_rejects_bad_patterns() {
        assert!(weekly(&[], "UTC").validate().is_err());
        assert!(weekly(&[7], "UTC").validate().is_err());
        assert!(weekly(&[1], "Not/AZone").validate().is_err());
        assert!(weekly(&[0, 6], "America/New_York").validate().is_ok());
    }

    #[test]
    fn test_local_to_utc_standard_offset() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // January: EST, UTC-5
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let time = parse_hhmm("09:00").unwrap();

        let utc = local_to_utc(date, time, tz).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-01-15T14:00:00+00:00");
    }

    #[test]
    fn test_local_to_utc_dst_gap_skipped() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2025-03-09 02:30 does not exist (spring forward)
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let time = parse_hhmm("02:30").unwrap();

        assert!(local_to_utc(date, time, tz).is_none());
    }

    #[test]
    fn test_pattern_json_round_trip() {
        let json = r#"{"pattern":"weekly","daysOfWeek":[1,3,5],"timezone":"Europe/London"}"#;
        let pattern: RecurrencePattern = serde_json::from_str(json).unwrap();

        assert_eq!(pattern.pattern, RecurrenceKind::Weekly);
        assert_eq!(pattern.days_of_week.as_deref(), Some(&[1u8, 3, 5][..]));

        let back = serde_json::to_string(&pattern).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_parse_hhmm_rejects_garbage() {
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("9am").is_err());
        assert_eq!(
            parse_hhmm("18:45").unwrap(),
            NaiveTime::from_hms_opt(18, 45, 0).unwrap()
        );
    }
}
