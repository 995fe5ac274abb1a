//! Timestamp and schedule utilities

use crate::{Error, Result};
use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};

/// Parse a `HH:MM` wall-clock time
pub fn parse_daily_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("Invalid daily time '{}': {}", value, e)))
}

/// Next occurrence of `at` strictly after `now`
pub fn next_daily_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Time remaining until `target`, zero if already passed
pub fn duration_until(now: NaiveDateTime, target: NaiveDateTime) -> std::time::Duration {
    (target - now).to_std().unwrap_or_default()
}
