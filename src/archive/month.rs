//! Month-key derivation for partition routing.
//!
//! Keys use the process-default time zone and the Gregorian calendar, so two
//! timestamps in the same local calendar month always map to the same key.

use chrono::{DateTime, Datelike, Local};

use crate::error::{Error, Result};

/// Derives the calendar-month partition key for a millisecond timestamp,
/// e.g. `"2024_07"`.
pub fn month_key(timestamp_ms: i64) -> Result<String> {
    let time = local_time(timestamp_ms)?;
    Ok(format_key(time.year(), time.month()))
}

/// Keys for every month touched by the inclusive range `[start, end]`, in
/// ascending chronological order.
///
/// Returns an empty list when `start > end`; a range inside a single month
/// yields exactly one key.
pub fn month_keys_between(start_ms: i64, end_ms: i64) -> Result<Vec<String>> {
    if start_ms > end_ms {
        return Ok(Vec::new());
    }
    let start = local_time(start_ms)?;
    let end = local_time(end_ms)?;

    let last = (end.year(), end.month());
    let (mut year, mut month) = (start.year(), start.month());
    let mut keys = Vec::new();
    loop {
        keys.push(format_key(year, month));
        if (year, month) == last {
            break;
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    Ok(keys)
}

fn format_key(year: i32, month: u32) -> String {
    format!("{year:04}_{month:02}")
}

fn local_time(timestamp_ms: i64) -> Result<DateTime<Local>> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local))
        .ok_or(Error::TimestampOutOfRange(timestamp_ms))
}
