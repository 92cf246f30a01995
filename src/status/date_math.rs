//! Calendar-date arithmetic for due dates.
//!
//! All values are plain calendar days (`NaiveDate`). A string such as
//! `"2024-03-10"` is split into year, month and day and never passed through
//! a timezone-aware constructor, so it names the same day for every caller.

use chrono::NaiveDate;

use crate::errors::StatusError;

/// Storage and wire format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a calendar date.
///
/// Accepts `YYYY-MM-DD`, optionally followed by a time component separated
/// by `T` or a space (`2024-03-10T00:00:00.000Z`). Only the leading date is
/// read; the time and any offset are ignored rather than applied.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, StatusError> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or_default();

    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| StatusError::InvalidDate {
        value: raw.to_string(),
    })
}

/// Signed number of whole days from `from` to `to`.
///
/// Positive when `to` is later. Both sides are whole days, so this equals
/// `ceil((to - from) / 1 day)`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Format a calendar date the way it is stored.
pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
