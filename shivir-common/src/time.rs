//! Timestamp and calendar-day utilities
//!
//! All instants are stored in UTC. "Calendar day" questions (repeat visits,
//! daily statistics) are answered in a fixed local offset, IST by default.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Default calendar offset: India Standard Time (UTC+05:30)
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build a fixed offset from minutes east of UTC, clamping invalid values to UTC
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            tracing::warn!(minutes, "Invalid calendar offset, using UTC");
            Utc.fix()
        })
}

/// Local calendar date of a UTC instant
pub fn calendar_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// Whole calendar days from `earlier` to `later` (negative if reversed)
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}
