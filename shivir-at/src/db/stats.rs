//! Attendance statistics and per-person progress reports

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use shivir_common::db::{Person, RepeatVisit, Session, SessionProgress};
use shivir_common::{Error, Result, SessionType};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{attendance, people, sessions};

/// Attendance figures for one calendar day
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceStats {
    pub date: NaiveDate,
    /// Records marked on `date`, any session
    pub total_records: u64,
    /// Records marked on `date` for the active session
    pub active_session_records: u64,
    /// Identities that are active and not blacklisted
    pub eligible_people: u64,
    pub active_session: Option<Session>,
}

/// Progress of one type for a person, with its repeat count
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEntry {
    pub progress: SessionProgress,
    pub repeat_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub person: Person,
    pub level: Option<SessionType>,
    pub entries: Vec<ProgressEntry>,
    pub repeats: Vec<RepeatVisit>,
}

/// UTC bounds `[start, end)` of a local calendar day
fn day_bounds(date: NaiveDate, offset: FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let local_start = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .and_then(|naive| offset.from_local_datetime(&naive).single())
            .map(|local| local.with_timezone(&Utc))
    };

    let next = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::InvalidInput(format!("Date out of range: {}", date)))?;

    match (local_start(date), local_start(next)) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(Error::InvalidInput(format!("Date out of range: {}", date))),
    }
}

pub async fn attendance_stats(
    pool: &SqlitePool,
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<AttendanceStats> {
    let (start, end) = day_bounds(date, offset)?;

    let total_records: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE marked_at >= ? AND marked_at < ?")
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?;

    let active_session = sessions::get_active_session(pool).await?;

    let active_session_records: i64 = match &active_session {
        Some(session) => {
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM attendance
                WHERE session_id = ? AND marked_at >= ? AND marked_at < ?
                "#,
            )
            .bind(session.id.to_string())
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?
        }
        None => 0,
    };

    let eligible_people: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM people WHERE is_active = 1 AND is_blacklisted = 0")
            .fetch_one(pool)
            .await?;

    Ok(AttendanceStats {
        date,
        total_records: total_records as u64,
        active_session_records: active_session_records as u64,
        eligible_people: eligible_people as u64,
        active_session,
    })
}

pub async fn progress_report(pool: &SqlitePool, person_id: Uuid) -> Result<ProgressReport> {
    let person = people::get_person(pool, person_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Person {}", person_id)))?;

    let repeats = attendance::list_repeats(pool, person_id).await?;
    let entries = attendance::list_progress(pool, person_id)
        .await?
        .into_iter()
        .map(|progress| {
            let repeat_count = repeats
                .iter()
                .filter(|r| r.session_type == progress.session_type)
                .count() as u32;
            ProgressEntry { progress, repeat_count }
        })
        .collect();

    Ok(ProgressReport {
        level: person.level(),
        person,
        entries,
        repeats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shivir_common::time::offset_from_minutes;

    #[test]
    fn test_day_bounds_in_ist() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let (start, end) = day_bounds(date, offset_from_minutes(330)).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 11, 18, 30, 0).unwrap());
    }
}
