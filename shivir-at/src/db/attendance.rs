//! Ledger storage
//!
//! General attendance records, per-type day progress and repeat visits.
//! Write helpers take a connection so they run inside the engine's
//! transaction; a uniqueness collision is reported as `false`, never as an
//! error.

use chrono::{DateTime, NaiveDate, Utc};
use shivir_common::db::{AttendanceRecord, RepeatVisit, SessionProgress};
use shivir_common::{Result, SessionType};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Insert a general ledger record; `false` when (person, session) already exists
pub async fn insert_attendance(
    conn: &mut SqliteConnection,
    person_id: Uuid,
    session_id: Uuid,
    marked_at: DateTime<Utc>,
    marked_by_system: bool,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance (guid, person_id, session_id, marked_at, marked_by_system)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (person_id, session_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(person_id.to_string())
    .bind(session_id.to_string())
    .bind(marked_at)
    .bind(marked_by_system)
    .execute(conn)
    .await?;

    let inserted = result.rows_affected() == 1;
    if !inserted {
        debug!(person_id = %person_id, session_id = %session_id, "Attendance already recorded");
    }
    Ok(inserted)
}

/// Most recent marking of this person at this session
pub async fn latest_attendance_for_session<'e, E>(
    executor: E,
    person_id: Uuid,
    session_id: Uuid,
) -> Result<Option<DateTime<Utc>>>
where
    E: Executor<'e, Database = Sqlite>,
{
    // The ledger row keeps the first marking; later days live on progress and repeats
    let marked_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT MAX(marked_at) FROM (
            SELECT marked_at FROM attendance WHERE person_id = ?1 AND session_id = ?2
            UNION ALL
            SELECT last_marked_at FROM session_progress WHERE person_id = ?1 AND session_id = ?2
            UNION ALL
            SELECT visited_at FROM repeat_visits WHERE person_id = ?1 AND session_id = ?2
        )
        "#,
    )
    .bind(person_id.to_string())
    .bind(session_id.to_string())
    .fetch_one(executor)
    .await?;

    Ok(marked_at)
}

/// Most recent marking of this person at any session of `session_type`
pub async fn latest_attendance_for_type<'e, E>(
    executor: E,
    person_id: Uuid,
    session_type: SessionType,
) -> Result<Option<DateTime<Utc>>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let marked_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT MAX(marked_at) FROM (
            SELECT a.marked_at FROM attendance a
            JOIN sessions s ON s.guid = a.session_id
            WHERE a.person_id = ?1 AND s.session_type = ?2
            UNION ALL
            SELECT last_marked_at FROM session_progress WHERE person_id = ?1 AND session_type = ?2
            UNION ALL
            SELECT visited_at FROM repeat_visits WHERE person_id = ?1 AND session_type = ?2
        )
        "#,
    )
    .bind(person_id.to_string())
    .bind(session_type.as_str())
    .fetch_one(executor)
    .await?;

    Ok(marked_at)
}

/// Every ledger record of a person, oldest first
pub async fn list_attendance(pool: &SqlitePool, person_id: Uuid) -> Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {} FROM attendance WHERE person_id = ? ORDER BY marked_at",
        AttendanceRecord::COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(person_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(AttendanceRecord::from_row).collect()
}

pub async fn get_progress<'e, E>(
    executor: E,
    person_id: Uuid,
    session_type: SessionType,
) -> Result<Option<SessionProgress>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM session_progress WHERE person_id = ? AND session_type = ?",
        SessionProgress::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(person_id.to_string())
        .bind(session_type.as_str())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(SessionProgress::from_row).transpose()
}

/// Start progress at day 1; `false` when a row already exists
///
/// Single-day types are completed immediately.
pub async fn insert_progress(
    conn: &mut SqliteConnection,
    person_id: Uuid,
    session_type: SessionType,
    session_id: Uuid,
    at: DateTime<Utc>,
) -> Result<bool> {
    let required = session_type.required_days();
    let completed = required <= 1;

    let result = sqlx::query(
        r#"
        INSERT INTO session_progress
            (person_id, session_type, session_id, day_number, required_days, completed,
             first_marked_at, last_marked_at, completed_at)
        VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?)
        ON CONFLICT (person_id, session_type) DO NOTHING
        "#,
    )
    .bind(person_id.to_string())
    .bind(session_type.as_str())
    .bind(session_id.to_string())
    .bind(required as i64)
    .bind(completed)
    .bind(at)
    .bind(at)
    .bind(completed.then_some(at))
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Advance from `expected_day` to the next day (compare-and-set)
///
/// Only succeeds when the stored row is still at `expected_day` and not yet
/// completed, so two racing advances cannot both increment. Completion is
/// derived from the stored `required_days` in the same statement.
pub async fn advance_progress(
    conn: &mut SqliteConnection,
    person_id: Uuid,
    session_type: SessionType,
    session_id: Uuid,
    expected_day: u32,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE session_progress
        SET day_number = day_number + 1,
            completed = CASE WHEN day_number + 1 >= required_days THEN 1 ELSE 0 END,
            completed_at = CASE WHEN day_number + 1 >= required_days THEN ? ELSE NULL END,
            session_id = ?,
            last_marked_at = ?
        WHERE person_id = ? AND session_type = ? AND day_number = ? AND completed = 0
        "#,
    )
    .bind(at)
    .bind(session_id.to_string())
    .bind(at)
    .bind(person_id.to_string())
    .bind(session_type.as_str())
    .bind(expected_day as i64)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// All progress rows of a person in curriculum order
pub async fn list_progress(pool: &SqlitePool, person_id: Uuid) -> Result<Vec<SessionProgress>> {
    let sql = format!(
        "SELECT {} FROM session_progress WHERE person_id = ?",
        SessionProgress::COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(person_id.to_string())
        .fetch_all(pool)
        .await?;

    let mut progress = rows
        .iter()
        .map(SessionProgress::from_row)
        .collect::<Result<Vec<_>>>()?;
    progress.sort_by_key(|p| p.session_type);
    Ok(progress)
}

pub async fn repeat_exists_on<'e, E>(
    executor: E,
    person_id: Uuid,
    session_type: SessionType,
    visit_date: NaiveDate,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM repeat_visits WHERE person_id = ? AND session_type = ? AND visit_date = ?",
    )
    .bind(person_id.to_string())
    .bind(session_type.as_str())
    .bind(visit_date)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// Latest repeat visit (highest ordinal) for a person and type
pub async fn latest_repeat<'e, E>(
    executor: E,
    person_id: Uuid,
    session_type: SessionType,
) -> Result<Option<RepeatVisit>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        SELECT {} FROM repeat_visits
        WHERE person_id = ? AND session_type = ?
        ORDER BY repeat_ordinal DESC LIMIT 1
        "#,
        RepeatVisit::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(person_id.to_string())
        .bind(session_type.as_str())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(RepeatVisit::from_row).transpose()
}

pub async fn count_repeats<'e, E>(executor: E, person_id: Uuid, session_type: SessionType) -> Result<u32>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM repeat_visits WHERE person_id = ? AND session_type = ?",
    )
    .bind(person_id.to_string())
    .bind(session_type.as_str())
    .fetch_one(executor)
    .await?;

    Ok(count as u32)
}

/// Insert a repeat visit; `false` when the day or ordinal is already taken
pub async fn insert_repeat(conn: &mut SqliteConnection, visit: &RepeatVisit) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO repeat_visits
            (guid, person_id, session_type, session_id, visit_date, visited_at,
             previous_completion_date, days_gap, repeat_ordinal)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(visit.id.to_string())
    .bind(visit.person_id.to_string())
    .bind(visit.session_type.as_str())
    .bind(visit.session_id.to_string())
    .bind(visit.visit_date)
    .bind(visit.visited_at)
    .bind(visit.previous_completion_date)
    .bind(visit.days_gap)
    .bind(visit.repeat_ordinal as i64)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Repeat visits of a person, oldest first
pub async fn list_repeats(pool: &SqlitePool, person_id: Uuid) -> Result<Vec<RepeatVisit>> {
    let sql = format!(
        "SELECT {} FROM repeat_visits WHERE person_id = ? ORDER BY visited_at",
        RepeatVisit::COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(person_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(RepeatVisit::from_row).collect()
}
