//! Attendance ledger and day-advance state machine
//!
//! Per (person, session type): `NOT_STARTED -> IN_PROGRESS(day) -> COMPLETED`.
//! Runs inside the caller's transaction. A session may stay active across
//! several days, so the general ledger row is written once per (person,
//! session) and a later collision is tolerated. Progress advances at most
//! once per calendar day; the step is a compare-and-set on `day_number`, so
//! a concurrent writer on the same row makes this call a duplicate instead
//! of a double increment. The caller commits only when the outcome marked
//! attendance.

use chrono::{DateTime, FixedOffset, Utc};
use shivir_common::db::Session;
use shivir_common::time::calendar_date;
use shivir_common::{Error, Outcome, Result, SessionType};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{attendance, people};
use crate::progression;
use crate::repeater;

/// Level change caused by a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub previous: Option<SessionType>,
    pub new: SessionType,
}

/// Outcome of one ledger step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerResult {
    pub outcome: Outcome,
    pub level_change: Option<LevelChange>,
}

impl From<Outcome> for LedgerResult {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            level_change: None,
        }
    }
}

/// Apply one eligible, cooldown-cleared marking
pub async fn record(
    conn: &mut SqliteConnection,
    person_id: Uuid,
    session: &Session,
    now: DateTime<Utc>,
    calendar_offset: FixedOffset,
) -> Result<LedgerResult> {
    let session_type = session.session_type;
    let progress = attendance::get_progress(&mut *conn, person_id, session_type).await?;

    if let Some(progress) = progress.as_ref().filter(|p| p.completed) {
        let outcome =
            repeater::record_repeat(conn, person_id, session, progress, now, calendar_offset).await?;
        return Ok(outcome.into());
    }

    if let Some(progress) = progress.as_ref() {
        if calendar_date(progress.last_marked_at, calendar_offset) == calendar_date(now, calendar_offset) {
            debug!(person_id = %person_id, session_type = %session_type, "Progress already advanced today");
            return Ok(Outcome::DuplicateRecord.into());
        }
    }

    // Already present on later days of a multi-day session
    attendance::insert_attendance(&mut *conn, person_id, session.id, now, true).await?;

    let required = session_type.required_days();
    let day = match progress {
        None => {
            if !attendance::insert_progress(&mut *conn, person_id, session_type, session.id, now)
                .await?
            {
                debug!(person_id = %person_id, session_type = %session_type, "Progress created concurrently");
                return Ok(Outcome::DuplicateRecord.into());
            }
            1
        }
        Some(progress) => {
            if !attendance::advance_progress(
                &mut *conn,
                person_id,
                session_type,
                session.id,
                progress.day_number,
                now,
            )
            .await?
            {
                debug!(
                    person_id = %person_id,
                    session_type = %session_type,
                    expected_day = progress.day_number,
                    "Progress advanced concurrently"
                );
                return Ok(Outcome::DuplicateRecord.into());
            }
            progress.day_number + 1
        }
    };

    if day < required {
        info!(person_id = %person_id, session_type = %session_type, day, required, "Day advanced");
        return Ok(Outcome::DayAdvanced { day, required }.into());
    }

    info!(person_id = %person_id, session_type = %session_type, "Session type completed");
    let level_change = advance_level(conn, person_id, session_type).await?;

    Ok(LedgerResult {
        outcome: Outcome::CompletedSession,
        level_change,
    })
}

/// Move the person's level to `completed` unless that would regress it
async fn advance_level(
    conn: &mut SqliteConnection,
    person_id: Uuid,
    completed: SessionType,
) -> Result<Option<LevelChange>> {
    let person = people::get_person(&mut *conn, person_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Person {}", person_id)))?;
    let previous = person.level();

    if previous == Some(completed) || !progression::should_advance_level(previous, completed) {
        debug!(person_id = %person_id, level = ?previous, completed = %completed, "Level unchanged");
        return Ok(None);
    }

    people::set_level(&mut *conn, person_id, completed).await?;
    info!(person_id = %person_id, previous = ?previous, new = %completed, "Level advanced");

    Ok(Some(LevelChange {
        previous,
        new: completed,
    }))
}
