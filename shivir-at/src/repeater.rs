//! Repeater tracker
//!
//! Handles attendance of a session type the person has already completed.
//! At most one repeat visit is recorded per (person, type, calendar day).

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use shivir_common::db::{RepeatVisit, Session, SessionProgress};
use shivir_common::time::{calendar_date, days_between};
use shivir_common::{Outcome, Result};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::attendance;

/// Days since the previous repeat visit, or since completion for the first one
pub fn repeat_gap(last_repeat: Option<NaiveDate>, completion_date: NaiveDate, today: NaiveDate) -> i64 {
    days_between(last_repeat.unwrap_or(completion_date), today)
}

/// Calendar date on which `progress` was completed
pub fn completion_date(progress: &SessionProgress, offset: FixedOffset) -> NaiveDate {
    calendar_date(progress.completed_at.unwrap_or(progress.last_marked_at), offset)
}

/// Record a repeat visit for a completed type
///
/// Returns `RepeatAlreadyMarkedToday` when today's visit exists,
/// `AlreadyCompleteToday` when the type was completed today, otherwise
/// `RepeatWelcome`.
pub async fn record_repeat(
    conn: &mut SqliteConnection,
    person_id: Uuid,
    session: &Session,
    progress: &SessionProgress,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Outcome> {
    let session_type = session.session_type;
    let today = calendar_date(now, offset);

    if attendance::repeat_exists_on(&mut *conn, person_id, session_type, today).await? {
        debug!(person_id = %person_id, session_type = %session_type, "Repeat already recorded today");
        return Ok(Outcome::RepeatAlreadyMarkedToday);
    }

    let completed_on = completion_date(progress, offset);
    if completed_on == today {
        debug!(person_id = %person_id, session_type = %session_type, "Type already complete for today");
        return Ok(Outcome::AlreadyCompleteToday);
    }

    let last_repeat = attendance::latest_repeat(&mut *conn, person_id, session_type).await?;
    let days_gap = repeat_gap(last_repeat.map(|r| r.visit_date), completed_on, today);
    let ordinal = attendance::count_repeats(&mut *conn, person_id, session_type).await? + 1;

    let visit = RepeatVisit {
        id: Uuid::new_v4(),
        person_id,
        session_type,
        session_id: session.id,
        visit_date: today,
        visited_at: now,
        previous_completion_date: completed_on,
        days_gap,
        repeat_ordinal: ordinal,
    };

    if !attendance::insert_repeat(&mut *conn, &visit).await? {
        // Lost a race with a concurrent scan of the same face
        return Ok(Outcome::RepeatAlreadyMarkedToday);
    }

    attendance::insert_attendance(&mut *conn, person_id, session.id, now, true).await?;

    info!(
        person_id = %person_id,
        session_type = %session_type,
        days_gap,
        ordinal,
        "Repeat visit recorded"
    );

    Ok(Outcome::RepeatWelcome {
        days_gap,
        ordinal,
    })
}
