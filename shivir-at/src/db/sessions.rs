//! Session registry
//!
//! At most one session is active at any time. Switching the active session
//! deactivates every other one in the same transaction; the partial unique
//! index on `sessions(is_active)` backs this up in storage.

use chrono::NaiveDate;
use shivir_common::db::Session;
use shivir_common::{Error, Result, SessionType};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_CONDUCTOR: &str = "Sirshree";

/// Data for a new session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: String,
    pub session_type: SessionType,
    pub session_date: NaiveDate,
    pub conducted_by: String,
}

impl NewSession {
    pub fn new(name: impl Into<String>, session_type: SessionType, session_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            session_type,
            session_date,
            conducted_by: DEFAULT_CONDUCTOR.to_string(),
        }
    }

    pub fn conducted_by(mut self, conductor: impl Into<String>) -> Self {
        self.conducted_by = conductor.into();
        self
    }
}

/// Create a session, optionally making it the active one
pub async fn create_session(pool: &SqlitePool, session: &NewSession, activate: bool) -> Result<Session> {
    if session.name.trim().is_empty() {
        return Err(Error::InvalidInput("Session name is required".to_string()));
    }

    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    if activate {
        clear_active(&mut *tx).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO sessions (guid, session_name, session_type, session_date, conducted_by, is_active)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(session.name.trim())
    .bind(session.session_type.as_str())
    .bind(session.session_date)
    .bind(&session.conducted_by)
    .bind(activate)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        session_id = %id,
        session_type = %session.session_type,
        date = %session.session_date,
        active = activate,
        "Created session: {}",
        session.name
    );

    get_session(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Session {} missing after insert", id)))
}

pub async fn get_session<'e, E>(executor: E, id: Uuid) -> Result<Option<Session>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM sessions WHERE guid = ?", Session::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(Session::from_row).transpose()
}

/// The currently active session, if any
pub async fn get_active_session<'e, E>(executor: E) -> Result<Option<Session>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM sessions WHERE is_active = 1 LIMIT 1",
        Session::COLUMNS
    );
    let row = sqlx::query(&sql).fetch_optional(executor).await?;

    row.as_ref().map(Session::from_row).transpose()
}

/// All sessions, newest first
pub async fn list_sessions(pool: &SqlitePool) -> Result<Vec<Session>> {
    let sql = format!(
        "SELECT {} FROM sessions ORDER BY session_date DESC, created_at DESC",
        Session::COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(Session::from_row).collect()
}

/// Make `id` the only active session
pub async fn activate_session(pool: &SqlitePool, id: Uuid) -> Result<Session> {
    let mut tx = pool.begin().await?;

    clear_active(&mut *tx).await?;

    let result = sqlx::query(
        "UPDATE sessions SET is_active = 1, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // Dropping the transaction rolls back the deactivation
        return Err(Error::NotFound(format!("Session {}", id)));
    }

    let session = get_session(&mut *tx, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Session {} missing after update", id)))?;

    tx.commit().await?;

    info!(session_id = %id, session_type = %session.session_type, "Activated session: {}", session.name);
    Ok(session)
}

/// Deactivate every session; returns how many were active
pub async fn deactivate_all_sessions(pool: &SqlitePool) -> Result<u64> {
    let mut conn = pool.acquire().await?;
    let count = clear_active(&mut *conn).await?;
    info!(count, "Deactivated all sessions");
    Ok(count)
}

async fn clear_active(conn: &mut SqliteConnection) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE sessions SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE is_active = 1",
    )
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}
