//! Database initialization
//!
//! Creates the database on first run and the schema idempotently on every
//! start. The uniqueness invariants of the attendance ledgers live here as
//! storage constraints, so racing writers get a constraint violation instead
//! of a second row.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Current schema version recorded in `schema_version`
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Default engine settings (key, value)
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("match_reject_threshold", "0.6"),
    ("match_confidence_threshold", "0.55"),
    ("attendance_cooldown_seconds", "43200"), // 12 hours
    ("cooldown_scope", "session"),
    ("calendar_utc_offset_minutes", "330"), // IST
    ("event_bus_capacity", "100"),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Applied to every pooled connection: WAL allows concurrent readers with
    // one writer (multiple camera feeds), busy_timeout absorbs short lock waits
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_people_table(pool).await?;
    create_sessions_table(pool).await?;
    create_attendance_table(pool).await?;
    create_session_progress_table(pool).await?;
    create_repeat_visits_table(pool).await?;

    record_schema_version(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    match version {
        None => {
            sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
                .bind(CURRENT_SCHEMA_VERSION)
                .execute(pool)
                .await?;
        }
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            warn!(
                "Database schema version ({}) is newer than code version ({})",
                v, CURRENT_SCHEMA_VERSION
            );
        }
        Some(_) => {}
    }

    Ok(())
}

/// Create the settings table
///
/// Stores runtime engine parameters as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Missing settings are created; NULL values are reset to the default.
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }
    Ok(())
}

/// Ensure a setting exists with the specified default value
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            // INSERT OR IGNORE: another process may initialize concurrently
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;

            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;

            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Create the people table (identity store)
pub async fn create_people_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS people (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            city TEXT NOT NULL DEFAULT '',
            gender TEXT NOT NULL DEFAULT 'M' CHECK (gender IN ('M', 'F')),
            embedding BLOB,
            is_active INTEGER NOT NULL DEFAULT 1,
            deactivated_reason TEXT,
            deactivated_at TIMESTAMP,
            is_blacklisted INTEGER NOT NULL DEFAULT 0,
            blacklisted_reason TEXT,
            blacklisted_at TIMESTAMP,
            current_level TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_people_candidates ON people(is_active, is_blacklisted)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sessions table (session registry)
///
/// The partial unique index admits at most one row with `is_active = 1`.
pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            guid TEXT PRIMARY KEY,
            session_name TEXT NOT NULL,
            session_type TEXT NOT NULL CHECK (session_type IN ('MA', 'SSP1', 'SSP2', 'HS1', 'HS2', 'FESTIVAL')),
            session_date DATE NOT NULL,
            conducted_by TEXT NOT NULL DEFAULT 'Sirshree',
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_single_active ON sessions(is_active) WHERE is_active = 1",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(session_date)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the general attendance ledger
pub async fn create_attendance_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            guid TEXT PRIMARY KEY,
            person_id TEXT NOT NULL REFERENCES people(guid) ON DELETE CASCADE,
            session_id TEXT NOT NULL REFERENCES sessions(guid) ON DELETE CASCADE,
            marked_at TIMESTAMP NOT NULL,
            marked_by_system INTEGER NOT NULL DEFAULT 1,
            UNIQUE (person_id, session_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_person_time ON attendance(person_id, marked_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_attendance_marked_at ON attendance(marked_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the per-type progress ledger
pub async fn create_session_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_progress (
            person_id TEXT NOT NULL REFERENCES people(guid) ON DELETE CASCADE,
            session_type TEXT NOT NULL CHECK (session_type IN ('MA', 'SSP1', 'SSP2', 'HS1', 'HS2', 'FESTIVAL')),
            session_id TEXT NOT NULL REFERENCES sessions(guid),
            day_number INTEGER NOT NULL,
            required_days INTEGER NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            first_marked_at TIMESTAMP NOT NULL,
            last_marked_at TIMESTAMP NOT NULL,
            completed_at TIMESTAMP,
            PRIMARY KEY (person_id, session_type),
            CHECK (required_days >= 1),
            CHECK (day_number >= 1 AND day_number <= required_days),
            CHECK (completed = 0 OR day_number = required_days)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the repeat visit ledger
pub async fn create_repeat_visits_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repeat_visits (
            guid TEXT PRIMARY KEY,
            person_id TEXT NOT NULL REFERENCES people(guid) ON DELETE CASCADE,
            session_type TEXT NOT NULL CHECK (session_type IN ('MA', 'SSP1', 'SSP2', 'HS1', 'HS2', 'FESTIVAL')),
            session_id TEXT NOT NULL REFERENCES sessions(guid),
            visit_date DATE NOT NULL,
            visited_at TIMESTAMP NOT NULL,
            previous_completion_date DATE NOT NULL,
            days_gap INTEGER NOT NULL,
            repeat_ordinal INTEGER NOT NULL CHECK (repeat_ordinal >= 1),
            UNIQUE (person_id, session_type, visit_date),
            UNIQUE (person_id, session_type, repeat_ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
