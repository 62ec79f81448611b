//! Tests for database initialization and storage-level invariants
//!
//! The uniqueness rules of the attendance ledgers are enforced by the schema
//! itself, so these tests write raw rows and expect constraint violations.

use shivir_common::db::{init_database, CURRENT_SCHEMA_VERSION, DEFAULT_SETTINGS};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("shivir.db")).await.unwrap();
    (dir, pool)
}

async fn insert_person(pool: &SqlitePool, guid: &str, email: &str) {
    sqlx::query("INSERT INTO people (guid, name, email) VALUES (?, ?, ?)")
        .bind(guid)
        .bind("Test Person")
        .bind(email)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_session(pool: &SqlitePool, guid: &str, active: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (guid, session_name, session_type, session_date, is_active) VALUES (?, 'Day', 'MA', '2024-03-10', ?)",
    )
    .bind(guid)
    .bind(active)
    .execute(pool)
    .await
    .map(|_| ())
}

async fn insert_attendance(pool: &SqlitePool, guid: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attendance (guid, person_id, session_id, marked_at) VALUES (?, 'p1', 's1', '2024-03-10T04:00:00+00:00')",
    )
    .bind(guid)
    .execute(pool)
    .await
    .map(|_| ())
}

async fn insert_repeat(pool: &SqlitePool, guid: &str, ordinal: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO repeat_visits
            (guid, person_id, session_type, session_id, visit_date, visited_at,
             previous_completion_date, days_gap, repeat_ordinal)
        VALUES (?, 'p1', 'MA', 's1', '2024-03-20', '2024-03-20T04:00:00+00:00', '2024-03-10', 10, ?)
        "#,
    )
    .bind(guid)
    .bind(ordinal)
    .execute(pool)
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("shivir.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("shivir.db");

    let pool1 = init_database(&db_path).await.unwrap();
    insert_person(&pool1, "00000000-0000-0000-0000-000000000001", "a@example.com").await;
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM people")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing data must survive re-initialization");
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let (_dir, pool) = setup().await;

    for (key, value) in DEFAULT_SETTINGS {
        let stored: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some(*value), "Setting {}", key);
    }
}

#[tokio::test]
async fn test_null_setting_reset_to_default() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("shivir.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'match_reject_threshold'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'match_reject_threshold'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(value.as_deref(), Some("0.6"));
}

#[tokio::test]
async fn test_customized_setting_is_preserved() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("shivir.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '3600' WHERE key = 'attendance_cooldown_seconds'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'attendance_cooldown_seconds'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(value.as_deref(), Some("3600"));
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let (_dir, pool) = setup().await;
    let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_only_one_session_can_be_active() {
    let (_dir, pool) = setup().await;

    insert_session(&pool, "s1", true).await.unwrap();
    insert_session(&pool, "s2", false).await.unwrap();
    let second_active = insert_session(&pool, "s3", true).await;

    let err = second_active.expect_err("second active session must be rejected");
    assert!(err
        .as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false));
}

#[tokio::test]
async fn test_attendance_unique_per_person_and_session() {
    let (_dir, pool) = setup().await;
    insert_person(&pool, "p1", "p1@example.com").await;
    insert_session(&pool, "s1", true).await.unwrap();

    insert_attendance(&pool, "a1").await.unwrap();
    let err = insert_attendance(&pool, "a2")
        .await
        .expect_err("duplicate attendance must be rejected");
    assert!(shivir_common::Error::from(err).is_unique_violation());
}

#[tokio::test]
async fn test_progress_day_number_bounded_by_required_days() {
    let (_dir, pool) = setup().await;
    insert_person(&pool, "p1", "p1@example.com").await;
    insert_session(&pool, "s1", true).await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO session_progress
            (person_id, session_type, session_id, day_number, required_days,
             first_marked_at, last_marked_at)
        VALUES ('p1', 'SSP1', 's1', 3, 2, '2024-03-10T04:00:00+00:00', '2024-03-10T04:00:00+00:00')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "day_number beyond required_days must be rejected");
}

#[tokio::test]
async fn test_repeat_visit_unique_per_day() {
    let (_dir, pool) = setup().await;
    insert_person(&pool, "p1", "p1@example.com").await;
    insert_session(&pool, "s1", true).await.unwrap();

    insert_repeat(&pool, "r1", 1).await.unwrap();
    assert!(
        insert_repeat(&pool, "r2", 2).await.is_err(),
        "second repeat on the same day must be rejected"
    );
}
