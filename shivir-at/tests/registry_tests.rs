//! Tests for identity/session administration and stored engine settings

use chrono::{NaiveDate, TimeZone, Utc};
use shivir_at::db::people::{self, NewPerson};
use shivir_at::db::sessions::{self, NewSession};
use shivir_at::settings::{
    load_engine_config, set_setting, CooldownScope, KEY_CONFIDENCE_THRESHOLD,
    KEY_COOLDOWN_SCOPE, KEY_COOLDOWN_SECONDS, KEY_REJECT_THRESHOLD, KEY_UTC_OFFSET_MINUTES,
};
use shivir_common::db::init_database;
use shivir_common::{Embedding, Error, SessionType};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("shivir.db")).await.unwrap();
    (dir, pool)
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

// ----- Settings -----

#[tokio::test]
async fn test_default_engine_config_from_fresh_database() {
    let (_dir, pool) = setup().await;
    let config = load_engine_config(&pool).await.unwrap();

    assert_eq!(config.thresholds.reject(), 0.6);
    assert_eq!(config.thresholds.confidence(), 0.55);
    assert_eq!(config.cooldown, chrono::Duration::hours(12));
    assert_eq!(config.cooldown_scope, CooldownScope::Session);
    assert_eq!(config.calendar_offset.local_minus_utc(), 330 * 60);
    assert_eq!(config.event_bus_capacity, 100);
}

#[tokio::test]
async fn test_custom_settings_are_loaded() {
    let (_dir, pool) = setup().await;
    set_setting(&pool, KEY_COOLDOWN_SECONDS, "0").await.unwrap();
    set_setting(&pool, KEY_COOLDOWN_SCOPE, "session_type").await.unwrap();
    set_setting(&pool, KEY_UTC_OFFSET_MINUTES, "0").await.unwrap();
    set_setting(&pool, KEY_REJECT_THRESHOLD, "0.5").await.unwrap();
    set_setting(&pool, KEY_CONFIDENCE_THRESHOLD, "0.45").await.unwrap();

    let config = load_engine_config(&pool).await.unwrap();
    assert_eq!(config.cooldown, chrono::Duration::zero());
    assert_eq!(config.cooldown_scope, CooldownScope::SessionType);
    assert_eq!(config.calendar_offset.local_minus_utc(), 0);
    assert_eq!(config.thresholds.reject(), 0.5);
    assert_eq!(config.thresholds.confidence(), 0.45);
}

#[tokio::test]
async fn test_unparseable_setting_falls_back_to_default() {
    let (_dir, pool) = setup().await;
    set_setting(&pool, KEY_COOLDOWN_SECONDS, "twelve hours").await.unwrap();
    set_setting(&pool, KEY_COOLDOWN_SCOPE, "weekly").await.unwrap();

    let config = load_engine_config(&pool).await.unwrap();
    assert_eq!(config.cooldown, chrono::Duration::hours(12));
    assert_eq!(config.cooldown_scope, CooldownScope::Session);
}

#[tokio::test]
async fn test_inconsistent_thresholds_are_rejected() {
    let (_dir, pool) = setup().await;
    set_setting(&pool, KEY_CONFIDENCE_THRESHOLD, "0.7").await.unwrap();

    let result = load_engine_config(&pool).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_negative_cooldown_is_rejected() {
    let (_dir, pool) = setup().await;
    set_setting(&pool, KEY_COOLDOWN_SECONDS, "-5").await.unwrap();

    let result = load_engine_config(&pool).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

// ----- Identity store -----

#[tokio::test]
async fn test_register_and_lookup_person() {
    let (_dir, pool) = setup().await;
    let person = people::insert_person(
        &pool,
        &NewPerson::new("Asha", "asha@example.com")
            .with_city("Pune")
            .with_gender("f")
            .with_embedding(Embedding::new(vec![0.1, 0.2])),
    )
    .await
    .unwrap();

    assert_eq!(person.gender, "F");
    assert!(person.is_active);
    assert!(!person.is_blacklisted);
    assert_eq!(person.level(), None);

    let found = people::find_by_email(&pool, "asha@example.com").await.unwrap().unwrap();
    assert_eq!(found.id, person.id);

    let candidates = people::list_candidates(&pool).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(
        Embedding::from_le_bytes(&candidates[0].embedding_blob).unwrap(),
        Embedding::new(vec![0.1, 0.2])
    );
}

#[tokio::test]
async fn test_duplicate_email_is_invalid_input() {
    let (_dir, pool) = setup().await;
    people::insert_person(&pool, &NewPerson::new("A", "same@example.com")).await.unwrap();
    let result = people::insert_person(&pool, &NewPerson::new("B", "same@example.com")).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_invalid_registration_rejected() {
    let (_dir, pool) = setup().await;
    let no_name = people::insert_person(&pool, &NewPerson::new(" ", "x@example.com")).await;
    assert!(matches!(no_name, Err(Error::InvalidInput(_))));

    let bad_gender =
        people::insert_person(&pool, &NewPerson::new("X", "x@example.com").with_gender("Q")).await;
    assert!(matches!(bad_gender, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_deactivate_and_activate_track_reason() {
    let (_dir, pool) = setup().await;
    let person = people::insert_person(&pool, &NewPerson::new("Ravi", "ravi@example.com"))
        .await
        .unwrap();
    let when = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();

    people::deactivate(&pool, person.id, Some("relocated"), when).await.unwrap();
    let stored = people::get_person(&pool, person.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.deactivated_reason.as_deref(), Some("relocated"));
    assert_eq!(stored.deactivated_at, Some(when));

    people::activate(&pool, person.id).await.unwrap();
    let stored = people::get_person(&pool, person.id).await.unwrap().unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.deactivated_reason, None);
    assert_eq!(stored.deactivated_at, None);
}

#[tokio::test]
async fn test_blacklist_and_unblacklist() {
    let (_dir, pool) = setup().await;
    let person = people::insert_person(
        &pool,
        &NewPerson::new("Om", "om@example.com").with_embedding(Embedding::new(vec![1.0])),
    )
    .await
    .unwrap();
    let when = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();

    people::blacklist(&pool, person.id, Some("misconduct"), when).await.unwrap();
    let stored = people::get_person(&pool, person.id).await.unwrap().unwrap();
    assert!(stored.is_blacklisted);
    assert_eq!(stored.blacklisted_reason.as_deref(), Some("misconduct"));
    assert!(people::list_candidates(&pool).await.unwrap().is_empty());

    people::unblacklist(&pool, person.id).await.unwrap();
    let stored = people::get_person(&pool, person.id).await.unwrap().unwrap();
    assert!(!stored.is_blacklisted);
    assert_eq!(stored.blacklisted_at, None);
    assert_eq!(people::list_candidates(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_on_missing_person_is_not_found() {
    let (_dir, pool) = setup().await;
    let result = people::activate(&pool, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_set_embedding_replaces_candidate() {
    let (_dir, pool) = setup().await;
    let person = people::insert_person(&pool, &NewPerson::new("Uma", "uma@example.com"))
        .await
        .unwrap();
    assert!(people::list_candidates(&pool).await.unwrap().is_empty());

    people::set_embedding(&pool, person.id, &Embedding::new(vec![0.5, 0.5]))
        .await
        .unwrap();
    assert_eq!(people::list_candidates(&pool).await.unwrap().len(), 1);
}

// ----- Session registry -----

#[tokio::test]
async fn test_create_session_defaults() {
    let (_dir, pool) = setup().await;
    let session = sessions::create_session(
        &pool,
        &NewSession::new("MA Pune", SessionType::Ma, date(1)),
        false,
    )
    .await
    .unwrap();

    assert_eq!(session.conducted_by, "Sirshree");
    assert_eq!(session.session_date, date(1));
    assert_eq!(session.required_days(), 5);
    assert!(!session.is_active);
    assert!(sessions::get_active_session(&pool).await.unwrap().is_none());
}

#[tokio::test]
async fn test_activating_a_session_deactivates_the_others() {
    let (_dir, pool) = setup().await;
    let first = sessions::create_session(&pool, &NewSession::new("One", SessionType::Ma, date(1)), true)
        .await
        .unwrap();
    let second = sessions::create_session(&pool, &NewSession::new("Two", SessionType::Ssp1, date(2)), true)
        .await
        .unwrap();

    let active = sessions::get_active_session(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, second.id);

    sessions::activate_session(&pool, first.id).await.unwrap();
    let active = sessions::get_active_session(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, first.id);

    let all = sessions::list_sessions(&pool).await.unwrap();
    assert_eq!(all.iter().filter(|s| s.is_active).count(), 1);
}

#[tokio::test]
async fn test_activating_missing_session_keeps_current_active() {
    let (_dir, pool) = setup().await;
    let current = sessions::create_session(&pool, &NewSession::new("One", SessionType::Ma, date(1)), true)
        .await
        .unwrap();

    let result = sessions::activate_session(&pool, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    let active = sessions::get_active_session(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, current.id);
}

#[tokio::test]
async fn test_deactivate_all_sessions() {
    let (_dir, pool) = setup().await;
    sessions::create_session(&pool, &NewSession::new("One", SessionType::Festival, date(1)), true)
        .await
        .unwrap();

    assert_eq!(sessions::deactivate_all_sessions(&pool).await.unwrap(), 1);
    assert!(sessions::get_active_session(&pool).await.unwrap().is_none());
    assert_eq!(sessions::deactivate_all_sessions(&pool).await.unwrap(), 0);
}
