//! Engine parameters stored in the `settings` table
//!
//! Defaults are written by `shivir_common::db::init_default_settings`.
//! Unparseable values fall back to the compiled default with a warning;
//! inconsistent thresholds are a configuration error.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use shivir_common::time::{offset_from_minutes, DEFAULT_UTC_OFFSET_MINUTES};
use shivir_common::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

use crate::matcher::MatchThresholds;

pub const KEY_REJECT_THRESHOLD: &str = "match_reject_threshold";
pub const KEY_CONFIDENCE_THRESHOLD: &str = "match_confidence_threshold";
pub const KEY_COOLDOWN_SECONDS: &str = "attendance_cooldown_seconds";
pub const KEY_COOLDOWN_SCOPE: &str = "cooldown_scope";
pub const KEY_UTC_OFFSET_MINUTES: &str = "calendar_utc_offset_minutes";
pub const KEY_EVENT_BUS_CAPACITY: &str = "event_bus_capacity";

/// Which earlier attendance the cooldown is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// Latest record for the same person and session instance
    Session,
    /// Latest record for the same person in any session of the same type
    SessionType,
}

impl FromStr for CooldownScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "session" => Ok(CooldownScope::Session),
            "session_type" => Ok(CooldownScope::SessionType),
            other => Err(Error::InvalidInput(format!("Unknown cooldown scope: {:?}", other))),
        }
    }
}

/// Runtime configuration of the attendance engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thresholds: MatchThresholds,
    /// Minimum time between two markings; zero disables the gate
    pub cooldown: chrono::Duration,
    pub cooldown_scope: CooldownScope,
    /// Offset defining calendar days for repeat visits and statistics
    pub calendar_offset: FixedOffset,
    pub event_bus_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: MatchThresholds::default(),
            cooldown: chrono::Duration::hours(12),
            cooldown_scope: CooldownScope::Session,
            calendar_offset: offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES),
            event_bus_capacity: 100,
        }
    }
}

impl EngineConfig {
    pub fn with_cooldown(mut self, cooldown: chrono::Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_cooldown_scope(mut self, scope: CooldownScope) -> Self {
        self.cooldown_scope = scope;
        self
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_calendar_offset(mut self, offset: FixedOffset) -> Self {
        self.calendar_offset = offset;
        self
    }
}

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Write (insert or replace) a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

async fn parsed_or<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = get_setting(pool, key).await? else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) => Ok(value),
        Err(_) => {
            warn!(key, value = %raw, "Unparseable setting, using default {:?}", default);
            Ok(default)
        }
    }
}

/// Load the engine configuration from the settings table
pub async fn load_engine_config(pool: &SqlitePool) -> Result<EngineConfig> {
    let defaults = EngineConfig::default();

    let reject = parsed_or(pool, KEY_REJECT_THRESHOLD, defaults.thresholds.reject()).await?;
    let confidence =
        parsed_or(pool, KEY_CONFIDENCE_THRESHOLD, defaults.thresholds.confidence()).await?;
    let thresholds = MatchThresholds::new(reject, confidence)?;

    let cooldown_seconds: i64 = parsed_or(pool, KEY_COOLDOWN_SECONDS, 43_200i64).await?;
    if cooldown_seconds < 0 {
        return Err(Error::Config(format!(
            "{} must be >= 0, got {}",
            KEY_COOLDOWN_SECONDS, cooldown_seconds
        )));
    }

    let cooldown_scope = parsed_or(pool, KEY_COOLDOWN_SCOPE, defaults.cooldown_scope).await?;
    let offset_minutes: i32 =
        parsed_or(pool, KEY_UTC_OFFSET_MINUTES, DEFAULT_UTC_OFFSET_MINUTES).await?;
    let event_bus_capacity: usize =
        parsed_or(pool, KEY_EVENT_BUS_CAPACITY, defaults.event_bus_capacity).await?;

    Ok(EngineConfig {
        thresholds,
        cooldown: chrono::Duration::seconds(cooldown_seconds),
        cooldown_scope,
        calendar_offset: offset_from_minutes(offset_minutes),
        event_bus_capacity,
    })
}
