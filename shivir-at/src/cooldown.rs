//! Cooldown gate
//!
//! A person may not be marked again until `cooldown` has elapsed since their
//! previous marking. The gate only reads; a rejection never touches a ledger.

use chrono::{DateTime, Utc};
use shivir_common::db::Session;
use shivir_common::Result;
use sqlx::{Executor, Sqlite};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::db::attendance;
use crate::settings::CooldownScope;

/// Result of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownCheck {
    pub allowed: bool,
    /// Zero when allowed
    pub wait_remaining: Duration,
}

impl CooldownCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            wait_remaining: Duration::ZERO,
        }
    }

    /// Whole seconds left, rounded up so a caller never retries too early
    pub fn wait_seconds(&self) -> u64 {
        let secs = self.wait_remaining.as_secs();
        if self.wait_remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Pure cooldown arithmetic
///
/// A previous marking in the future (clock skew) counts as zero elapsed.
pub fn evaluate(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: chrono::Duration,
) -> CooldownCheck {
    let Some(last) = last else {
        return CooldownCheck::allowed();
    };

    let elapsed = (now - last).max(chrono::Duration::zero());
    if elapsed >= cooldown {
        return CooldownCheck::allowed();
    }

    CooldownCheck {
        allowed: false,
        wait_remaining: (cooldown - elapsed).to_std().unwrap_or(Duration::ZERO),
    }
}

/// Check whether `person_id` may be marked at `session` now
pub async fn can_mark<'e, E>(
    executor: E,
    person_id: Uuid,
    session: &Session,
    cooldown: chrono::Duration,
    scope: CooldownScope,
    now: DateTime<Utc>,
) -> Result<CooldownCheck>
where
    E: Executor<'e, Database = Sqlite>,
{
    if cooldown <= chrono::Duration::zero() {
        return Ok(CooldownCheck::allowed());
    }

    let last = match scope {
        CooldownScope::Session => {
            attendance::latest_attendance_for_session(executor, person_id, session.id).await?
        }
        CooldownScope::SessionType => {
            attendance::latest_attendance_for_type(executor, person_id, session.session_type)
                .await?
        }
    };

    let check = evaluate(last, now, cooldown);
    debug!(
        person_id = %person_id,
        session_id = %session.id,
        scope = ?scope,
        last = ?last,
        allowed = check.allowed,
        "Cooldown check"
    );
    Ok(check)
}
