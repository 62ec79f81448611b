//! Attendance engine
//!
//! One recognition event flows through:
//!
//! 1. Face matcher (probe path only)
//! 2. Status gate
//! 3. Active session check
//! 4. Eligibility
//! 5. Cooldown gate
//! 6. Ledger / repeater, in one transaction
//!
//! Every path ends in exactly one [`Outcome`], which is also broadcast on the
//! [`EventBus`]. Rejections before step 6 never write.

use chrono::{DateTime, Utc};
use shivir_common::db::{Person, Session};
use shivir_common::events::{EventBus, ShivirEvent};
use shivir_common::time;
use shivir_common::{Embedding, Error, Outcome, Result, SessionType};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cooldown;
use crate::db::people;
use crate::ledger::{self, LevelChange};
use crate::matcher::{self, MatchVerdict};
use crate::progression::{self, Eligibility};
use crate::settings::EngineConfig;

/// Status gate; `None` when the person may proceed
pub fn status_gate(person: &Person) -> Option<Outcome> {
    match (person.is_active, person.is_blacklisted) {
        (false, true) => Some(Outcome::InactiveAndBlacklisted),
        (false, false) => Some(Outcome::Inactive),
        (true, true) => Some(Outcome::Blacklisted),
        (true, false) => None,
    }
}

/// Attendance engine
///
/// The active session is always passed in by the caller.
pub struct AttendanceEngine {
    pool: SqlitePool,
    config: EngineConfig,
    events: Arc<EventBus>,
    /// Serializes marks of the same person within this process
    person_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl AttendanceEngine {
    pub fn new(pool: SqlitePool, config: EngineConfig, events: Arc<EventBus>) -> Self {
        Self {
            pool,
            config,
            events,
            person_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Mark attendance from a face probe
    pub async fn mark_face(&self, probe: &Embedding, active: Option<&Session>) -> Result<Outcome> {
        self.mark_face_at(probe, active, time::now()).await
    }

    pub async fn mark_face_at(
        &self,
        probe: &Embedding,
        active: Option<&Session>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let verdict = self.match_face(probe).await?;

        let Some(person_id) = verdict.accepted() else {
            if let MatchVerdict::Ambiguous { person_id, distance } = verdict {
                info!(person_id = %person_id, distance, "Ambiguous match not attributed");
            }
            return Ok(self.finish(Outcome::UnknownFace, None, active, now));
        };

        match people::get_person(&self.pool, person_id).await? {
            Some(person) => self.evaluate(&person, active, now).await,
            None => {
                // Removed between candidate listing and lookup
                warn!(person_id = %person_id, "Matched identity no longer exists");
                Ok(self.finish(Outcome::UnknownFace, None, active, now))
            }
        }
    }

    /// Mark attendance for an already-identified person
    pub async fn mark_person(&self, person_id: Uuid, active: Option<&Session>) -> Result<Outcome> {
        self.mark_person_at(person_id, active, time::now()).await
    }

    pub async fn mark_person_at(
        &self,
        person_id: Uuid,
        active: Option<&Session>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let person = people::get_person(&self.pool, person_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Person {}", person_id)))?;

        self.evaluate(&person, active, now).await
    }

    /// Mark attendance for the person registered under `email`
    pub async fn mark_email(&self, email: &str, active: Option<&Session>) -> Result<Outcome> {
        let person = people::find_by_email(&self.pool, email)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No person with email {}", email)))?;

        self.evaluate(&person, active, time::now()).await
    }

    async fn match_face(&self, probe: &Embedding) -> Result<MatchVerdict> {
        let candidates = people::list_candidates(&self.pool).await?;
        let probe = probe.clone();
        let thresholds = self.config.thresholds;

        tokio::task::spawn_blocking(move || matcher::match_probe(&probe, &candidates, &thresholds))
            .await
            .map_err(|e| Error::Internal(format!("Matcher task failed: {}", e)))
    }

    async fn evaluate(
        &self,
        person: &Person,
        active: Option<&Session>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        if let Some(outcome) = status_gate(person) {
            info!(person_id = %person.id, name = %person.name, outcome = outcome.code(), "Status gate rejected");
            return Ok(self.finish(outcome, Some(person), active, now));
        }

        let Some(session) = active.filter(|s| s.is_active) else {
            info!(person_id = %person.id, "No active session");
            return Ok(self.finish(Outcome::NoActiveSession, Some(person), None, now));
        };

        let level = person.level();
        match progression::check(level, session.session_type) {
            Eligibility::Eligible => {}
            rejected => {
                let outcome = match rejected {
                    Eligibility::NewUserMustStart => Outcome::NewUserMustStart,
                    _ => Outcome::NotEligible,
                };
                info!(
                    person_id = %person.id,
                    level = ?level,
                    session_type = %session.session_type,
                    outcome = outcome.code(),
                    "Not eligible"
                );
                return Ok(self.finish(outcome, Some(person), Some(session), now));
            }
        }

        let lock = self.person_lock(person.id);
        let result = {
            let _guard = lock.lock().await;
            self.record_locked(person, session, now).await
        };
        drop(lock);
        self.release_person_lock(person.id);

        let outcome = result?;
        Ok(self.finish(outcome, Some(person), Some(session), now))
    }

    /// Cooldown gate and ledger step; caller holds the person's lock
    async fn record_locked(&self, person: &Person, session: &Session, now: DateTime<Utc>) -> Result<Outcome> {
        let check = cooldown::can_mark(
            &self.pool,
            person.id,
            session,
            self.config.cooldown,
            self.config.cooldown_scope,
            now,
        )
        .await?;
        if !check.allowed {
            info!(person_id = %person.id, wait_seconds = check.wait_seconds(), "Cooldown active");
            return Ok(Outcome::CooldownActive {
                wait_seconds: check.wait_seconds(),
            });
        }

        let mut tx = self.pool.begin().await?;
        people::touch(&mut *tx, person.id).await?;

        let result = ledger::record(&mut *tx, person.id, session, now, self.config.calendar_offset).await?;

        if result.outcome.is_marked() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        if let Some(change) = result.level_change {
            self.publish_level_change(person.id, change, now);
        }

        Ok(result.outcome)
    }

    fn person_lock(&self, person_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .person_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(person_id).or_default().clone()
    }

    /// Drop the person's lock entry once no marking holds or awaits it
    fn release_person_lock(&self, person_id: Uuid) {
        let mut locks = self
            .person_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(&person_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&person_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.person_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn publish_level_change(&self, person_id: Uuid, change: LevelChange, now: DateTime<Utc>) {
        self.events.emit_lossy(ShivirEvent::LevelAdvanced {
            person_id,
            previous_level: change.previous,
            new_level: change.new,
            timestamp: now,
        });
    }

    /// Log and broadcast the final outcome
    fn finish(
        &self,
        outcome: Outcome,
        person: Option<&Person>,
        session: Option<&Session>,
        now: DateTime<Utc>,
    ) -> Outcome {
        let session_type: Option<SessionType> = session.map(|s| s.session_type);
        debug!(
            outcome = outcome.code(),
            person_id = ?person.map(|p| p.id),
            session_type = ?session_type,
            "Attendance outcome"
        );

        self.events.emit_lossy(ShivirEvent::AttendanceOutcome {
            outcome: outcome.clone(),
            person_id: person.map(|p| p.id),
            person_name: person.map(|p| p.name.clone()),
            gender: person.map(|p| p.gender.clone()),
            session_type,
            timestamp: now,
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(is_active: bool, is_blacklisted: bool) -> Person {
        Person {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            city: String::new(),
            gender: "F".to_string(),
            is_active,
            deactivated_reason: None,
            deactivated_at: None,
            is_blacklisted,
            blacklisted_reason: None,
            blacklisted_at: None,
            current_level: None,
        }
    }

    #[test]
    fn test_status_gate() {
        assert_eq!(status_gate(&person(true, false)), None);
        assert_eq!(status_gate(&person(false, false)), Some(Outcome::Inactive));
        assert_eq!(status_gate(&person(true, true)), Some(Outcome::Blacklisted));
        assert_eq!(
            status_gate(&person(false, true)),
            Some(Outcome::InactiveAndBlacklisted)
        );
    }

    #[tokio::test]
    async fn test_person_locks_are_released_after_marking() {
        use crate::db::people::NewPerson;
        use crate::db::sessions::{self, NewSession};
        use chrono::TimeZone;

        let dir = tempfile::TempDir::new().unwrap();
        let pool = shivir_common::db::init_database(&dir.path().join("shivir.db"))
            .await
            .unwrap();
        let engine = AttendanceEngine::new(pool.clone(), EngineConfig::default(), Arc::new(EventBus::new(16)));

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap();
        let session = sessions::create_session(
            &pool,
            &NewSession::new("MA", SessionType::Ma, now.date_naive()),
            true,
        )
        .await
        .unwrap();

        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            let person = people::insert_person(&pool, &NewPerson::new("Seeker", email))
                .await
                .unwrap();
            let outcome = engine.mark_person_at(person.id, Some(&session), now).await.unwrap();
            assert!(outcome.is_marked());
        }

        assert_eq!(engine.tracked_locks(), 0);
    }
}
