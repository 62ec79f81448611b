//! Outcome vocabulary emitted by the attendance engine
//!
//! Every recognition event ends in exactly one of these. Callers map them to
//! UI/voice messages; the engine never formats human-facing text.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified result of one attendance attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// No candidate within the confidence band (includes ambiguous matches)
    UnknownFace,
    Inactive,
    Blacklisted,
    InactiveAndBlacklisted,
    /// Session type is outside the person's eligible set
    NotEligible,
    /// Person without a level tried a type other than MA
    NewUserMustStart,
    NoActiveSession,
    /// Marked too recently; retry after the wait
    CooldownActive { wait_seconds: u64 },
    /// Progress advanced but the type is not finished yet
    DayAdvanced { day: u32, required: u32 },
    /// Progress reached the required day count on this call
    CompletedSession,
    /// Type already finished and this is not a new repeat visit
    AlreadyCompleteToday,
    /// Attendance of an already-completed type on a new day
    RepeatWelcome { days_gap: i64, ordinal: u32 },
    RepeatAlreadyMarkedToday,
    /// Already marked for this session type today, or lost a concurrent write
    DuplicateRecord,
}

impl Outcome {
    /// Stable outcome code ("DAY_ADVANCED", ...)
    pub fn code(&self) -> &'static str {
        match self {
            Outcome::UnknownFace => "UNKNOWN_FACE",
            Outcome::Inactive => "INACTIVE",
            Outcome::Blacklisted => "BLACKLISTED",
            Outcome::InactiveAndBlacklisted => "INACTIVE_AND_BLACKLISTED",
            Outcome::NotEligible => "NOT_ELIGIBLE",
            Outcome::NewUserMustStart => "NEW_USER_MUST_START",
            Outcome::NoActiveSession => "NO_ACTIVE_SESSION",
            Outcome::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            Outcome::DayAdvanced { .. } => "DAY_ADVANCED",
            Outcome::CompletedSession => "COMPLETED_SESSION",
            Outcome::AlreadyCompleteToday => "ALREADY_COMPLETE_TODAY",
            Outcome::RepeatWelcome { .. } => "REPEAT_WELCOME",
            Outcome::RepeatAlreadyMarkedToday => "REPEAT_ALREADY_MARKED_TODAY",
            Outcome::DuplicateRecord => "DUPLICATE_RECORD",
        }
    }

    /// True when this call wrote a new attendance fact
    pub fn is_marked(&self) -> bool {
        matches!(
            self,
            Outcome::DayAdvanced { .. } | Outcome::CompletedSession | Outcome::RepeatWelcome { .. }
        )
    }

    /// Remaining cooldown, if this is a cooldown rejection
    pub fn wait(&self) -> Option<Duration> {
        match self {
            Outcome::CooldownActive { wait_seconds } => Some(Duration::from_secs(*wait_seconds)),
            _ => None,
        }
    }
}
