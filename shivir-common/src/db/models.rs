//! Database models
//!
//! Row types for the identity store, session registry and the three
//! attendance ledgers. Identifiers are stored as TEXT guids.

use crate::model::SessionType;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Parse a stored TEXT guid
pub fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid guid {:?}: {}", value, e)))
}

fn parse_session_type(value: &str) -> Result<SessionType> {
    value
        .parse()
        .map_err(|_| Error::Internal(format!("Invalid stored session type: {:?}", value)))
}

/// Known identity (embedding is loaded separately)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub city: String,
    /// 'M' or 'F'
    pub gender: String,
    pub is_active: bool,
    pub deactivated_reason: Option<String>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub is_blacklisted: bool,
    pub blacklisted_reason: Option<String>,
    pub blacklisted_at: Option<DateTime<Utc>>,
    /// Free text as stored; see [`Person::level`]
    pub current_level: Option<String>,
}

impl Person {
    pub const COLUMNS: &'static str = "guid, name, email, city, gender, is_active, \
        deactivated_reason, deactivated_at, is_blacklisted, blacklisted_reason, \
        blacklisted_at, current_level";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        Ok(Self {
            id: parse_guid(&guid)?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            city: row.try_get("city")?,
            gender: row.try_get("gender")?,
            is_active: row.try_get("is_active")?,
            deactivated_reason: row.try_get("deactivated_reason")?,
            deactivated_at: row.try_get("deactivated_at")?,
            is_blacklisted: row.try_get("is_blacklisted")?,
            blacklisted_reason: row.try_get("blacklisted_reason")?,
            blacklisted_at: row.try_get("blacklisted_at")?,
            current_level: row.try_get("current_level")?,
        })
    }

    /// Parsed curriculum level; unrecognized text is a new user
    pub fn level(&self) -> Option<SessionType> {
        SessionType::parse_level(self.current_level.as_deref())
    }
}

/// Stored face embedding of an active, non-blacklisted identity
///
/// Kept as raw bytes so that one corrupt row cannot fail the whole match pass.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub person_id: Uuid,
    pub name: String,
    pub embedding_blob: Vec<u8>,
}

/// Conducted session (one per day of a multi-day shivir)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub session_type: SessionType,
    pub session_date: NaiveDate,
    pub conducted_by: String,
    pub is_active: bool,
}

impl Session {
    pub const COLUMNS: &'static str =
        "guid, session_name, session_type, session_date, conducted_by, is_active";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let session_type: String = row.try_get("session_type")?;
        Ok(Self {
            id: parse_guid(&guid)?,
            name: row.try_get("session_name")?,
            session_type: parse_session_type(&session_type)?,
            session_date: row.try_get("session_date")?,
            conducted_by: row.try_get("conducted_by")?,
            is_active: row.try_get("is_active")?,
        })
    }

    pub fn required_days(&self) -> u32 {
        self.session_type.required_days()
    }
}

/// General ledger entry, unique per (person, session)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub person_id: Uuid,
    pub session_id: Uuid,
    pub marked_at: DateTime<Utc>,
    /// False when added manually by an administrator
    pub marked_by_system: bool,
}

impl AttendanceRecord {
    pub const COLUMNS: &'static str = "guid, person_id, session_id, marked_at, marked_by_system";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let person_id: String = row.try_get("person_id")?;
        let session_id: String = row.try_get("session_id")?;
        Ok(Self {
            id: parse_guid(&guid)?,
            person_id: parse_guid(&person_id)?,
            session_id: parse_guid(&session_id)?,
            marked_at: row.try_get("marked_at")?,
            marked_by_system: row.try_get("marked_by_system")?,
        })
    }
}

/// Day counter for one (person, session type)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionProgress {
    pub person_id: Uuid,
    pub session_type: SessionType,
    /// Session instance that last advanced the counter
    pub session_id: Uuid,
    pub day_number: u32,
    pub required_days: u32,
    pub completed: bool,
    pub first_marked_at: DateTime<Utc>,
    pub last_marked_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionProgress {
    pub const COLUMNS: &'static str = "person_id, session_type, session_id, day_number, \
        required_days, completed, first_marked_at, last_marked_at, completed_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let person_id: String = row.try_get("person_id")?;
        let session_type: String = row.try_get("session_type")?;
        let session_id: String = row.try_get("session_id")?;
        let day_number: i64 = row.try_get("day_number")?;
        let required_days: i64 = row.try_get("required_days")?;
        Ok(Self {
            person_id: parse_guid(&person_id)?,
            session_type: parse_session_type(&session_type)?,
            session_id: parse_guid(&session_id)?,
            day_number: day_number as u32,
            required_days: required_days as u32,
            completed: row.try_get("completed")?,
            first_marked_at: row.try_get("first_marked_at")?,
            last_marked_at: row.try_get("last_marked_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// Attendance of an already-completed session type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepeatVisit {
    pub id: Uuid,
    pub person_id: Uuid,
    pub session_type: SessionType,
    pub session_id: Uuid,
    pub visit_date: NaiveDate,
    pub visited_at: DateTime<Utc>,
    pub previous_completion_date: NaiveDate,
    /// Days since the previous repeat visit, or since completion for the first
    pub days_gap: i64,
    /// 1-based count of repeats for this person and type
    pub repeat_ordinal: u32,
}

impl RepeatVisit {
    pub const COLUMNS: &'static str = "guid, person_id, session_type, session_id, visit_date, \
        visited_at, previous_completion_date, days_gap, repeat_ordinal";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let person_id: String = row.try_get("person_id")?;
        let session_type: String = row.try_get("session_type")?;
        let session_id: String = row.try_get("session_id")?;
        let repeat_ordinal: i64 = row.try_get("repeat_ordinal")?;
        Ok(Self {
            id: parse_guid(&guid)?,
            person_id: parse_guid(&person_id)?,
            session_type: parse_session_type(&session_type)?,
            session_id: parse_guid(&session_id)?,
            visit_date: row.try_get("visit_date")?,
            visited_at: row.try_get("visited_at")?,
            previous_completion_date: row.try_get("previous_completion_date")?,
            days_gap: row.try_get("days_gap")?,
            repeat_ordinal: repeat_ordinal as u32,
        })
    }
}
