//! Identity store
//!
//! Known people with their face embedding, status flags and curriculum level.

use chrono::{DateTime, Utc};
use shivir_common::db::{parse_guid, Candidate, Person};
use shivir_common::{Embedding, Error, Result, SessionType};
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Registration data for a new identity
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub name: String,
    pub email: String,
    pub city: String,
    /// 'M' or 'F'
    pub gender: String,
    pub embedding: Option<Embedding>,
    /// Initial level text for people who progressed before registration
    pub current_level: Option<String>,
}

impl NewPerson {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            city: String::new(),
            gender: "M".to_string(),
            embedding: None,
            current_level: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.current_level = Some(level.into());
        self
    }
}

/// Register a new identity
pub async fn insert_person(pool: &SqlitePool, person: &NewPerson) -> Result<Person> {
    if person.name.trim().is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    if person.email.trim().is_empty() {
        return Err(Error::InvalidInput("Email is required".to_string()));
    }
    let gender = person.gender.trim().to_ascii_uppercase();
    if gender != "M" && gender != "F" {
        return Err(Error::InvalidInput(format!("Gender must be 'M' or 'F', got {:?}", person.gender)));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO people (guid, name, email, city, gender, embedding, current_level)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(person.name.trim())
    .bind(person.email.trim())
    .bind(&person.city)
    .bind(&gender)
    .bind(person.embedding.as_ref().map(Embedding::to_le_bytes))
    .bind(&person.current_level)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::InvalidInput(format!("Email already registered: {}", person.email))
        }
        other => Error::Database(other),
    })?;

    info!(person_id = %id, name = %person.name, "Registered person");

    get_person(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Person {} missing after insert", id)))
}

pub async fn get_person<'e, E>(executor: E, id: Uuid) -> Result<Option<Person>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM people WHERE guid = ?", Person::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(Person::from_row).transpose()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Person>> {
    let sql = format!("SELECT {} FROM people WHERE email = ?", Person::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Person::from_row).transpose()
}

/// Stored embeddings of active, non-blacklisted identities
pub async fn list_candidates(pool: &SqlitePool) -> Result<Vec<Candidate>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, name, embedding FROM people
        WHERE is_active = 1 AND is_blacklisted = 0 AND embedding IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let guid: String = row.try_get("guid")?;
            Ok(Candidate {
                person_id: parse_guid(&guid)?,
                name: row.try_get("name")?,
                embedding_blob: row.try_get("embedding")?,
            })
        })
        .collect()
}

/// Set the curriculum level
pub async fn set_level<'e, E>(executor: E, id: Uuid, level: SessionType) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE people SET current_level = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(level.as_str())
    .bind(id.to_string())
    .execute(executor)
    .await?;

    require_row(result.rows_affected(), id)
}

/// Replace the stored face embedding
pub async fn set_embedding(pool: &SqlitePool, id: Uuid, embedding: &Embedding) -> Result<()> {
    if embedding.is_empty() {
        return Err(Error::InvalidInput("Embedding must not be empty".to_string()));
    }
    let result = sqlx::query(
        "UPDATE people SET embedding = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(embedding.to_le_bytes())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    require_row(result.rows_affected(), id)
}

/// Reactivate; clears the deactivation reason and date
pub async fn activate(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE people
        SET is_active = 1, deactivated_reason = NULL, deactivated_at = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(id.to_string())
    .execute(pool)
    .await?;

    require_row(result.rows_affected(), id)?;
    info!(person_id = %id, "Person activated");
    Ok(())
}

pub async fn deactivate(
    pool: &SqlitePool,
    id: Uuid,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE people
        SET is_active = 0, deactivated_reason = ?, deactivated_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(reason)
    .bind(at)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    require_row(result.rows_affected(), id)?;
    info!(person_id = %id, reason = ?reason, "Person deactivated");
    Ok(())
}

pub async fn blacklist(
    pool: &SqlitePool,
    id: Uuid,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE people
        SET is_blacklisted = 1, blacklisted_reason = ?, blacklisted_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(reason)
    .bind(at)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    require_row(result.rows_affected(), id)?;
    info!(person_id = %id, reason = ?reason, "Person blacklisted");
    Ok(())
}

pub async fn unblacklist(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE people
        SET is_blacklisted = 0, blacklisted_reason = NULL, blacklisted_at = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(id.to_string())
    .execute(pool)
    .await?;

    require_row(result.rows_affected(), id)?;
    info!(person_id = %id, "Person removed from blacklist");
    Ok(())
}

fn require_row(rows_affected: u64, id: Uuid) -> Result<()> {
    if rows_affected == 0 {
        Err(Error::NotFound(format!("Person {}", id)))
    } else {
        Ok(())
    }
}

/// Stamp `updated_at`; run first in a ledger transaction to take the write lock
pub async fn touch(conn: &mut sqlx::SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE people SET updated_at = CURRENT_TIMESTAMP WHERE guid = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
