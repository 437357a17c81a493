//! User identity rows.

use regex::Regex;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::types::SubscriptionTier;
use crate::error::Result;

use super::is_unique_violation;

/// Identity record. Rows are never physically deleted by this crate;
/// archival belongs to the surrounding service.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub tier: SubscriptionTier,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub tier: SubscriptionTier,
}

/// Outcome when attempting to create a user.
#[derive(Debug)]
pub enum InsertUserOutcome {
    Created(Uuid),
    EmailTaken,
    InvalidEmail,
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Insert a new user, reporting email conflicts as an outcome.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn insert_user(pool: &PgPool, new_user: &NewUser) -> Result<InsertUserOutcome> {
    let email = normalize_email(&new_user.email);
    if !valid_email(&email) {
        return Ok(InsertUserOutcome::InvalidEmail);
    }
    let query = r"
        INSERT INTO users (email, username, password_hash, tier)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(new_user.tier.as_str())
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertUserOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::EmailTaken),
        Err(err) => Err(err.into()),
    }
}

/// Look up a user by id.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let query = r"
        SELECT id, email, username, password_hash, tier, created_at, updated_at
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(user_from_row))
}

/// Look up a user by email (normalized before the query).
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = r"
        SELECT id, email, username, password_hash, tier, created_at, updated_at
        FROM users
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(user_from_row))
}

/// Cheap existence probe used on the session-token path: a deleted user
/// must not pass even with a valid, unexpired token.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn user_exists(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let query = "SELECT 1 FROM users WHERE id = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.is_some())
}

fn user_from_row(row: sqlx::postgres::PgRow) -> User {
    let tier: String = row.get("tier");
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        // Unknown tier text means the row predates this binary; treat it as
        // the most restrictive tier rather than failing the lookup.
        tier: SubscriptionTier::parse(&tier).unwrap_or(SubscriptionTier::Free),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(
            format!("{:?}", InsertUserOutcome::Created(Uuid::nil())),
            format!("Created({:?})", Uuid::nil())
        );
        assert_eq!(format!("{:?}", InsertUserOutcome::EmailTaken), "EmailTaken");
    }

    #[tokio::test]
    async fn insert_user_rejects_invalid_email_before_touching_store() {
        // Lazy pool: validation fails before any connection is attempted.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://gatekeeper@localhost:5432/gatekeeper")
            .expect("valid test dsn");
        let outcome = insert_user(
            &pool,
            &NewUser {
                email: "not-an-email".to_string(),
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
                tier: SubscriptionTier::Free,
            },
        )
        .await
        .expect("no store access needed");
        assert!(matches!(outcome, InsertUserOutcome::InvalidEmail));
    }
}
