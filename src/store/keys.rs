//! Api key rows.
//!
//! Only the SHA-256 hash of a key secret is persisted; the raw value exists
//! in memory at creation time and is never queryable again. Permissions and
//! the rate-limit policy ride in JSONB columns, serialized here and opaque
//! to the database.

use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::types::{Permission, RateLimit};
use crate::error::{Error, Result};

use super::is_unique_violation;

/// Key metadata as returned to owners. The raw secret never appears here.
#[derive(Clone, Debug)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub rate_limit: RateLimit,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
}

/// Row needed to turn a presented key into an authorization decision.
#[derive(Clone, Debug)]
pub struct KeyAuthRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permissions: Vec<Permission>,
    pub rate_limit: RateLimit,
    pub expires_at: Option<OffsetDateTime>,
}

/// Outcome when inserting a key with a freshly generated secret.
#[derive(Debug)]
pub enum InsertKeyOutcome {
    Created(ApiKeyRecord),
    HashConflict,
}

pub struct NewApiKey<'a> {
    pub user_id: Uuid,
    pub key_hash: &'a [u8],
    pub name: &'a str,
    pub permissions: &'a [Permission],
    pub rate_limit: RateLimit,
    pub expires_at: Option<OffsetDateTime>,
}

/// Insert an api key, reporting hash collisions as an outcome so the
/// service can regenerate the secret and retry.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn insert_api_key(pool: &PgPool, new_key: &NewApiKey<'_>) -> Result<InsertKeyOutcome> {
    let permissions_json = serde_json::to_string(new_key.permissions)
        .map_err(|err| Error::SchemaError(format!("permissions encode: {err}")))?;
    let rate_limit_json = serde_json::to_string(&new_key.rate_limit)
        .map_err(|err| Error::SchemaError(format!("rate limit encode: {err}")))?;

    let query = r"
        INSERT INTO api_keys (user_id, key_hash, name, permissions, rate_limit, expires_at)
        VALUES ($1, $2, $3, $4::jsonb, $5::jsonb, $6)
        RETURNING id, created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(new_key.user_id)
        .bind(new_key.key_hash)
        .bind(new_key.name)
        .bind(permissions_json)
        .bind(rate_limit_json)
        .bind(new_key.expires_at)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertKeyOutcome::Created(ApiKeyRecord {
            id: row.get("id"),
            user_id: new_key.user_id,
            name: new_key.name.to_string(),
            permissions: new_key.permissions.to_vec(),
            rate_limit: new_key.rate_limit,
            created_at: row.get("created_at"),
            expires_at: new_key.expires_at,
            last_used_at: None,
        })),
        Err(err) if is_unique_violation(&err) => Ok(InsertKeyOutcome::HashConflict),
        Err(err) => Err(err.into()),
    }
}

/// Resolve a presented key hash to its authorization row.
///
/// The join to `users` makes a key whose owner was deleted behave exactly
/// like a key that never existed.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn find_api_key_by_hash(pool: &PgPool, key_hash: &[u8]) -> Result<Option<KeyAuthRow>> {
    let query = r"
        SELECT api_keys.id,
               api_keys.user_id,
               api_keys.permissions::text AS permissions,
               api_keys.rate_limit::text AS rate_limit,
               api_keys.expires_at
        FROM api_keys
        JOIN users ON users.id = api_keys.user_id
        WHERE api_keys.key_hash = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(key_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(KeyAuthRow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        permissions: decode_json(row.get("permissions"))?,
        rate_limit: decode_json(row.get("rate_limit"))?,
        expires_at: row.get("expires_at"),
    }))
}

/// Owner of a key, if the key exists.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn find_api_key_owner(pool: &PgPool, key_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT user_id FROM api_keys WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(key_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| row.get("user_id")))
}

/// Hard-delete a key. Returns whether a row was removed.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn delete_api_key(pool: &PgPool, key_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM api_keys WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(key_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Record a successful validation. Last write wins; callers treat this as
/// advisory metadata, not an ordering guarantee.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn update_last_used_at(pool: &PgPool, key_id: Uuid) -> Result<()> {
    let query = "UPDATE api_keys SET last_used_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(key_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

/// All keys owned by a user, oldest first. Metadata only.
///
/// # Errors
/// Returns `Unavailable` on storage failure.
pub async fn list_api_keys_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ApiKeyRecord>> {
    let query = r"
        SELECT id, user_id, name,
               permissions::text AS permissions,
               rate_limit::text AS rate_limit,
               created_at, expires_at, last_used_at
        FROM api_keys
        WHERE user_id = $1
        ORDER BY created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.into_iter()
        .map(|row| {
            Ok(ApiKeyRecord {
                id: row.get("id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
                permissions: decode_json(row.get("permissions"))?,
                rate_limit: decode_json(row.get("rate_limit"))?,
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
                last_used_at: row.get("last_used_at"),
            })
        })
        .collect()
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: String) -> Result<T> {
    // A row that fails to decode was written by an incompatible binary;
    // surface it as schema drift rather than a credential problem.
    serde_json::from_str(&raw).map_err(|err| Error::SchemaError(format!("jsonb decode: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_json_round_trips_policy() {
        let policy = RateLimit {
            requests_per_hour: 2,
            requests_per_day: 100,
            max_servers: 1,
        };
        let raw = serde_json::to_string(&policy).expect("serialize");
        let decoded: RateLimit = decode_json(raw).expect("decode");
        assert_eq!(decoded, policy);
    }

    #[test]
    fn decode_json_reports_drift() {
        let result: Result<RateLimit> = decode_json("not-json".to_string());
        assert!(matches!(result, Err(Error::SchemaError(_))));
    }

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(
            format!("{:?}", InsertKeyOutcome::HashConflict),
            "HashConflict"
        );
    }
}
