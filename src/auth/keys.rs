//! Api key lifecycle: create, validate, revoke, list.
//!
//! This service turns a raw key string into an authorization decision. It
//! holds no cache: revocation takes effect on the very next validation,
//! because every call goes back to the store.

use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::keys::{
    self as key_store, ApiKeyRecord, InsertKeyOutcome, NewApiKey,
};
use crate::store::users;

use super::types::{ApiKeyValidation, Permission, RateLimit};
use super::utils::{generate_api_key, hash_api_key, is_api_key};

/// Generation retries before giving up on a unique secret. Collisions on a
/// 256-bit secret mean a broken RNG, not bad luck.
const KEY_GENERATION_ATTEMPTS: usize = 3;

/// A freshly created key. The `key` field is the only copy of the raw
/// secret that will ever exist; the store keeps its hash.
#[derive(Clone, Debug)]
pub struct CreatedApiKey {
    pub key: String,
    pub record: ApiKeyRecord,
}

#[derive(Clone)]
pub struct ApiKeyService {
    pool: PgPool,
}

impl ApiKeyService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a key bound to `user_id`.
    ///
    /// Uniqueness rides on the store's unique constraint, not an
    /// application lock: concurrent creates race safely, and a hash
    /// collision regenerates the secret.
    ///
    /// # Errors
    /// `InvalidCredential` when the user does not exist,
    /// `KeyGenerationExhausted` after repeated collisions, `Unavailable` on
    /// storage failure.
    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        permissions: Vec<Permission>,
        rate_limit: RateLimit,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<CreatedApiKey> {
        if !users::user_exists(&self.pool, user_id).await? {
            return Err(Error::InvalidCredential);
        }

        for _ in 0..KEY_GENERATION_ATTEMPTS {
            let raw_key = generate_api_key().map_err(|_| Error::KeyGenerationExhausted)?;
            let key_hash = hash_api_key(&raw_key);
            let outcome = key_store::insert_api_key(
                &self.pool,
                &NewApiKey {
                    user_id,
                    key_hash: &key_hash,
                    name,
                    permissions: &permissions,
                    rate_limit,
                    expires_at,
                },
            )
            .await?;

            match outcome {
                InsertKeyOutcome::Created(record) => {
                    return Ok(CreatedApiKey {
                        key: raw_key,
                        record,
                    });
                }
                InsertKeyOutcome::HashConflict => {}
            }
        }

        Err(Error::KeyGenerationExhausted)
    }

    /// Validate a presented raw key.
    ///
    /// Not-found, owner-deleted, and expired keys all fail validation;
    /// expiry is reported distinctly. On success the key's `last_used_at`
    /// is updated best-effort in the background: losing that write never
    /// fails the request.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage failure.
    pub async fn validate(&self, raw_key: &str) -> Result<ApiKeyValidation> {
        if !is_api_key(raw_key) {
            return Ok(ApiKeyValidation::Invalid);
        }

        let key_hash = hash_api_key(raw_key);
        let Some(row) = key_store::find_api_key_by_hash(&self.pool, &key_hash).await? else {
            return Ok(ApiKeyValidation::Invalid);
        };

        if let Some(expires_at) = row.expires_at
            && OffsetDateTime::now_utc() > expires_at
        {
            return Ok(ApiKeyValidation::Expired);
        }

        let pool = self.pool.clone();
        let key_id = row.id;
        tokio::spawn(async move {
            if let Err(err) = key_store::update_last_used_at(&pool, key_id).await {
                warn!("Failed to record key last use: {err}");
            }
        });

        Ok(ApiKeyValidation::Valid {
            key_id: row.id,
            user_id: row.user_id,
            permissions: row.permissions,
            rate_limit: row.rate_limit,
        })
    }

    /// Revoke a key. Only the owner may revoke; deletion is hard, so the
    /// next validation of the raw key fails permanently.
    ///
    /// # Errors
    /// `InvalidCredential` for unknown keys, `Forbidden` when
    /// `requesting_user_id` is not the owner, `Unavailable` on storage
    /// failure.
    pub async fn revoke(&self, key_id: Uuid, requesting_user_id: Uuid) -> Result<()> {
        let Some(owner) = key_store::find_api_key_owner(&self.pool, key_id).await? else {
            return Err(Error::InvalidCredential);
        };
        if owner != requesting_user_id {
            return Err(Error::Forbidden);
        }
        // A concurrent revoke may have removed the row already; revocation
        // is idempotent.
        let _ = key_store::delete_api_key(&self.pool, key_id).await?;
        Ok(())
    }

    /// Keys owned by `user_id`, oldest first. Metadata only; the raw
    /// secret is never returned after creation.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage failure.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>> {
        key_store::list_api_keys_for_user(&self.pool, user_id).await
    }
}
