//! Signed, time-bound session tokens.
//!
//! A token is `base64url(claims_json) . base64url(hmac_sha256_tag)` keyed by
//! the process-wide token secret. Validity is proven entirely by signature
//! and expiry; nothing is persisted, so issuance and verification are safe
//! to call from any number of workers without locks.

use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::state::AuthConfig;
use super::types::AuthToken;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
}

/// Stateless issuer/verifier for session tokens.
#[derive(Clone)]
pub struct TokenGenerator {
    config: AuthConfig,
}

impl TokenGenerator {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issue a token for `user_id` using the configured TTL.
    ///
    /// # Errors
    /// Returns an error if claim serialization fails.
    pub fn issue(&self, user_id: Uuid) -> Result<AuthToken> {
        self.issue_with_ttl(user_id, Duration::seconds(self.config.token_ttl_seconds()))
    }

    /// Issue a token for `user_id` expiring after `ttl`.
    ///
    /// # Errors
    /// Returns an error if claim serialization fails.
    pub fn issue_with_ttl(&self, user_id: Uuid, ttl: Duration) -> Result<AuthToken> {
        self.issue_at(user_id, ttl, OffsetDateTime::now_utc())
    }

    /// Verify a token string and return the subject user id.
    ///
    /// # Errors
    /// `InvalidCredential` for malformed or tampered tokens, `Expired` once
    /// `now` has passed the embedded expiry. A tampered token never reports
    /// `Expired`: the signature is checked first.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, user_id: Uuid, ttl: Duration, now: OffsetDateTime) -> Result<AuthToken> {
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id,
            exp: expires_at.unix_timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|_| Error::SchemaError("token claims encoding".to_string()))?;
        let tag = self.sign(&payload);
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(tag)
        );
        Ok(AuthToken {
            token,
            user_id,
            expires_at,
        })
    }

    fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Uuid> {
        let (payload_b64, tag_b64) = token.split_once('.').ok_or(Error::InvalidCredential)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64.as_bytes())
            .map_err(|_| Error::InvalidCredential)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64.as_bytes())
            .map_err(|_| Error::InvalidCredential)?;

        // Constant-time tag comparison happens inside verify_slice.
        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&tag).map_err(|_| Error::InvalidCredential)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| Error::InvalidCredential)?;
        if now.unix_timestamp() > claims.exp {
            return Err(Error::Expired);
        }
        Ok(claims.sub)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.config.token_secret().expose_secret().as_bytes())
            .expect("hmac accepts keys of any length")
    }
}
