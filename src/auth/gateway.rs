//! Single authorization entry point for inbound requests.
//!
//! The routing layer hands over the `Authorization` header value; the
//! gateway resolves it through the token or api-key path and answers with
//! exactly one terminal outcome. It never retries, and internal failures
//! are logged here so callers only see the generic outcome.

use sqlx::PgPool;
use tracing::error;

use crate::error::Error;
use crate::store::users;

use super::keys::ApiKeyService;
use super::rate_limit::RateLimiter;
use super::state::AuthConfig;
use super::token::TokenGenerator;
use super::types::{ApiKeyValidation, Principal};
use super::utils::{extract_bearer, is_api_key};

/// Terminal result of authenticating one request.
#[derive(Clone, Debug)]
pub enum AuthOutcome {
    Authenticated(Principal),
    MissingCredential,
    InvalidCredential,
    Expired,
    RateLimitExceeded,
    InternalError,
}

impl AuthOutcome {
    /// The one externally visible status for this outcome.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Authenticated(_) => 200,
            Self::MissingCredential | Self::InvalidCredential | Self::Expired => 401,
            Self::RateLimitExceeded => 429,
            Self::InternalError => 500,
        }
    }
}

/// Composes token verification, key validation, and quota accounting.
///
/// Construct once at startup, after migrations have completed, and share
/// across workers.
pub struct AuthGateway {
    pool: PgPool,
    tokens: TokenGenerator,
    keys: ApiKeyService,
    limiter: RateLimiter,
}

impl AuthGateway {
    #[must_use]
    pub fn new(pool: PgPool, config: AuthConfig) -> Self {
        Self {
            tokens: TokenGenerator::new(config),
            keys: ApiKeyService::new(pool.clone()),
            limiter: RateLimiter::new(),
            pool,
        }
    }

    /// Token issuer/verifier, for login flows in the embedding service.
    #[must_use]
    pub fn tokens(&self) -> &TokenGenerator {
        &self.tokens
    }

    /// Key lifecycle service, for management endpoints.
    #[must_use]
    pub fn keys(&self) -> &ApiKeyService {
        &self.keys
    }

    /// Quota accountant. Exposed so callers can run housekeeping.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Authorize one inbound request from its `Authorization` header value.
    pub async fn authenticate(&self, authorization: Option<&str>) -> AuthOutcome {
        let Some(credential) = authorization.and_then(extract_bearer) else {
            return AuthOutcome::MissingCredential;
        };

        if is_api_key(credential) {
            self.authenticate_key(credential).await
        } else {
            self.authenticate_token(credential).await
        }
    }

    async fn authenticate_key(&self, raw_key: &str) -> AuthOutcome {
        let validation = match self.keys.validate(raw_key).await {
            Ok(validation) => validation,
            Err(err) => {
                error!("Api key validation failed: {err}");
                return AuthOutcome::InternalError;
            }
        };

        match validation {
            ApiKeyValidation::Invalid => AuthOutcome::InvalidCredential,
            ApiKeyValidation::Expired => AuthOutcome::Expired,
            ApiKeyValidation::Valid {
                key_id,
                user_id,
                permissions,
                rate_limit,
            } => {
                // Accounting happens on every check; denial is ours.
                let status = self.limiter.check(key_id, rate_limit);
                if status.exceeded {
                    return AuthOutcome::RateLimitExceeded;
                }
                AuthOutcome::Authenticated(Principal {
                    user_id,
                    permissions: Some(permissions),
                })
            }
        }
    }

    async fn authenticate_token(&self, token: &str) -> AuthOutcome {
        let user_id = match self.tokens.verify(token) {
            Ok(user_id) => user_id,
            Err(Error::Expired) => return AuthOutcome::Expired,
            Err(Error::InvalidCredential) => return AuthOutcome::InvalidCredential,
            Err(err) => {
                error!("Token verification failed: {err}");
                return AuthOutcome::InternalError;
            }
        };

        // A valid signature is not enough: the user must still exist.
        match users::user_exists(&self.pool, user_id).await {
            Ok(true) => AuthOutcome::Authenticated(Principal {
                user_id,
                permissions: None,
            }),
            Ok(false) => AuthOutcome::InvalidCredential,
            Err(err) => {
                error!("User lookup failed during authentication: {err}");
                AuthOutcome::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use time::Duration;
    use uuid::Uuid;

    fn gateway() -> AuthGateway {
        // Lazy pool: no connection is made until a query runs, which the
        // paths under test never do.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://gatekeeper@localhost:5432/gatekeeper")
            .expect("valid test dsn");
        AuthGateway::new(pool, AuthConfig::new(SecretString::from("test-secret")))
    }

    #[tokio::test]
    async fn missing_header_is_missing_credential() {
        let gateway = gateway();
        assert!(matches!(
            gateway.authenticate(None).await,
            AuthOutcome::MissingCredential
        ));
    }

    #[tokio::test]
    async fn garbled_header_is_missing_credential() {
        let gateway = gateway();
        for header in ["", "Basic abc", "Bearer "] {
            assert!(matches!(
                gateway.authenticate(Some(header)).await,
                AuthOutcome::MissingCredential
            ));
        }
    }

    #[tokio::test]
    async fn tampered_token_is_invalid_credential() {
        let gateway = gateway();
        assert!(matches!(
            gateway.authenticate(Some("Bearer not.a.token")).await,
            AuthOutcome::InvalidCredential
        ));
    }

    #[tokio::test]
    async fn expired_token_is_expired() -> anyhow::Result<()> {
        let gateway = gateway();
        let issued = gateway
            .tokens()
            .issue_with_ttl(Uuid::new_v4(), Duration::seconds(-60))?;
        let header = format!("Bearer {}", issued.token);
        assert!(matches!(
            gateway.authenticate(Some(&header)).await,
            AuthOutcome::Expired
        ));
        Ok(())
    }

    #[test]
    fn outcomes_map_to_one_status_each() {
        assert_eq!(AuthOutcome::MissingCredential.http_status(), 401);
        assert_eq!(AuthOutcome::InvalidCredential.http_status(), 401);
        assert_eq!(AuthOutcome::Expired.http_status(), 401);
        assert_eq!(AuthOutcome::RateLimitExceeded.http_status(), 429);
        assert_eq!(AuthOutcome::InternalError.http_status(), 500);
        let principal = Principal {
            user_id: Uuid::nil(),
            permissions: None,
        };
        assert_eq!(AuthOutcome::Authenticated(principal).http_status(), 200);
    }
}
