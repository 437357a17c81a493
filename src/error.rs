//! Error taxonomy shared across the credential and quota services.
//!
//! Every failure crossing the crate boundary is one of these variants with a
//! stable, generic message. Driver-level error text (sqlx, TLS, DNS) never
//! reaches `Display`; callers that need the cause for logs can use the error
//! source chain.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing or malformed credential")]
    Unauthorized,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("credential expired")]
    Expired,
    #[error("operation not permitted")]
    Forbidden,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("schema migration error: {0}")]
    SchemaError(String),
    #[error("storage unavailable")]
    Unavailable(#[source] sqlx::Error),
    #[error("could not generate a unique api key")]
    KeyGenerationExhausted,
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // Pool exhaustion, timeouts, and I/O all collapse into Unavailable:
        // the caller only needs to know the store did not answer.
        Self::Unavailable(err)
    }
}

impl Error {
    /// True when the failure is transient and the operation may be retried
    /// by the caller after backing off.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_generic() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.to_string(), "storage unavailable");
        assert_eq!(Error::InvalidCredential.to_string(), "invalid credential");
        assert_eq!(Error::Expired.to_string(), "credential expired");
    }

    #[test]
    fn sqlx_errors_map_to_unavailable() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Unavailable(_)));
        assert!(err.is_transient());
        assert!(!Error::Forbidden.is_transient());
    }
}
