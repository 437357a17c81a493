//! Persistence boundary: users, api keys, and the migrations ledger.
//!
//! This layer owns no business logic. Each function is one query (or one
//! transaction) with a `db.query` span, returning typed rows or outcome
//! enums. Unique-constraint races surface as outcomes, not errors, so
//! services can retry or report conflicts without parsing driver text.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::error::Result;

pub mod keys;
pub mod users;

const POOL_MIN_CONNECTIONS: u32 = 1;
const POOL_MAX_CONNECTIONS: u32 = 5;
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(60 * 2);
const STATEMENT_TIMEOUT_MS: &str = "5000";

/// Connect a bounded pool to the credential database.
///
/// The acquire timeout keeps pool exhaustion from blocking a request
/// indefinitely, and the server-side statement timeout bounds every query;
/// either way the caller sees `Unavailable` instead of a hang.
///
/// # Errors
/// Returns `Unavailable` if the database cannot be reached.
pub async fn connect(dsn: &str) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(dsn)?
        .options([("statement_timeout", STATEMENT_TIMEOUT_MS)]);
    let pool = PgPoolOptions::new()
        .min_connections(POOL_MIN_CONNECTIONS)
        .max_connections(POOL_MAX_CONNECTIONS)
        .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
        .max_lifetime(POOL_MAX_LIFETIME)
        .test_before_acquire(true)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_matches_sqlstate() {
        assert!(is_unique_violation(&test_support::unique_violation()));

        let err = sqlx::Error::Database(Box::new(test_support::TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
