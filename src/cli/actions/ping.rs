//! Connectivity probe.

use anyhow::{Context, Result};
use sqlx::Row;

use crate::store;

use super::Args;

/// Connect and run a trivial query to prove the database answers.
/// # Errors
/// Returns an error if the database cannot be reached.
pub async fn execute(args: &Args) -> Result<()> {
    let pool = store::connect(&args.dsn)
        .await
        .context("failed to connect to database")?;
    let row = sqlx::query("SELECT version() AS version")
        .fetch_one(&pool)
        .await
        .context("database did not answer")?;
    let version: String = row.get("version");
    println!("database reachable: {version}");
    Ok(())
}
