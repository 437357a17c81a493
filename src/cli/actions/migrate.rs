//! Migration operator commands.
//!
//! These print their per-migration result to stdout for the operator; the
//! tracing pipeline still carries the structured record.

use anyhow::{Context, Result};

use crate::migrate::{self, RunAction};
use crate::store;

use super::Args;

/// Apply every pending migration in catalog order.
/// # Errors
/// Returns an error if connecting fails or a migration fails to apply.
pub async fn run(args: &Args) -> Result<()> {
    let pool = store::connect(&args.dsn)
        .await
        .context("failed to connect to database")?;
    let outcomes = migrate::run(&pool).await.context("migration run failed")?;
    for outcome in &outcomes {
        let action = match outcome.action {
            RunAction::Applied => "applied",
            RunAction::Skipped => "skipped",
        };
        println!("{:<32} {action}", outcome.name);
    }
    Ok(())
}

/// Roll back the most recently applied migration.
/// # Errors
/// Returns an error if connecting fails, nothing has been applied, or the
/// rollback fails.
pub async fn rollback(args: &Args) -> Result<()> {
    let pool = store::connect(&args.dsn)
        .await
        .context("failed to connect to database")?;
    let name = migrate::rollback_last(&pool)
        .await
        .context("rollback failed")?;
    println!("{name:<32} rolled back");
    Ok(())
}

/// Print applied/pending state for every migration.
/// # Errors
/// Returns an error if connecting or reading the ledger fails.
pub async fn status(args: &Args) -> Result<()> {
    let pool = store::connect(&args.dsn)
        .await
        .context("failed to connect to database")?;
    let statuses = migrate::status(&pool)
        .await
        .context("failed to read migration status")?;
    for status in &statuses {
        match status.applied_at {
            Some(applied_at) => println!("{:<32} applied {applied_at}", status.name),
            None => println!("{:<32} pending", status.name),
        }
    }
    Ok(())
}
