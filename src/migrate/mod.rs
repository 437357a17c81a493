//! Exactly-once schema migration runner.
//!
//! The ledger table records which named migrations have run; ledger
//! membership plus catalog order are the only sources of truth. The runner
//! never infers state from the shape of the actual schema, and it never
//! retries a failed `up`: schema changes are rarely safely re-runnable from
//! a partial state, so a failure halts the run for operator intervention.

use std::collections::HashMap;

use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::{Instrument, info};

use crate::error::{Error, Result};

mod catalog;

use catalog::{CATALOG, Migration};

const CREATE_LEDGER: &str = r"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        name TEXT PRIMARY KEY,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
";

/// Per-migration report from [`status`].
#[derive(Clone, Debug)]
pub struct MigrationStatus {
    pub name: &'static str,
    pub applied: bool,
    pub applied_at: Option<OffsetDateTime>,
}

/// What [`run`] did for one catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunAction {
    Applied,
    Skipped,
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub name: &'static str,
    pub action: RunAction,
}

/// Apply every pending migration, in catalog order.
///
/// Each migration's `up` and its ledger row are committed in one
/// transaction, so a crash between them cannot record an unapplied
/// migration or apply an unrecorded one. The first failure halts the run;
/// later migrations are not attempted.
///
/// # Errors
/// `SchemaError` when an `up` fails, `Unavailable` when the store cannot
/// be reached.
pub async fn run(pool: &PgPool) -> Result<Vec<RunOutcome>> {
    ensure_ledger(pool).await?;
    let applied = applied_migrations(pool).await?;

    let mut outcomes = Vec::with_capacity(CATALOG.len());
    for migration in CATALOG {
        if applied.contains_key(migration.name) {
            outcomes.push(RunOutcome {
                name: migration.name,
                action: RunAction::Skipped,
            });
            continue;
        }
        apply(pool, migration).await?;
        info!("Applied migration {}", migration.name);
        outcomes.push(RunOutcome {
            name: migration.name,
            action: RunAction::Applied,
        });
    }
    Ok(outcomes)
}

/// Roll back the most recently applied migration.
///
/// # Errors
/// `SchemaError` when nothing has been applied, when the ledger names a
/// migration this binary does not know (code/ledger drift), or when the
/// `down` fails; `Unavailable` when the store cannot be reached.
pub async fn rollback_last(pool: &PgPool) -> Result<&'static str> {
    let query = r"
        SELECT name
        FROM schema_migrations
        ORDER BY applied_at DESC, name DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = match sqlx::query(query).fetch_optional(pool).instrument(span).await {
        Ok(row) => row,
        Err(err) if is_undefined_table(&err) => None,
        Err(err) => return Err(err.into()),
    };

    let Some(row) = row else {
        return Err(Error::SchemaError(
            "no migrations have been applied".to_string(),
        ));
    };
    let name: String = row.get("name");
    let Some(migration) = catalog::find(&name) else {
        return Err(Error::SchemaError(format!(
            "ledger references unknown migration {name}"
        )));
    };

    let mut tx = pool.begin().await?;
    sqlx::raw_sql(migration.down)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            Error::SchemaError(format!("rollback of {} failed: {err}", migration.name))
        })?;
    sqlx::query("DELETE FROM schema_migrations WHERE name = $1")
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Rolled back migration {}", migration.name);
    Ok(migration.name)
}

/// Report applied/pending state for every catalog entry, in order.
///
/// A pure read: a database where the ledger has never been created reports
/// every migration as pending instead of demanding write access.
///
/// # Errors
/// Returns `Unavailable` when the store cannot be reached.
pub async fn status(pool: &PgPool) -> Result<Vec<MigrationStatus>> {
    let applied = applied_migrations(pool).await?;
    Ok(CATALOG
        .iter()
        .map(|migration| {
            let applied_at = applied.get(migration.name).copied();
            MigrationStatus {
                name: migration.name,
                applied: applied_at.is_some(),
                applied_at,
            }
        })
        .collect())
}

async fn ensure_ledger(pool: &PgPool) -> Result<()> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "CREATE",
        db.statement = CREATE_LEDGER
    );
    sqlx::raw_sql(CREATE_LEDGER)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

async fn applied_migrations(pool: &PgPool) -> Result<HashMap<String, OffsetDateTime>> {
    let query = "SELECT name, applied_at FROM schema_migrations";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = match sqlx::query(query).fetch_all(pool).instrument(span).await {
        Ok(rows) => rows,
        Err(err) if is_undefined_table(&err) => return Ok(HashMap::new()),
        Err(err) => return Err(err.into()),
    };
    Ok(rows
        .into_iter()
        .map(|row| (row.get("name"), row.get("applied_at")))
        .collect())
}

async fn apply(pool: &PgPool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(migration.up)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            Error::SchemaError(format!("migration {} failed: {err}", migration.name))
        })?;
    sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1)")
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// SQLSTATE 42P01: relation does not exist. A missing ledger means no
/// migration has ever run.
fn is_undefined_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "42P01"),
        _ => false,
    }
}
