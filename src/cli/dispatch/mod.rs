//! Command-line argument dispatch.
//!
//! This module maps validated CLI arguments to the appropriate operator
//! action.

use anyhow::{Context, Result, bail};
use url::Url;

use crate::cli::actions::{Action, Args};
use crate::cli::commands::{
    CMD_MIGRATE, CMD_MIGRATE_ROLLBACK, CMD_MIGRATE_RUN, CMD_MIGRATE_STATUS, CMD_PING,
};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    // Reject malformed connection strings before any action runs.
    Url::parse(&dsn).context("invalid GATEKEEPER_DSN")?;

    let args = Args { dsn };
    match matches.subcommand() {
        Some((CMD_MIGRATE, sub)) => match sub.subcommand() {
            Some((CMD_MIGRATE_RUN, _)) => Ok(Action::MigrateRun(args)),
            Some((CMD_MIGRATE_ROLLBACK, _)) => Ok(Action::MigrateRollback(args)),
            Some((CMD_MIGRATE_STATUS, _)) => Ok(Action::MigrateStatus(args)),
            _ => bail!("missing migrate subcommand"),
        },
        Some((CMD_PING, _)) => Ok(Action::Ping(args)),
        _ => bail!("missing subcommand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_required() {
        temp_env::with_vars([("GATEKEEPER_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec!["gatekeeper", "ping"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(
                    err.to_string()
                        .contains("missing required argument: --dsn")
                );
            }
        });
    }

    #[test]
    fn malformed_dsn_rejected() {
        let command = crate::cli::commands::new();
        let matches =
            command.get_matches_from(vec!["gatekeeper", "--dsn", "not a url", "ping"]);
        let result = handler(&matches);
        assert!(result.is_err());
    }

    #[test]
    fn subcommands_map_to_actions() {
        let cases = [
            (vec!["migrate", "run"], "MigrateRun"),
            (vec!["migrate", "rollback"], "MigrateRollback"),
            (vec!["migrate", "status"], "MigrateStatus"),
            (vec!["ping"], "Ping"),
        ];
        for (subcommand, expected) in cases {
            let mut argv = vec!["gatekeeper", "--dsn", "postgres://localhost/gatekeeper"];
            argv.extend(subcommand);
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(argv);
            let action = handler(&matches).expect("action");
            assert!(
                format!("{action:?}").starts_with(expected),
                "expected {expected} for {action:?}"
            );
        }
    }
}
