pub mod migrate;
pub mod ping;

/// Arguments shared by every operator action.
#[derive(Debug)]
pub struct Args {
    pub dsn: String,
}

#[derive(Debug)]
pub enum Action {
    MigrateRun(Args),
    MigrateRollback(Args),
    MigrateStatus(Args),
    Ping(Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails; the binary maps it to a
    /// non-zero exit code.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::MigrateRun(args) => migrate::run(&args).await,
            Self::MigrateRollback(args) => migrate::rollback(&args).await,
            Self::MigrateStatus(args) => migrate::status(&args).await,
            Self::Ping(args) => ping::execute(&args).await,
        }
    }
}
