//! Subcommand implementations.

use std::path::PathBuf;

use relmig_backends::{AsyncSqliteConnection, BackendError, DatabaseUrl, SqliteConnection};
use relmig_core::{
    AsyncConnection, CancellationToken, DriverError, ExecutionPlan, ExecutionReport,
    ExecutorConfig, ExecutorError, MigrationCommand, MigrationCommandExecutor, MigrationScript,
    ScriptError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::formatter::{create_formatter, OutputFormat};

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to set up database connection: {0}")]
    Connection(#[from] DriverError),

    #[error(transparent)]
    Execution(#[from] ExecutorError),

    #[error("migration task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Options of `relmig apply`.
#[derive(clap::Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Migration script to apply
    pub script: PathBuf,

    /// Database URL (sqlite:PATH, postgres://...)
    #[arg(long, env = "RELMIG_DATABASE_URL")]
    pub database_url: String,

    /// Use the blocking SQLite driver instead of the async one
    #[arg(long)]
    pub blocking: bool,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Include command text in debug logs
    #[arg(long)]
    pub log_commands: bool,
}

/// Options of `relmig plan`.
#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Migration script to inspect
    pub script: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

/// Apply a script and return the formatted report.
pub async fn apply(args: ApplyArgs) -> Result<String, CliError> {
    let commands = MigrationScript::from_file(&args.script)?;
    let executor = MigrationCommandExecutor::new(
        ExecutorConfig::default().with_command_logging(args.log_commands),
    );

    info!(
        script = %args.script.display(),
        commands = commands.len(),
        "Applying migration script"
    );

    let report = match DatabaseUrl::parse(&args.database_url)? {
        DatabaseUrl::Sqlite(path) if args.blocking => {
            tokio::task::spawn_blocking(move || {
                let mut conn = SqliteConnection::new(path);
                executor.execute(&commands, &mut conn)
            })
            .await??
        }
        DatabaseUrl::Sqlite(path) => {
            let mut conn = AsyncSqliteConnection::from_path(path);
            run_async(&executor, &commands, &mut conn).await?
        }
        DatabaseUrl::Postgres(url) => apply_postgres(&executor, &commands, &url).await?,
    };

    Ok(create_formatter(args.format).format_report(&report))
}

/// Print the batching plan of a script without touching a database.
pub fn plan(args: PlanArgs) -> Result<String, CliError> {
    let commands = MigrationScript::from_file(&args.script)?;
    let plan = ExecutionPlan::build(&commands)?;
    Ok(create_formatter(args.format).format_plan(&commands, &plan))
}

#[cfg(feature = "postgres")]
async fn apply_postgres(
    executor: &MigrationCommandExecutor,
    commands: &[MigrationCommand],
    url: &str,
) -> Result<ExecutionReport, CliError> {
    let mut conn = relmig_backends::PostgresConnection::new(url)?;
    run_async(executor, commands, &mut conn).await
}

#[cfg(not(feature = "postgres"))]
async fn apply_postgres(
    _executor: &MigrationCommandExecutor,
    _commands: &[MigrationCommand],
    _url: &str,
) -> Result<ExecutionReport, CliError> {
    Err(BackendError::FeatureDisabled("PostgreSQL", "postgres").into())
}

/// Run the async driver, cancelling on Ctrl-C.
async fn run_async<C: AsyncConnection>(
    executor: &MigrationCommandExecutor,
    commands: &[MigrationCommand],
    conn: &mut C,
) -> Result<ExecutionReport, CliError> {
    let cancel = CancellationToken::new();

    let watcher = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling migration");
            watcher.cancel();
        }
    });

    let result = executor.execute_async(commands, conn, &cancel).await;
    interrupt.abort();

    Ok(result?)
}
