//! relmig Command-Line Runner
//!
//! Applies migration scripts to a database through the transactional
//! command executor, or prints how a script would be batched.

mod commands;
mod formatter;

use clap::{Parser, Subcommand};
use commands::{ApplyArgs, PlanArgs};

/// relmig migration runner
#[derive(Parser, Debug)]
#[command(name = "relmig")]
#[command(version, about = "Apply migration scripts with transaction batching")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a migration script to a database
    Apply(ApplyArgs),
    /// Show how a script is split into transactions
    Plan(PlanArgs),
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so JSON output stays clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relmig=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let result = run(args).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let output = match args.command {
        Command::Apply(apply) => commands::apply(apply).await?,
        Command::Plan(plan) => commands::plan(plan)?,
    };
    println!("{}", output);
    Ok(())
}
