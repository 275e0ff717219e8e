mod commands;
mod config;
mod error;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Overrides;
use error::CliError;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Versioned SQL schema migrations for operators and pipelines", version)]
struct Cli {
    /// Config file (default is stratum.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database driver URL, e.g. postgres://user@host/db
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Source driver URL, e.g. file://migrations
    #[arg(long, global = true)]
    source_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pending database migrations
    Migrate {
        /// Apply at most this many migrations (negative = unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        steps: i64,

        /// Drop every managed object and re-run all migrations
        #[arg(long)]
        fresh: bool,
    },

    /// Roll back the most recent database migrations
    Rollback {
        /// The number of migrations to be reverted (negative = unlimited)
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        steps: i64,
    },

    /// Show the status of each migration
    Status,

    /// Create a new migration file
    Create {
        /// Migration name, appended to the next sequential version
        name: String,

        /// Also create the paired reverse migration file
        #[arg(long)]
        with_reverse: bool,
    },

    /// Drop every managed database object
    Purge {
        /// Skip the safety check
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::load(&Overrides {
        config: cli.config,
        database_url: cli.database_url,
        source_url: cli.source_url,
    })?;

    match cli.command {
        Commands::Migrate { steps, fresh } => {
            commands::migrate::run(&config, steps, fresh).await?;
        }
        Commands::Rollback { steps } => {
            commands::rollback::run(&config, steps).await?;
        }
        Commands::Status => {
            commands::status::run(&config).await?;
        }
        Commands::Create { name, with_reverse } => {
            commands::create::run(&config, &name, with_reverse).await?;
        }
        Commands::Purge { force } => {
            commands::purge::run(&config, force).await?;
        }
    }

    Ok(())
}
