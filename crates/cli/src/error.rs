//! CLI error type

use stratum_core::MigrateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Migrate(#[from] MigrateError),

    #[error("config error: {0}")]
    Config(String),
}
