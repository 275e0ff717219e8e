//! Error types for the migration engine
//!
//! Every public operation surfaces a distinguishable error variant. Payloads
//! are owned strings so the enum stays `Clone`: reconciliation errors are
//! sticky and must be replayed by later calls until the next refresh.

use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Clone, Error)]
pub enum MigrateError {
    /// Migration identifier does not match the filename grammar
    #[error("invalid migration identifier '{0}'")]
    Parse(String),

    /// Two scripts with the same version and direction
    #[error("duplicate migration '{0}'")]
    DuplicateMigration(String),

    /// Advance/reverse pair (or script/ledger pair) disagree on description
    #[error("migration description mismatch [{first} ; {second}]")]
    DescriptionMismatch { first: String, second: String },

    /// Reverse scripts with no advance counterpart, naturally sorted
    #[error("found {} reverse migration(s) without advance counterpart: {}", .0.len(), .0.join(", "))]
    UnpairedReverse(Vec<String>),

    /// A never-applied version is ordered before an already-applied one
    #[error("out-of-order migration: pending version {pending} precedes applied version {applied}")]
    OutOfOrder { pending: String, applied: String },

    /// A previously failed migration blocks forward progress
    #[error("last database migration failed, manual cleanup needed at version {0}")]
    ManualCleanupNeeded(String),

    /// Migration file creation failed
    #[error("create error: {0}")]
    Create(String),

    /// Source driver failure
    #[error("source error: {0}")]
    Source(String),

    /// Database driver failure
    #[error("database error: {0}")]
    Database(String),

    /// URL scheme has no registered driver
    #[error("unknown {kind} driver '{scheme}'")]
    UnknownDriver { kind: &'static str, scheme: String },

    /// Driver registration failure (startup configuration error)
    #[error("driver registry error: {0}")]
    Registry(String),

    /// Driver URL could not be parsed
    #[error("invalid driver url: {0}")]
    InvalidUrl(String),

    /// Purge finished but some objects could not be dropped
    #[error("purge completed with {} error(s): {}", .0.len(), .0.join("; "))]
    Purge(Vec<String>),
}

impl From<std::io::Error> for MigrateError {
    fn from(err: std::io::Error) -> Self {
        MigrateError::Source(err.to_string())
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::Database(err.to_string())
    }
}

impl From<url::ParseError> for MigrateError {
    fn from(err: url::ParseError) -> Self {
        MigrateError::InvalidUrl(err.to_string())
    }
}
