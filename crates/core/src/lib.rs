//! # stratum-core: Schema Migration Engine
//!
//! Reconciles versioned migration scripts from a source location against a
//! persisted history ledger in a target database, determines which scripts
//! still need to be applied or can be safely reverted, and executes them in
//! deterministic, auditable order.
//!
//! Sources and databases are pluggable behind driver contracts; a filesystem
//! source (`file://`) and a Postgres driver (`postgres://`) ship built in.

pub mod database;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod migration;
pub mod natsort;
pub mod registry;
pub mod script;
pub mod source;
pub mod state;

#[cfg(test)]
mod tests;

// Re-export core types
pub use database::{
    DatabaseConfig, DatabaseDriver, DatabaseFactory, HistoryRow, Locker, PostgresDriver,
    PostgresFactory, DEFAULT_HISTORY_TABLE, DEFAULT_LOCKING_TABLE,
};
pub use engine::Migrator;
pub use error::{MigrateError, MigrateResult};
pub use hooks::{Hooks, MigrationErrorHook, MigrationHook};
pub use migration::Migration;
pub use registry::DriverRegistry;
pub use script::{Direction, Script};
pub use source::{FileSource, FileSourceFactory, SourceDriver, SourceEntry, SourceFactory};
pub use state::State;
