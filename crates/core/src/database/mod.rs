//! Database driver contract
//!
//! A database driver owns the durable history ledger and executes migration
//! script text. The ledger is append-only with rank-upsert semantics: writing
//! a row without a rank inserts and assigns one; writing with a known rank
//! replaces that row in place. Reads return only the latest attempt per
//! (version, mode).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{MigrateError, MigrateResult};
use crate::script::Direction;

pub mod postgres;

pub use postgres::{PostgresDriver, PostgresFactory};

/// Default history ledger table name.
pub const DEFAULT_HISTORY_TABLE: &str = "migration_history";
/// Default advisory locking table name.
pub const DEFAULT_LOCKING_TABLE: &str = "migration_locking";

/// One ledger entry, ten ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    /// Monotonic ledger sequence; `None` until the driver assigns one
    pub rank: Option<i64>,
    /// Script direction recorded for this attempt
    pub mode: Direction,
    pub version: String,
    pub script_name: String,
    pub description: String,
    pub checksum: String,
    /// Database user that ran the attempt; filled by the driver when empty
    pub applied_by: String,
    pub applied_at: DateTime<Utc>,
    pub execution_time_ms: i64,
    pub success: bool,
}

impl HistoryRow {
    /// Pre-execution placeholder row for one attempt. The driver assigns the
    /// rank on first write; the same rank is then used to upsert the outcome.
    pub fn attempt(
        mode: Direction,
        version: &str,
        script_name: &str,
        description: &str,
        checksum: &str,
    ) -> HistoryRow {
        HistoryRow {
            rank: None,
            mode,
            version: version.to_string(),
            script_name: script_name.to_string(),
            description: description.to_string(),
            checksum: checksum.to_string(),
            applied_by: String::new(),
            applied_at: Utc::now(),
            execution_time_ms: 0,
            success: false,
        }
    }
}

/// Connection parameters handed to a database factory: the cleaned URL (all
/// `x-*` engine options stripped) plus the resolved engine options.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Url,
    pub history_table: String,
    /// `None` disables the advisory lock capability
    pub locking_table: Option<String>,
}

/// Advisory lock capability for coordinating concurrent engine instances.
///
/// The core never acquires this itself; a caller may hold it around a whole
/// migrate or rollback session.
#[async_trait]
pub trait Locker: Send {
    async fn lock(&mut self) -> MigrateResult<()>;
    async fn unlock(&mut self) -> MigrateResult<()>;

    /// Current shared lock status.
    fn locked(&self) -> bool;

    /// True when the driver was opened with locking enabled.
    fn lockable(&self) -> bool;
}

/// Boundary to the target database and its history ledger.
#[async_trait]
pub trait DatabaseDriver: Send {
    /// Latest attempt per (version, mode), in no particular order.
    async fn read(&mut self) -> MigrateResult<Vec<HistoryRow>>;

    /// Upsert one ledger row by rank; assigns the rank (and `applied_by`)
    /// when unset.
    async fn write(&mut self, row: &mut HistoryRow) -> MigrateResult<()>;

    /// Execute raw migration script text.
    async fn run(&mut self, sql: &str) -> MigrateResult<()>;

    /// Drop every managed object, returning every error encountered instead
    /// of stopping at the first.
    async fn purge(&mut self) -> Vec<MigrateError>;

    /// Release connections and resources.
    async fn close(&mut self) -> MigrateResult<()>;

    /// Advisory lock capability, when the driver exposes one.
    fn locker(&mut self) -> Option<&mut dyn Locker> {
        None
    }
}

/// Opens database drivers for one URL scheme.
#[async_trait]
pub trait DatabaseFactory: Send + Sync {
    /// Scheme this factory serves, e.g. `postgres`.
    fn scheme(&self) -> &'static str;

    async fn open(&self, config: DatabaseConfig) -> MigrateResult<Box<dyn DatabaseDriver>>;
}
