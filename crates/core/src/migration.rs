//! Merged per-version migration records

use chrono::{DateTime, Utc};

use crate::script::Script;
use crate::state::State;

/// The authoritative record for one version, merged from source scripts and
/// ledger history. Exactly one `Migration` exists per version at any time.
#[derive(Debug)]
pub struct Migration {
    /// Version string, the natural-sort key
    pub version: String,
    /// Description shared by the version's scripts and ledger rows
    pub description: String,
    /// Database user that applied the migration, when known
    pub applied_by: Option<String>,
    /// When the migration was last applied
    pub applied_at: Option<DateTime<Utc>>,
    /// Wall-clock execution time of the last run, in milliseconds
    pub execution_time_ms: Option<i64>,
    /// Lifecycle state flags
    pub state: State,

    /// Forward migration script, when present in the source
    pub advance_script: Option<Script>,
    /// Reverse migration script, when present in the source
    pub reverse_script: Option<Script>,
}

impl Migration {
    pub(crate) fn new(version: String, description: String, state: State) -> Migration {
        Migration {
            version,
            description,
            applied_by: None,
            applied_at: None,
            execution_time_ms: None,
            state,
            advance_script: None,
            reverse_script: None,
        }
    }
}
