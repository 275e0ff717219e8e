//! In-memory mock drivers
//!
//! `MemorySource` and `MemoryDatabase` implement the driver contracts over
//! plain vectors behind a shared handle, so tests can seed inputs and inspect
//! every write and executed script after the engine ran.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::database::{DatabaseDriver, HistoryRow};
use crate::error::{MigrateError, MigrateResult};
use crate::script::Direction;
use crate::source::{SourceDriver, SourceEntry};

pub fn checksum_of(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[derive(Default)]
pub struct SourceState {
    pub files: Vec<(String, Vec<u8>)>,
    pub touched: Vec<String>,
    pub removed: Vec<String>,
    /// Fail `touch` for names containing this substring
    pub fail_touch_matching: Option<String>,
}

pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
    index: usize,
}

impl MemorySource {
    pub fn new(files: &[(&str, &str)]) -> (MemorySource, Arc<Mutex<SourceState>>) {
        let state = Arc::new(Mutex::new(SourceState {
            files: files
                .iter()
                .map(|(name, content)| (name.to_string(), content.as_bytes().to_vec()))
                .collect(),
            ..SourceState::default()
        }));
        (
            MemorySource {
                state: state.clone(),
                index: 0,
            },
            state,
        )
    }
}

impl SourceDriver for MemorySource {
    fn next_entry(&mut self) -> MigrateResult<Option<SourceEntry>> {
        let state = self.state.lock().unwrap();
        let Some((name, content)) = state.files.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;

        Ok(Some(SourceEntry {
            identifier: name.clone(),
            content: Box::new(Cursor::new(content.clone())),
        }))
    }

    fn touch(&mut self, name: &str) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(pattern) = &state.fail_touch_matching {
            if name.contains(pattern.as_str()) {
                return Err(MigrateError::Source(format!("refusing to create {}", name)));
            }
        }
        state.files.push((name.to_string(), Vec::new()));
        state.touched.push(name.to_string());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.files.len();
        state.files.retain(|(file, _)| file != name);
        if state.files.len() == before {
            return Err(MigrateError::Source(format!("no such entry {}", name)));
        }
        state.removed.push(name.to_string());
        Ok(())
    }

    fn reset(&mut self) -> MigrateResult<()> {
        self.index = 0;
        Ok(())
    }
}

pub struct DatabaseState {
    pub rows: Vec<HistoryRow>,
    /// Snapshot of every `write` call, in order
    pub write_log: Vec<HistoryRow>,
    /// Every script handed to `run`, in order
    pub executed: Vec<String>,
    pub next_rank: i64,
    /// Fail `run` for scripts containing this substring
    pub fail_run_matching: Option<String>,
    /// Fail every `write`
    pub fail_write: bool,
    pub purge_errors: Vec<String>,
    pub purged: bool,
}

impl Default for DatabaseState {
    fn default() -> Self {
        DatabaseState {
            rows: Vec::new(),
            write_log: Vec::new(),
            executed: Vec::new(),
            next_rank: 1,
            fail_run_matching: None,
            fail_write: false,
            purge_errors: Vec::new(),
            purged: false,
        }
    }
}

pub struct MemoryDatabase {
    state: Arc<Mutex<DatabaseState>>,
}

impl MemoryDatabase {
    pub fn new() -> (MemoryDatabase, Arc<Mutex<DatabaseState>>) {
        let state = Arc::new(Mutex::new(DatabaseState::default()));
        (MemoryDatabase { state: state.clone() }, state)
    }
}

/// Seed one applied ledger row, assigning the next rank.
pub fn seed_row(
    state: &Arc<Mutex<DatabaseState>>,
    mode: Direction,
    version: &str,
    description: &str,
    checksum: &str,
    success: bool,
) {
    let mut state = state.lock().unwrap();
    let rank = state.next_rank;
    state.next_rank += 1;
    state.rows.push(HistoryRow {
        rank: Some(rank),
        mode,
        version: version.to_string(),
        script_name: format!("{}_{}.sql", version, description),
        description: description.to_string(),
        checksum: checksum.to_string(),
        applied_by: "tester".to_string(),
        applied_at: chrono::Utc::now(),
        execution_time_ms: 5,
        success,
    });
}

#[async_trait]
impl DatabaseDriver for MemoryDatabase {
    async fn read(&mut self) -> MigrateResult<Vec<HistoryRow>> {
        let state = self.state.lock().unwrap();
        let mut latest: HashMap<(String, Direction), HistoryRow> = HashMap::new();
        for row in &state.rows {
            let key = (row.version.clone(), row.mode);
            let replace = latest
                .get(&key)
                .map_or(true, |current| row.rank > current.rank);
            if replace {
                latest.insert(key, row.clone());
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn write(&mut self, row: &mut HistoryRow) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write {
            return Err(MigrateError::Database("ledger write refused".to_string()));
        }

        if row.applied_by.is_empty() {
            row.applied_by = "tester".to_string();
        }

        match row.rank {
            None => {
                row.rank = Some(state.next_rank);
                state.next_rank += 1;
                state.rows.push(row.clone());
            }
            Some(rank) => {
                if let Some(existing) =
                    state.rows.iter_mut().find(|existing| existing.rank == Some(rank))
                {
                    *existing = row.clone();
                } else {
                    state.rows.push(row.clone());
                }
            }
        }

        state.write_log.push(row.clone());
        Ok(())
    }

    async fn run(&mut self, sql: &str) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(pattern) = &state.fail_run_matching {
            if sql.contains(pattern.as_str()) {
                return Err(MigrateError::Database("script execution failed".to_string()));
            }
        }
        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn purge(&mut self) -> Vec<MigrateError> {
        let mut state = self.state.lock().unwrap();
        state.purged = true;
        state.rows.clear();
        state
            .purge_errors
            .iter()
            .map(|message| MigrateError::Database(message.clone()))
            .collect()
    }

    async fn close(&mut self) -> MigrateResult<()> {
        Ok(())
    }
}
