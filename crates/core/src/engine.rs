//! Reconciliation and execution engine
//!
//! `Migrator` merges source scripts and ledger history into one authoritative
//! ordered `version → Migration` structure, then drives forward (migrate) and
//! backward (rollback) execution over it with fail-fast semantics. Each
//! engine instance is owned by a single caller; migrations are applied
//! strictly one at a time in natural-sort version order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use crate::database::{DatabaseDriver, HistoryRow, Locker};
use crate::error::{MigrateError, MigrateResult};
use crate::hooks::Hooks;
use crate::migration::Migration;
use crate::natsort;
use crate::registry::DriverRegistry;
use crate::script::{Direction, Script};
use crate::source::{SourceDriver, SourceEntry};
use crate::state::State;

/// The schema-migration engine.
pub struct Migrator {
    database: Box<dyn DatabaseDriver>,
    source: Box<dyn SourceDriver>,

    versions: Vec<String>,
    migrations: HashMap<String, Migration>,

    latest_error: Option<MigrateError>,
    unpaired_reverses: usize,

    latest_source_version: Option<String>,
    latest_database_version: Option<String>,

    hooks: Hooks,
}

impl Migrator {
    /// Open both drivers through the registry and run the first
    /// reconciliation. Reconciliation failures are returned immediately.
    pub async fn open(
        registry: &DriverRegistry,
        database_url: &str,
        source_url: &str,
    ) -> MigrateResult<Migrator> {
        let database = registry.open_database(database_url).await?;
        let source = registry.open_source(source_url)?;

        let mut migrator = Migrator::with_drivers(database, source);
        migrator.refresh().await?;
        Ok(migrator)
    }

    /// Wrap existing driver instances. The caller must run [`refresh`] before
    /// the first operation.
    ///
    /// [`refresh`]: Migrator::refresh
    pub fn with_drivers(
        database: Box<dyn DatabaseDriver>,
        source: Box<dyn SourceDriver>,
    ) -> Migrator {
        Migrator {
            database,
            source,
            versions: Vec::new(),
            migrations: HashMap::new(),
            latest_error: None,
            unpaired_reverses: 0,
            latest_source_version: None,
            latest_database_version: None,
            hooks: Hooks::new(),
        }
    }

    /// Merge the given hooks into the installed ones, field by field.
    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks.merge(hooks);
    }

    /// Remove every installed hook.
    pub fn clear_hooks(&mut self) {
        self.hooks = Hooks::new();
    }

    /// Advisory lock capability of the database driver, when exposed.
    pub fn locker(&mut self) -> Option<&mut dyn Locker> {
        self.database.locker()
    }

    /// Rebuild the version map from a fresh scan of source and ledger.
    ///
    /// Failures are sticky: they are recorded and replayed by [`get`],
    /// [`migrate`] and [`rollback`] until a later refresh succeeds.
    ///
    /// [`get`]: Migrator::get
    /// [`migrate`]: Migrator::migrate
    /// [`rollback`]: Migrator::rollback
    pub async fn refresh(&mut self) -> MigrateResult<()> {
        self.versions.clear();
        self.migrations.clear();
        self.latest_error = None;
        self.unpaired_reverses = 0;
        self.latest_source_version = None;
        self.latest_database_version = None;

        let result = self.rebuild().await;
        if let Err(err) = &result {
            self.latest_error = Some(err.clone());
        }
        result
    }

    /// The ordered migration list, or the error recorded by the most recent
    /// reconciliation attempt.
    pub fn get(&self) -> MigrateResult<Vec<&Migration>> {
        if let Some(err) = &self.latest_error {
            return Err(err.clone());
        }

        Ok(self
            .versions
            .iter()
            .filter_map(|version| self.migrations.get(version))
            .collect())
    }

    /// Apply pending migrations in ascending version order.
    ///
    /// `steps` bounds how many eligible migrations are applied; negative
    /// means unlimited. Stops with [`MigrateError::ManualCleanupNeeded`] when
    /// the next eligible migration already carries a failed state.
    pub async fn migrate(&mut self, steps: i64) -> MigrateResult<()> {
        if let Some(err) = &self.latest_error {
            return Err(err.clone());
        }

        let versions = self.versions.clone();
        let mut count = 0i64;

        for version in &versions {
            let Some(migration) = self.migrations.get_mut(version) else {
                continue;
            };
            let state = migration.state;

            // a failed migration that was not rolled back blocks everything
            // after it until resolved out-of-band
            if state.is_failed() && !state.is_undone() {
                return Err(MigrateError::ManualCleanupNeeded(migration.version.clone()));
            }

            if (!state.is_pending() && !state.is_undone()) || state.is_ignored() {
                continue;
            }

            count += 1;
            if steps >= 0 && count > steps {
                break;
            }

            let Some(advance) = migration.advance_script.as_mut() else {
                continue;
            };
            let checksum = advance.checksum()?;
            let sql = advance.sql()?;
            let script_name = advance.identifier.clone();

            let mut row = HistoryRow::attempt(
                Direction::Advance,
                &migration.version,
                &script_name,
                &migration.description,
                &checksum,
            );

            self.hooks.run_pre_migrate(migration);

            // placeholder row first, so the attempt is on record even if the
            // process dies mid-script
            if let Err(err) = self.database.write(&mut row).await {
                fail_migrate(migration);
                self.hooks.run_migrate_error(migration, &err);
                return Err(err);
            }
            migration.applied_by = Some(row.applied_by.clone());
            migration.applied_at = Some(row.applied_at);

            let started = Instant::now();
            if let Err(err) = self.database.run(&sql).await {
                fail_migrate(migration);
                self.hooks.run_migrate_error(migration, &err);
                return Err(err);
            }
            let execution_time_ms = started.elapsed().as_millis() as i64;

            migration.execution_time_ms = Some(execution_time_ms);
            migration.state.remove(State::PENDING);
            migration.state.remove(State::UNDONE);

            row.execution_time_ms = execution_time_ms;
            row.success = true;
            if let Err(err) = self.database.write(&mut row).await {
                fail_migrate(migration);
                self.hooks.run_migrate_error(migration, &err);
                return Err(err);
            }

            migration.state.remove(State::FAILED);
            migration.state.insert(State::SUCCESS);
            tracing::debug!(version = %migration.version, execution_time_ms, "migration applied");
            self.hooks.run_post_migrate(migration);
        }

        Ok(())
    }

    /// Revert applied migrations in descending version order.
    ///
    /// Only migrations that are currently available (a reverse script exists
    /// and no unreverted migration follows) and not already undone are
    /// eligible. `steps` bounds how many reversions occur; negative means
    /// unlimited.
    pub async fn rollback(&mut self, steps: i64) -> MigrateResult<()> {
        if let Some(err) = &self.latest_error {
            return Err(err.clone());
        }

        let versions = self.versions.clone();
        let mut count = 0i64;

        for version in versions.iter().rev() {
            if steps >= 0 && count >= steps {
                break;
            }

            let Some(migration) = self.migrations.get_mut(version) else {
                continue;
            };
            if !migration.state.is_available() || migration.state.is_undone() {
                continue;
            }

            count += 1;

            let Some(reverse) = migration.reverse_script.as_mut() else {
                continue;
            };
            let checksum = reverse.checksum()?;
            let sql = reverse.sql()?;
            let script_name = reverse.identifier.clone();

            let mut row = HistoryRow::attempt(
                Direction::Reverse,
                &migration.version,
                &script_name,
                &migration.description,
                &checksum,
            );

            self.hooks.run_pre_rollback(migration);

            if let Err(err) = self.database.write(&mut row).await {
                migration.state.insert(State::FAILED);
                self.hooks.run_rollback_error(migration, &err);
                return Err(err);
            }

            let started = Instant::now();
            if let Err(err) = self.database.run(&sql).await {
                migration.state.insert(State::FAILED);
                self.hooks.run_rollback_error(migration, &err);
                return Err(err);
            }
            let execution_time_ms = started.elapsed().as_millis() as i64;

            migration.execution_time_ms = Some(execution_time_ms);
            migration.state.insert(State::PENDING);

            row.execution_time_ms = execution_time_ms;
            row.success = true;
            if let Err(err) = self.database.write(&mut row).await {
                migration.state.insert(State::FAILED);
                self.hooks.run_rollback_error(migration, &err);
                return Err(err);
            }

            migration.state.insert(State::UNDONE);
            tracing::debug!(version = %migration.version, execution_time_ms, "migration reverted");
            self.hooks.run_post_rollback(migration);
        }

        Ok(())
    }

    /// Create the next migration file (or advance/reverse pair) in the
    /// source, named `<next-version>_<name>`, zero-padded to five digits.
    pub fn create(&mut self, name: &str, with_reverse: bool) -> MigrateResult<Vec<String>> {
        let latest_source = parse_sequential(self.latest_source_version.as_deref())?;
        let latest_database = parse_sequential(self.latest_database_version.as_deref())?;

        if latest_source < latest_database {
            return Err(MigrateError::Create(
                "outdated source migrations: the database is ahead of the source".to_string(),
            ));
        }

        let base = format!("{:05}_{}", latest_source + 1, name);
        let files = if with_reverse {
            vec![format!("{}.adv.sql", base), format!("{}.rev.sql", base)]
        } else {
            vec![format!("{}.sql", base)]
        };

        let mut created = false;
        for (index, file) in files.iter().enumerate() {
            if let Err(err) = self.source.touch(file) {
                // do not leave an orphaned half-pair behind
                if created && index > 0 {
                    self.source.remove(&files[0])?;
                }
                return Err(err);
            }
            created = true;
        }

        Ok(files)
    }

    /// Drop every managed database object, reporting all sub-errors at once.
    pub async fn purge(&mut self) -> MigrateResult<()> {
        let errors = self.database.purge().await;
        if !errors.is_empty() {
            return Err(MigrateError::Purge(
                errors.into_iter().map(|e| e.to_string()).collect(),
            ));
        }
        Ok(())
    }

    /// Release both drivers.
    pub async fn close(&mut self) -> MigrateResult<()> {
        self.source.close()?;
        self.database.close().await
    }

    async fn rebuild(&mut self) -> MigrateResult<()> {
        self.source.reset()?;
        while let Some(entry) = self.source.next_entry()? {
            self.append_source(entry)?;
        }

        if self.unpaired_reverses > 0 {
            let mut unpaired: Vec<String> = self
                .versions
                .iter()
                .filter_map(|version| self.migrations.get(version))
                .filter(|migration| migration.advance_script.is_none())
                .filter_map(|migration| {
                    migration
                        .reverse_script
                        .as_ref()
                        .map(|script| script.identifier.clone())
                })
                .collect();
            natsort::sort(&mut unpaired);
            return Err(MigrateError::UnpairedReverse(unpaired));
        }

        // fold in rank order so the latest attempt per version wins
        let mut history = self.database.read().await?;
        history.sort_by_key(|row| row.rank.unwrap_or(i64::MAX));
        for row in history {
            self.append_history(row)?;
        }

        natsort::sort(&mut self.versions);

        // a version can only be rolled back when everything after it can be
        // (or already was); clear availability below the first gap
        let mut unavailable = false;
        for version in self.versions.iter().rev() {
            if let Some(migration) = self.migrations.get_mut(version) {
                if !migration.state.is_available() {
                    unavailable = true;
                } else if unavailable {
                    migration.state.remove(State::AVAILABLE);
                }
            }
        }

        self.detect_out_of_order()?;

        tracing::debug!(versions = self.versions.len(), "reconciliation complete");
        Ok(())
    }

    fn append_source(&mut self, entry: SourceEntry) -> MigrateResult<()> {
        let mut script = Script::parse(&entry.identifier)?;
        script.set_content(entry.content);

        let newer = match &self.latest_source_version {
            Some(current) => natsort::compare(&script.version, current) == Ordering::Greater,
            None => true,
        };
        if newer {
            self.latest_source_version = Some(script.version.clone());
        }

        let Some(migration) = self.migrations.get_mut(&script.version) else {
            let mut migration =
                Migration::new(script.version.clone(), script.description.clone(), State::PENDING);

            if script.direction == Direction::Reverse {
                self.unpaired_reverses += 1;
                migration.state = State::UNKNOWN;
                migration.reverse_script = Some(script);
            } else {
                migration.advance_script = Some(script);
            }

            self.versions.push(migration.version.clone());
            self.migrations.insert(migration.version.clone(), migration);
            return Ok(());
        };

        let duplicate = match script.direction {
            Direction::Advance => migration.advance_script.is_some(),
            Direction::Reverse => migration.reverse_script.is_some(),
        };
        if duplicate {
            return Err(MigrateError::DuplicateMigration(script.identifier));
        }

        let paired = migration
            .advance_script
            .as_ref()
            .or(migration.reverse_script.as_ref());
        if let Some(paired) = paired {
            if paired.description != script.description {
                return Err(MigrateError::DescriptionMismatch {
                    first: paired.identifier.clone(),
                    second: script.identifier.clone(),
                });
            }
        }

        if script.direction == Direction::Reverse {
            migration.reverse_script = Some(script);
            return Ok(());
        }

        migration.state.remove(State::MISSING);
        if migration.state.is_unknown() {
            migration.state.insert(State::PENDING);
        }
        migration.advance_script = Some(script);

        if migration.reverse_script.is_some() {
            self.unpaired_reverses -= 1;
        }

        Ok(())
    }

    fn append_history(&mut self, row: HistoryRow) -> MigrateResult<()> {
        if row.mode == Direction::Advance {
            let newer = match &self.latest_database_version {
                Some(current) => natsort::compare(&row.version, current) == Ordering::Greater,
                None => true,
            };
            if newer {
                self.latest_database_version = Some(row.version.clone());
            }
        }

        let Some(migration) = self.migrations.get_mut(&row.version) else {
            // a revert with no current advance pairing is not an anomaly
            if row.mode == Direction::Reverse {
                return Ok(());
            }

            // ledger entry with no corresponding source script
            let state = if row.success {
                State::SUCCESS | State::MISSING
            } else {
                State::FAILED | State::MISSING
            };
            let mut migration = Migration::new(row.version.clone(), row.description.clone(), state);
            migration.applied_by = Some(row.applied_by);
            migration.applied_at = Some(row.applied_at);
            migration.execution_time_ms = Some(row.execution_time_ms);

            self.versions.push(migration.version.clone());
            self.migrations.insert(migration.version.clone(), migration);
            return Ok(());
        };

        if migration.description != row.description {
            return Err(MigrateError::DescriptionMismatch {
                first: migration.description.clone(),
                second: row.description.clone(),
            });
        }

        match row.mode {
            Direction::Advance => {
                migration.state = if row.success { State::SUCCESS } else { State::FAILED };
                migration.applied_by = Some(row.applied_by.clone());
                migration.applied_at = Some(row.applied_at);
                migration.execution_time_ms = Some(row.execution_time_ms);

                // the ledger records the advance checksum; a mismatch means
                // the source script drifted after it was applied
                if let Some(advance) = migration.advance_script.as_mut() {
                    let source_checksum = advance.checksum()?;
                    if !row.checksum.is_empty()
                        && !source_checksum.is_empty()
                        && source_checksum != row.checksum
                    {
                        migration.state.insert(State::FUTURE);
                    }
                }
            }
            Direction::Reverse => {
                if row.success {
                    migration.state.insert(State::PENDING | State::UNDONE);
                } else {
                    migration.state.insert(State::FAILED);
                }
            }
        }

        if migration.reverse_script.is_some() {
            migration.state.insert(State::AVAILABLE);
        }

        Ok(())
    }

    fn detect_out_of_order(&self) -> MigrateResult<()> {
        let currently_applied = |migration: &Migration| {
            (migration.state.is_success() || migration.state.is_failed())
                && !migration.state.is_undone()
        };
        let never_applied = |migration: &Migration| {
            migration.state.is_pending()
                && !migration.state.is_success()
                && !migration.state.is_failed()
                && !migration.state.is_undone()
        };

        let last_applied = self
            .versions
            .iter()
            .rev()
            .filter_map(|version| self.migrations.get(version))
            .find(|migration| currently_applied(migration));
        let Some(last_applied) = last_applied else {
            return Ok(());
        };

        for version in &self.versions {
            if natsort::compare(version, &last_applied.version) != Ordering::Less {
                break;
            }
            if let Some(migration) = self.migrations.get(version) {
                if never_applied(migration) {
                    return Err(MigrateError::OutOfOrder {
                        pending: migration.version.clone(),
                        applied: last_applied.version.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

// a migrate-direction failure is terminal: the version is no longer pending
// or undone, and its failed flag blocks every later version
fn fail_migrate(migration: &mut Migration) {
    migration.state.remove(State::PENDING);
    migration.state.remove(State::UNDONE);
    migration.state.remove(State::SUCCESS);
    migration.state.insert(State::FAILED);
}

fn parse_sequential(version: Option<&str>) -> MigrateResult<u64> {
    match version {
        None => Ok(0),
        Some(version) => version.parse::<u64>().map_err(|_| {
            MigrateError::Create("create only supports sequential version names".to_string())
        }),
    }
}
