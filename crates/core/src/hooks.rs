//! Execution hooks
//!
//! Six optional callbacks invoked synchronously around migrate and rollback
//! of each migration. Merging is an explicit per-field check: fields left
//! unset keep the previously installed callback.

use crate::error::MigrateError;
use crate::migration::Migration;

/// Callback receiving the current migration snapshot.
pub type MigrationHook = Box<dyn Fn(&Migration) + Send + Sync>;
/// Callback receiving the failing migration and the error.
pub type MigrationErrorHook = Box<dyn Fn(&Migration, &MigrateError) + Send + Sync>;

/// Optional callbacks around migrate and rollback execution.
#[derive(Default)]
pub struct Hooks {
    pub pre_migrate: Option<MigrationHook>,
    pub post_migrate: Option<MigrationHook>,
    pub migrate_error: Option<MigrationErrorHook>,

    pub pre_rollback: Option<MigrationHook>,
    pub post_rollback: Option<MigrationHook>,
    pub rollback_error: Option<MigrationErrorHook>,
}

impl Hooks {
    pub fn new() -> Hooks {
        Hooks::default()
    }

    /// Merge `other` into `self`, field by field; unset fields are kept.
    pub fn merge(&mut self, other: Hooks) {
        if let Some(hook) = other.pre_migrate {
            self.pre_migrate = Some(hook);
        }
        if let Some(hook) = other.post_migrate {
            self.post_migrate = Some(hook);
        }
        if let Some(hook) = other.migrate_error {
            self.migrate_error = Some(hook);
        }
        if let Some(hook) = other.pre_rollback {
            self.pre_rollback = Some(hook);
        }
        if let Some(hook) = other.post_rollback {
            self.post_rollback = Some(hook);
        }
        if let Some(hook) = other.rollback_error {
            self.rollback_error = Some(hook);
        }
    }

    pub(crate) fn run_pre_migrate(&self, migration: &Migration) {
        if let Some(hook) = &self.pre_migrate {
            hook(migration);
        }
    }

    pub(crate) fn run_post_migrate(&self, migration: &Migration) {
        if let Some(hook) = &self.post_migrate {
            hook(migration);
        }
    }

    pub(crate) fn run_migrate_error(&self, migration: &Migration, err: &MigrateError) {
        if let Some(hook) = &self.migrate_error {
            hook(migration, err);
        }
    }

    pub(crate) fn run_pre_rollback(&self, migration: &Migration) {
        if let Some(hook) = &self.pre_rollback {
            hook(migration);
        }
    }

    pub(crate) fn run_post_rollback(&self, migration: &Migration) {
        if let Some(hook) = &self.post_rollback {
            hook(migration);
        }
    }

    pub(crate) fn run_rollback_error(&self, migration: &Migration, err: &MigrateError) {
        if let Some(hook) = &self.rollback_error {
            hook(migration, err);
        }
    }
}
