//! Shared command helpers

use indicatif::ProgressBar;
use stratum_core::{DriverRegistry, Migrator};

use crate::config::Config;
use crate::error::CliError;

/// Open both drivers and run the initial reconciliation.
pub async fn open_migrator(config: &Config) -> Result<Migrator, CliError> {
    let registry = DriverRegistry::with_defaults();
    let migrator = Migrator::open(&registry, &config.database_url, &config.source_url).await?;
    Ok(migrator)
}

/// Open both drivers without reconciling, for operations that must work
/// against a broken migration state (purge).
pub async fn open_migrator_without_refresh(config: &Config) -> Result<Migrator, CliError> {
    let registry = DriverRegistry::with_defaults();
    let database = registry.open_database(&config.database_url).await?;
    let source = registry.open_source(&config.source_url)?;
    Ok(Migrator::with_drivers(database, source))
}

pub fn spinner() -> ProgressBar {
    ProgressBar::new_spinner()
}

/// Take the driver's advisory lock for the session, when it has one.
pub async fn acquire_lock(migrator: &mut Migrator) -> Result<bool, CliError> {
    if let Some(locker) = migrator.locker() {
        if locker.lockable() {
            locker.lock().await?;
            return Ok(true);
        }
    }
    Ok(false)
}

pub async fn release_lock(migrator: &mut Migrator, locked: bool) -> Result<(), CliError> {
    if locked {
        if let Some(locker) = migrator.locker() {
            locker.unlock().await?;
        }
    }
    Ok(())
}
