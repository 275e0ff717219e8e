use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use stratum_core::{Hooks, Migration};

use crate::config::Config;
use crate::error::CliError;
use crate::utils;

fn advance_name(migration: &Migration) -> String {
    migration
        .advance_script
        .as_ref()
        .map(|script| script.identifier.clone())
        .unwrap_or_else(|| migration.version.clone())
}

pub async fn run(config: &Config, steps: i64, fresh: bool) -> Result<(), CliError> {
    println!("Preparing...");
    let mut migrator = if fresh {
        // drop everything first, then reconcile against the empty database
        let mut migrator = utils::open_migrator_without_refresh(config).await?;
        migrator.purge().await?;
        migrator.refresh().await?;
        migrator
    } else {
        utils::open_migrator(config).await?
    };

    let spinner = utils::spinner();
    let nothing_to_migrate = Arc::new(AtomicBool::new(true));

    let mut hooks = Hooks::new();
    let started = nothing_to_migrate.clone();
    let bar = spinner.clone();
    hooks.pre_migrate = Some(Box::new(move |migration| {
        started.store(false, Ordering::SeqCst);
        bar.set_message(advance_name(migration));
        bar.enable_steady_tick(Duration::from_millis(100));
    }));
    let bar = spinner.clone();
    hooks.post_migrate = Some(Box::new(move |migration| {
        bar.println(format!(
            "{} {} ({}ms)",
            style("✔").green(),
            advance_name(migration),
            migration.execution_time_ms.unwrap_or(0)
        ));
    }));
    let bar = spinner.clone();
    hooks.migrate_error = Some(Box::new(move |migration, _| {
        bar.println(format!("{} {}", style("✘").red(), advance_name(migration)));
    }));
    migrator.set_hooks(hooks);

    let locked = utils::acquire_lock(&mut migrator).await?;
    let result = migrator.migrate(steps).await;
    utils::release_lock(&mut migrator, locked).await?;
    spinner.finish_and_clear();
    result?;

    if nothing_to_migrate.load(Ordering::SeqCst) {
        println!("Nothing to migrate");
        return Ok(());
    }

    println!("Database migration completed");
    Ok(())
}
