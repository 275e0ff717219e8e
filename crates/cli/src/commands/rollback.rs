use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use stratum_core::{Hooks, Migration};

use crate::config::Config;
use crate::error::CliError;
use crate::utils;

fn reverse_name(migration: &Migration) -> String {
    migration
        .reverse_script
        .as_ref()
        .map(|script| script.identifier.clone())
        .unwrap_or_else(|| migration.version.clone())
}

pub async fn run(config: &Config, steps: i64) -> Result<(), CliError> {
    println!("Preparing...");
    let mut migrator = utils::open_migrator(config).await?;

    let spinner = utils::spinner();
    let nothing_to_rollback = Arc::new(AtomicBool::new(true));

    let mut hooks = Hooks::new();
    let started = nothing_to_rollback.clone();
    let bar = spinner.clone();
    hooks.pre_rollback = Some(Box::new(move |migration| {
        started.store(false, Ordering::SeqCst);
        bar.set_message(reverse_name(migration));
        bar.enable_steady_tick(Duration::from_millis(100));
    }));
    let bar = spinner.clone();
    hooks.post_rollback = Some(Box::new(move |migration| {
        bar.println(format!(
            "{} {} ({}ms)",
            style("✔").green(),
            reverse_name(migration),
            migration.execution_time_ms.unwrap_or(0)
        ));
    }));
    let bar = spinner.clone();
    hooks.rollback_error = Some(Box::new(move |migration, _| {
        bar.println(format!("{} {}", style("✘").red(), reverse_name(migration)));
    }));
    migrator.set_hooks(hooks);

    let locked = utils::acquire_lock(&mut migrator).await?;
    let result = migrator.rollback(steps).await;
    utils::release_lock(&mut migrator, locked).await?;
    spinner.finish_and_clear();
    result?;

    if nothing_to_rollback.load(Ordering::SeqCst) {
        println!("Rollback is not available");
        return Ok(());
    }

    println!("Migration successfully reverted");
    Ok(())
}
