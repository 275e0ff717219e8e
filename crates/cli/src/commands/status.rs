use console::style;

use crate::config::Config;
use crate::error::CliError;
use crate::utils;

pub async fn run(config: &Config) -> Result<(), CliError> {
    println!("Preparing...");
    let migrator = utils::open_migrator(config).await?;

    let migrations = migrator.get()?;
    if migrations.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    for migration in migrations {
        let name = migration
            .advance_script
            .as_ref()
            .map(|script| script.identifier.as_str())
            .unwrap_or(migration.version.as_str());

        let state = migration.state;
        let label = state.to_string();
        let label = if state.is_failed() {
            style(label).red()
        } else if state.is_success() && !state.is_undone() {
            style(label).green()
        } else {
            style(label).yellow()
        };

        println!("{:<44} {}", name, label);
    }

    Ok(())
}
