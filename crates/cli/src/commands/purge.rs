use crate::config::Config;
use crate::error::CliError;
use crate::utils;

pub async fn run(config: &Config, force: bool) -> Result<(), CliError> {
    if !force {
        println!("Refusing to drop all managed objects without --force");
        return Ok(());
    }

    println!("Preparing...");
    // purge must work even when the migration state is broken, so skip the
    // initial reconciliation
    let mut migrator = utils::open_migrator_without_refresh(config).await?;
    migrator.purge().await?;

    println!("All managed objects dropped");
    Ok(())
}
