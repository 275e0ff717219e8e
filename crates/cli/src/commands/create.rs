use console::style;

use crate::config::Config;
use crate::error::CliError;
use crate::utils;

pub async fn run(config: &Config, name: &str, with_reverse: bool) -> Result<(), CliError> {
    let mut migrator = utils::open_migrator(config).await?;

    let files = migrator.create(name, with_reverse)?;

    println!("Migration files successfully created");
    for file in files {
        println!("{} {}", style("✔").green(), file);
    }

    Ok(())
}
