//! Configuration loading
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags, `STRATUM_*` environment variables, and the `stratum.toml` config
//! file. Table options from the file are folded into the database URL as
//! `x-*` engine parameters unless the URL already carries them.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use url::Url;

use crate::error::CliError;

pub const DEFAULT_CONFIG_FILE: &str = "stratum.toml";
pub const DEFAULT_SOURCE_URL: &str = "file://migrations";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct FileConfig {
    database_url: Option<String>,
    source_url: Option<String>,
    history_table: Option<String>,
    locking_table: Option<String>,
    without_locking: bool,
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub source_url: String,
}

/// Values taken from command-line flags.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub database_url: Option<String>,
    pub source_url: Option<String>,
}

pub fn load(overrides: &Overrides) -> Result<Config, CliError> {
    let file = match &overrides.config {
        Some(path) => read_file(path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                read_file(Path::new(DEFAULT_CONFIG_FILE))?
            } else {
                FileConfig::default()
            }
        }
    };

    let database_url = overrides
        .database_url
        .clone()
        .or_else(|| env::var("STRATUM_DATABASE_URL").ok())
        .or_else(|| file.database_url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "database url is not set (use --database-url, STRATUM_DATABASE_URL, or stratum.toml)"
                    .to_string(),
            )
        })?;

    let source_url = overrides
        .source_url
        .clone()
        .or_else(|| env::var("STRATUM_SOURCE_URL").ok())
        .or_else(|| file.source_url.clone())
        .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());

    let config = Config {
        database_url: apply_engine_options(&database_url, &file)?,
        source_url,
    };
    tracing::debug!(source = %config.source_url, "configuration resolved");
    Ok(config)
}

fn read_file(path: &Path) -> Result<FileConfig, CliError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| CliError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

fn apply_engine_options(database_url: &str, file: &FileConfig) -> Result<String, CliError> {
    if file.history_table.is_none() && file.locking_table.is_none() && !file.without_locking {
        return Ok(database_url.to_string());
    }

    let mut url = Url::parse(database_url)
        .map_err(|e| CliError::Config(format!("invalid database url: {}", e)))?;
    let has_option = |url: &Url, key: &str| url.query_pairs().any(|(k, _)| k == key);

    // the URL wins over the config file when both name an option
    let mut append: Vec<(String, Option<String>)> = Vec::new();
    if let Some(table) = &file.history_table {
        if !has_option(&url, "x-history-table") {
            append.push(("x-history-table".to_string(), Some(table.clone())));
        }
    }
    if let Some(table) = &file.locking_table {
        if !has_option(&url, "x-locking-table") {
            append.push(("x-locking-table".to_string(), Some(table.clone())));
        }
    }
    if file.without_locking && !has_option(&url, "x-without-locking") {
        append.push(("x-without-locking".to_string(), None));
    }

    if !append.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &append {
            match value {
                Some(value) => {
                    pairs.append_pair(key, value);
                }
                None => {
                    pairs.append_key_only(key);
                }
            }
        }
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_config() {
        let file: FileConfig = toml::from_str(
            r#"
            database-url = "postgres://app@localhost/shop"
            source-url = "file://migrations"
            history-table = "ledger"
            without-locking = true
            "#,
        )
        .unwrap();
        assert_eq!(file.database_url.as_deref(), Some("postgres://app@localhost/shop"));
        assert_eq!(file.history_table.as_deref(), Some("ledger"));
        assert!(file.without_locking);
    }

    #[test]
    fn file_options_fold_into_the_url() {
        let file = FileConfig {
            history_table: Some("ledger".to_string()),
            without_locking: true,
            ..FileConfig::default()
        };
        let url = apply_engine_options("postgres://localhost/shop", &file).unwrap();
        assert!(url.contains("x-history-table=ledger"));
        assert!(url.contains("x-without-locking"));
    }

    #[test]
    fn url_options_win_over_file_options() {
        let file = FileConfig {
            history_table: Some("ledger".to_string()),
            ..FileConfig::default()
        };
        let url =
            apply_engine_options("postgres://localhost/shop?x-history-table=other", &file).unwrap();
        assert_eq!(url.matches("x-history-table").count(), 1);
        assert!(url.contains("x-history-table=other"));
    }

    #[test]
    fn reads_config_from_an_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratum.toml");
        fs::write(
            &path,
            "database-url = \"postgres://app@localhost/shop\"\nsource-url = \"file://db/sql\"\n",
        )
        .unwrap();

        let file = read_file(&path).unwrap();
        assert_eq!(file.database_url.as_deref(), Some("postgres://app@localhost/shop"));
        assert_eq!(file.source_url.as_deref(), Some("file://db/sql"));

        let err = read_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn bare_url_passes_through_untouched() {
        let url = apply_engine_options("postgres://localhost/shop", &FileConfig::default()).unwrap();
        assert_eq!(url, "postgres://localhost/shop");
    }
}
