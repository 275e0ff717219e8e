//! Driver registry
//!
//! An explicit registry value constructed once at startup and handed to the
//! engine. Factories register under a unique URL scheme; duplicate or empty
//! schemes are configuration errors surfaced at registration time, not
//! panics against global state.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::database::{
    DatabaseConfig, DatabaseDriver, DatabaseFactory, PostgresFactory, DEFAULT_HISTORY_TABLE,
    DEFAULT_LOCKING_TABLE,
};
use crate::error::{MigrateError, MigrateResult};
use crate::source::{FileSourceFactory, SourceDriver, SourceFactory};

/// Registry of source and database driver factories, keyed by URL scheme.
pub struct DriverRegistry {
    sources: HashMap<String, Arc<dyn SourceFactory>>,
    databases: HashMap<String, Arc<dyn DatabaseFactory>>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> DriverRegistry {
        DriverRegistry {
            sources: HashMap::new(),
            databases: HashMap::new(),
        }
    }

    /// Registry with the built-in drivers: `file://` sources and
    /// `postgres://` databases.
    pub fn with_defaults() -> DriverRegistry {
        let mut registry = DriverRegistry::new();
        registry
            .register_source(Arc::new(FileSourceFactory))
            .expect("built-in file source registers once");
        registry
            .register_database(Arc::new(PostgresFactory))
            .expect("built-in postgres driver registers once");
        registry
    }

    /// Register a source driver factory under its scheme.
    pub fn register_source(&mut self, factory: Arc<dyn SourceFactory>) -> MigrateResult<()> {
        let scheme = factory.scheme();
        if scheme.is_empty() {
            return Err(MigrateError::Registry("source driver scheme is empty".to_string()));
        }
        if self.sources.contains_key(scheme) {
            return Err(MigrateError::Registry(format!(
                "source driver '{}' is registered more than once",
                scheme
            )));
        }
        self.sources.insert(scheme.to_string(), factory);
        Ok(())
    }

    /// Register a database driver factory under its scheme.
    pub fn register_database(&mut self, factory: Arc<dyn DatabaseFactory>) -> MigrateResult<()> {
        let scheme = factory.scheme();
        if scheme.is_empty() {
            return Err(MigrateError::Registry("database driver scheme is empty".to_string()));
        }
        if self.databases.contains_key(scheme) {
            return Err(MigrateError::Registry(format!(
                "database driver '{}' is registered more than once",
                scheme
            )));
        }
        self.databases.insert(scheme.to_string(), factory);
        Ok(())
    }

    /// Open a source driver by URL.
    pub fn open_source(&self, url: &str) -> MigrateResult<Box<dyn SourceDriver>> {
        let url = Url::parse(url)?;
        let factory = self.sources.get(url.scheme()).ok_or_else(|| {
            MigrateError::UnknownDriver {
                kind: "source",
                scheme: url.scheme().to_string(),
            }
        })?;
        factory.open(&url)
    }

    /// Open a database driver by URL.
    ///
    /// Recognizes the engine options `x-history-table`, `x-locking-table`
    /// and `x-without-locking`; all `x-*` parameters are stripped before the
    /// URL reaches the driver.
    pub async fn open_database(&self, url: &str) -> MigrateResult<Box<dyn DatabaseDriver>> {
        let url = Url::parse(url)?;
        let factory = self.databases.get(url.scheme()).ok_or_else(|| {
            MigrateError::UnknownDriver {
                kind: "database",
                scheme: url.scheme().to_string(),
            }
        })?;
        factory.open(database_config(&url)).await
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        DriverRegistry::with_defaults()
    }
}

fn database_config(url: &Url) -> DatabaseConfig {
    let mut history_table = None;
    let mut locking_table = None;
    let mut without_locking = false;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "x-history-table" => history_table = Some(value.into_owned()),
            "x-locking-table" => locking_table = Some(value.into_owned()),
            "x-without-locking" => without_locking = true,
            _ => {}
        }
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("x-"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut cleaned = url.clone();
    cleaned.set_query(None);
    if !retained.is_empty() {
        let mut pairs = cleaned.query_pairs_mut();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
    }

    DatabaseConfig {
        url: cleaned,
        history_table: history_table.unwrap_or_else(|| DEFAULT_HISTORY_TABLE.to_string()),
        locking_table: if without_locking {
            None
        } else {
            Some(locking_table.unwrap_or_else(|| DEFAULT_LOCKING_TABLE.to_string()))
        },
    }
}
