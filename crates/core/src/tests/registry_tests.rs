//! Driver registry registration and lookup rules

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::database::{DatabaseConfig, DatabaseDriver, DatabaseFactory};
use crate::error::{MigrateError, MigrateResult};
use crate::registry::DriverRegistry;
use crate::source::{SourceDriver, SourceFactory};

use super::mocks::{MemoryDatabase, MemorySource};

struct MemorySourceFactory {
    scheme: &'static str,
}

impl SourceFactory for MemorySourceFactory {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn open(&self, _url: &Url) -> MigrateResult<Box<dyn SourceDriver>> {
        let (source, _) = MemorySource::new(&[]);
        Ok(Box::new(source))
    }
}

struct MemoryDatabaseFactory {
    scheme: &'static str,
}

#[async_trait]
impl DatabaseFactory for MemoryDatabaseFactory {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    async fn open(&self, _config: DatabaseConfig) -> MigrateResult<Box<dyn DatabaseDriver>> {
        let (database, _) = MemoryDatabase::new();
        Ok(Box::new(database))
    }
}

#[test]
fn registers_and_opens_a_source_scheme() {
    let mut registry = DriverRegistry::new();
    registry
        .register_source(Arc::new(MemorySourceFactory { scheme: "mem" }))
        .unwrap();
    assert!(registry.open_source("mem://anywhere").is_ok());
}

#[test]
fn duplicate_source_registration_is_an_error() {
    let mut registry = DriverRegistry::new();
    registry
        .register_source(Arc::new(MemorySourceFactory { scheme: "mem" }))
        .unwrap();
    let err = registry
        .register_source(Arc::new(MemorySourceFactory { scheme: "mem" }))
        .unwrap_err();
    assert!(matches!(err, MigrateError::Registry(_)));
}

#[test]
fn duplicate_database_registration_is_an_error() {
    let mut registry = DriverRegistry::new();
    registry
        .register_database(Arc::new(MemoryDatabaseFactory { scheme: "mem" }))
        .unwrap();
    let err = registry
        .register_database(Arc::new(MemoryDatabaseFactory { scheme: "mem" }))
        .unwrap_err();
    assert!(matches!(err, MigrateError::Registry(_)));
}

#[test]
fn empty_scheme_is_rejected() {
    let mut registry = DriverRegistry::new();
    let err = registry
        .register_source(Arc::new(MemorySourceFactory { scheme: "" }))
        .unwrap_err();
    assert!(matches!(err, MigrateError::Registry(_)));
}

#[test]
fn unknown_source_scheme_fails() {
    let registry = DriverRegistry::new();
    let err = registry.open_source("nope://migrations").err().unwrap();
    match err {
        MigrateError::UnknownDriver { kind, scheme } => {
            assert_eq!(kind, "source");
            assert_eq!(scheme, "nope");
        }
        other => panic!("expected unknown driver error, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_database_scheme_fails() {
    let registry = DriverRegistry::new();
    let err = registry
        .open_database("nope://localhost/db")
        .await
        .err()
        .unwrap();
    match err {
        MigrateError::UnknownDriver { kind, scheme } => {
            assert_eq!(kind, "database");
            assert_eq!(scheme, "nope");
        }
        other => panic!("expected unknown driver error, got {:?}", other),
    }
}

#[test]
fn url_without_scheme_is_invalid() {
    let registry = DriverRegistry::new();
    let err = registry.open_source("just/a/path").err().unwrap();
    assert!(matches!(err, MigrateError::InvalidUrl(_)));
}

#[test]
fn default_registry_knows_the_builtin_schemes() {
    let mut registry = DriverRegistry::with_defaults();
    // re-registering a built-in scheme is still a duplicate
    let err = registry
        .register_source(Arc::new(MemorySourceFactory { scheme: "file" }))
        .unwrap_err();
    assert!(matches!(err, MigrateError::Registry(_)));
}
