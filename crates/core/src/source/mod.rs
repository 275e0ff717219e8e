//! Source driver contract
//!
//! A source driver streams raw migration entries (identifier + one-shot
//! content stream) and supports creating and removing entries so `create`
//! can materialize new migration files. Iteration is a streaming pull:
//! `next_entry` yields entries until `Ok(None)`; `reset` rewinds the stream
//! so a refresh can re-drain from scratch.

use std::io::Read;

use url::Url;

use crate::error::MigrateResult;

pub mod file;

pub use file::{FileSource, FileSourceFactory};

/// One raw migration entry as reported by a source driver.
pub struct SourceEntry {
    /// Entry name, matched against the migration filename grammar
    pub identifier: String,
    /// One-shot content stream, ownership transfers to the caller
    pub content: Box<dyn Read + Send>,
}

/// Boundary to a source of migration scripts.
pub trait SourceDriver: Send {
    /// Advance the stream and return the next entry, or `None` when
    /// exhausted. Iteration failures surface as errors.
    fn next_entry(&mut self) -> MigrateResult<Option<SourceEntry>>;

    /// Create an empty entry with the given name.
    fn touch(&mut self, name: &str) -> MigrateResult<()>;

    /// Delete the entry with the given name.
    fn remove(&mut self, name: &str) -> MigrateResult<()>;

    /// Rewind the stream so the next `next_entry` starts over from a fresh
    /// scan of the source.
    fn reset(&mut self) -> MigrateResult<()>;

    /// Release any held resources.
    fn close(&mut self) -> MigrateResult<()> {
        Ok(())
    }
}

/// Opens source drivers for one URL scheme.
pub trait SourceFactory: Send + Sync {
    /// Scheme this factory serves, e.g. `file`.
    fn scheme(&self) -> &'static str;

    fn open(&self, url: &Url) -> MigrateResult<Box<dyn SourceDriver>>;
}
