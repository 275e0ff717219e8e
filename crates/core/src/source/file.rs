//! Filesystem source driver
//!
//! Scans one directory for migration files. Identifiers are bare file names;
//! subdirectories are skipped. `touch` and `remove` resolve against the
//! scanned directory.

use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{MigrateError, MigrateResult};
use crate::source::{SourceDriver, SourceEntry, SourceFactory};

/// Source driver reading migrations from a local directory.
pub struct FileSource {
    root: PathBuf,
    entries: Vec<String>,
    index: usize,
}

impl FileSource {
    /// Open a directory of migration files.
    pub fn open(root: impl Into<PathBuf>) -> MigrateResult<FileSource> {
        let mut source = FileSource {
            root: root.into(),
            entries: Vec::new(),
            index: 0,
        };
        source.scan()?;
        Ok(source)
    }

    /// Directory this driver reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&mut self) -> MigrateResult<()> {
        let mut entries = Vec::new();
        let dir = fs::read_dir(&self.root).map_err(|e| {
            MigrateError::Source(format!("failed to read {}: {}", self.root.display(), e))
        })?;

        for entry in dir {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }

        // deterministic iteration; the engine natural-sorts versions itself
        entries.sort();
        tracing::debug!(root = %self.root.display(), count = entries.len(), "scanned migration source");

        self.entries = entries;
        self.index = 0;
        Ok(())
    }
}

impl SourceDriver for FileSource {
    fn next_entry(&mut self) -> MigrateResult<Option<SourceEntry>> {
        let Some(name) = self.entries.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;

        let file = fs::File::open(self.root.join(name)).map_err(|e| {
            MigrateError::Source(format!("failed to open {}: {}", name, e))
        })?;

        Ok(Some(SourceEntry {
            identifier: name.clone(),
            content: Box::new(file),
        }))
    }

    fn touch(&mut self, name: &str) -> MigrateResult<()> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(name))
            .map_err(|e| MigrateError::Source(format!("failed to create {}: {}", name, e)))?;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> MigrateResult<()> {
        fs::remove_file(self.root.join(name))
            .map_err(|e| MigrateError::Source(format!("failed to remove {}: {}", name, e)))
    }

    fn reset(&mut self) -> MigrateResult<()> {
        self.scan()
    }
}

/// Factory for the `file://` scheme.
pub struct FileSourceFactory;

impl SourceFactory for FileSourceFactory {
    fn scheme(&self) -> &'static str {
        "file"
    }

    fn open(&self, url: &Url) -> MigrateResult<Box<dyn SourceDriver>> {
        // `file://migrations/sql` parses the first segment as a host; join it
        // back so relative paths work the way operators write them
        let mut root = PathBuf::new();
        if let Some(host) = url.host_str() {
            root.push(host);
        }
        let path = url.path();
        if !path.is_empty() && path != "/" {
            if root.as_os_str().is_empty() {
                root.push(path);
            } else {
                root.push(path.trim_start_matches('/'));
            }
        }

        Ok(Box::new(FileSource::open(root)?))
    }
}
