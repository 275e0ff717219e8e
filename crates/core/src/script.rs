//! Migration scripts
//!
//! A `Script` describes a single migration file: its version, identifier,
//! description and direction, parsed from the filename grammar
//! `^(\d+)(_\w*)?(\.(adv|rev))?\.sql$`, plus the script content as a one-shot
//! stream. Hashing the content consumes the stream, so the first read buffers
//! everything in memory; later reads replay from the buffer.

use std::fmt;
use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{MigrateError, MigrateResult};

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:_(\w*))?(?:\.(adv|rev))?\.sql$").expect("valid pattern"));

/// Direction of a migration script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Forward migration
    Advance,
    /// Undoes the advance migration of the same version
    Reverse,
}

impl Direction {
    /// Wire representation used in the history ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Advance => "ADV",
            Direction::Reverse => "REV",
        }
    }

    /// Parse the ledger wire representation.
    pub fn from_mode(mode: &str) -> Option<Direction> {
        match mode {
            "ADV" => Some(Direction::Advance),
            "REV" => Some(Direction::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Content {
    Absent,
    Stream(Box<dyn Read + Send>),
    Buffered(Vec<u8>),
}

/// A single migration script parsed from a source entry.
pub struct Script {
    /// Version string, the natural-sort key (not necessarily zero-padded)
    pub version: String,
    /// Full identifier as reported by the source
    pub identifier: String,
    /// Free-text description extracted from the identifier
    pub description: String,
    /// Script direction, advance unless tagged `.rev`
    pub direction: Direction,

    content: Content,
    checksum: Option<String>,
}

impl Script {
    /// Parse an identifier into a script without content.
    ///
    /// Fails with [`MigrateError::Parse`] when the identifier does not match
    /// the migration filename grammar.
    pub fn parse(identifier: &str) -> MigrateResult<Script> {
        let captures = IDENTIFIER_PATTERN
            .captures(identifier)
            .ok_or_else(|| MigrateError::Parse(identifier.to_string()))?;

        let direction = match captures.get(3).map(|m| m.as_str()) {
            Some("rev") => Direction::Reverse,
            _ => Direction::Advance,
        };

        Ok(Script {
            version: captures[1].to_string(),
            identifier: identifier.to_string(),
            description: captures.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
            direction,
            content: Content::Absent,
            checksum: None,
        })
    }

    /// Attach the one-shot content stream.
    pub fn set_content(&mut self, reader: Box<dyn Read + Send>) {
        self.content = Content::Stream(reader);
        self.checksum = None;
    }

    /// Content-addressed integrity hash (SHA-256, hex).
    ///
    /// Computed once; the stream is drained into an in-memory buffer, so the
    /// content stays readable afterwards.
    pub fn checksum(&mut self) -> MigrateResult<String> {
        if let Some(checksum) = &self.checksum {
            return Ok(checksum.clone());
        }

        let content = self.buffer()?;
        let digest = Sha256::digest(content);
        let checksum = hex::encode(digest);
        self.checksum = Some(checksum.clone());
        Ok(checksum)
    }

    /// Full script text for execution.
    pub fn sql(&mut self) -> MigrateResult<String> {
        let content = self.buffer()?;
        Ok(String::from_utf8_lossy(content).into_owned())
    }

    fn buffer(&mut self) -> MigrateResult<&[u8]> {
        if let Content::Stream(reader) = &mut self.content {
            let mut buffered = Vec::new();
            reader
                .read_to_end(&mut buffered)
                .map_err(|e| MigrateError::Source(format!("failed to read {}: {}", self.identifier, e)))?;
            // drops the reader, releasing the underlying resource
            self.content = Content::Buffered(buffered);
        }

        match &self.content {
            Content::Buffered(buffered) => Ok(buffered),
            Content::Absent => Err(MigrateError::Source(format!(
                "no content attached to {}",
                self.identifier
            ))),
            Content::Stream(_) => unreachable!("stream buffered above"),
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("version", &self.version)
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("direction", &self.direction)
            .field("checksum", &self.checksum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn with_content(identifier: &str, content: &str) -> Script {
        let mut script = Script::parse(identifier).unwrap();
        script.set_content(Box::new(Cursor::new(content.as_bytes().to_vec())));
        script
    }

    #[test]
    fn parses_full_identifier() {
        let script = Script::parse("00001_create_users.adv.sql").unwrap();
        assert_eq!(script.version, "00001");
        assert_eq!(script.description, "create_users");
        assert_eq!(script.direction, Direction::Advance);
        assert_eq!(script.identifier, "00001_create_users.adv.sql");
    }

    #[test]
    fn reverse_tag_sets_direction() {
        let script = Script::parse("00001_create_users.rev.sql").unwrap();
        assert_eq!(script.direction, Direction::Reverse);
    }

    #[test]
    fn missing_tag_defaults_to_advance() {
        let script = Script::parse("00002_add_index.sql").unwrap();
        assert_eq!(script.direction, Direction::Advance);
        assert_eq!(script.description, "add_index");
    }

    #[test]
    fn description_is_optional() {
        let script = Script::parse("42.sql").unwrap();
        assert_eq!(script.version, "42");
        assert_eq!(script.description, "");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for bad in ["create_users.sql", "x00001.sql", "00001_users", "00001_users.fwd.sql", ""] {
            assert!(
                matches!(Script::parse(bad), Err(MigrateError::Parse(_))),
                "expected parse failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn checksum_is_stable_and_content_replayable() {
        let mut script = with_content("00001_a.sql", "CREATE TABLE a (id INT);");
        let first = script.checksum().unwrap();
        let second = script.checksum().unwrap();
        assert_eq!(first, second);

        // hashing consumed the stream; the buffered content must replay intact
        assert_eq!(script.sql().unwrap(), "CREATE TABLE a (id INT);");
        assert_eq!(script.checksum().unwrap(), first);
    }

    #[test]
    fn checksum_differs_per_content() {
        let mut a = with_content("00001_a.sql", "CREATE TABLE a (id INT);");
        let mut b = with_content("00001_a.sql", "CREATE TABLE b (id INT);");
        assert_ne!(a.checksum().unwrap(), b.checksum().unwrap());
    }

    #[test]
    fn missing_content_is_an_error() {
        let mut script = Script::parse("00001_a.sql").unwrap();
        assert!(script.checksum().is_err());
    }
}
