//! Sources list parsing
//!
//! A sources list is a UTF-8 text file mapping labels to paths:
//!
//! ```text
//! # system configuration
//! etc=/etc
//!
//! home = /home/alice
//! notes=/root/notes.txt
//! ```
//!
//! Lines are trimmed; blank lines and lines starting with `#` are skipped.
//! Every other line is split on its first `=` and both halves are trimmed.

use crate::error::{Result, StashError};
use crate::types::Source;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Separator between label and path
pub const SEPARATOR: char = '=';

/// Parses and validates label/path lists
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceCatalog;

impl SourceCatalog {
    /// Parse a sources file
    ///
    /// # Errors
    ///
    /// - [`StashError::SourcesFileMissing`] if `file` does not exist
    /// - [`StashError::SourceParse`] for a line without separator or label
    /// - [`StashError::SourcePathMissing`] for a path absent from disk
    /// - [`StashError::NoSources`] if no entry remains
    pub fn parse(file: &Path) -> Result<Vec<Source>> {
        if !file.exists() {
            return Err(StashError::SourcesFileMissing(file.to_path_buf()));
        }
        let content = fs::read_to_string(file)?;
        let sources = Self::parse_str(&content)?;
        debug!("Parsed {} sources from {:?}", sources.len(), file);
        Ok(sources)
    }

    /// Parse sources list content
    pub fn parse_str(content: &str) -> Result<Vec<Source>> {
        let mut sources = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (label, path) = line
                .split_once(SEPARATOR)
                .map(|(l, p)| (l.trim(), p.trim()))
                .filter(|(l, _)| !l.is_empty())
                .ok_or_else(|| StashError::SourceParse {
                    line: idx + 1,
                    text: line.to_string(),
                })?;

            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(StashError::SourcePathMissing(path));
            }

            if !seen.insert(label.to_string()) {
                warn!(
                    "Duplicate label '{}' at line {}: its staging directory will be shared",
                    label,
                    idx + 1
                );
            }

            sources.push(Source::new(label, path));
        }

        if sources.is_empty() {
            return Err(StashError::NoSources);
        }

        Ok(sources)
    }
}
