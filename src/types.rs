//! Core data types used throughout Stashbox
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Inputs**: [`Source`], [`RunConfig`], [`ExtractConfig`], [`Passphrase`]
//! - **Tooling**: [`ToolConfig`] describing the external archiver and cipher
//! - **Naming**: [`RunNames`] deriving artifact, ledger and staging names
//! - **Results**: [`BackupReport`], [`ExtractReport`]
//! - **Progress**: [`ProgressInfo`], [`ProgressCallback`]
//!
//! ## Examples
//!
//! ```rust
//! use stashbox::types::RunNames;
//!
//! let names = RunNames::new("host", "20260101");
//! assert_eq!(names.artifact_name(), "backup-host-20260101.tar.gz.enc");
//! assert_eq!(names.ledger_name(), "backup-host-20260101.sha256");
//! ```

use crate::utils;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A labeled source tree or file to back up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Label used to name the staging subdirectory
    pub label: String,
    /// Path on disk (file or directory)
    pub path: PathBuf,
}

impl Source {
    /// Create a new source
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// Secret handed to the cipher tool
///
/// The value never appears in `Debug` output or log lines.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Secret bytes, for writing to the cipher's passphrase channel
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Parameters of one backup run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Sources in catalog order
    pub sources: Vec<Source>,
    /// Directory receiving the artifact and ledger
    pub output_directory: PathBuf,
    /// Encryption secret
    pub secret: Passphrase,
    /// Record per-file digests into a ledger
    pub checksum: bool,
    /// Show progress while running
    pub verbose: bool,
}

/// Parameters of one extraction
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Encrypted artifact to extract
    pub archive: PathBuf,
    /// Decryption secret
    pub secret: Passphrase,
    /// Ledger to verify the extracted tree against
    pub ledger: Option<PathBuf>,
    /// Show progress while running
    pub verbose: bool,
}

/// External tool configuration
///
/// Loaded from JSON by the command-line front end; every field is optional
/// in the file and falls back to [`ToolConfig::default`].
///
/// ```rust
/// use stashbox::types::ToolConfig;
///
/// let config: ToolConfig = serde_json::from_str(r#"{ "armor": false }"#).unwrap();
/// assert_eq!(config.archiver_program, "tar");
/// assert!(!config.armor);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Archiving program (GNU tar compatible)
    pub archiver_program: String,
    /// Cipher program (GnuPG compatible)
    pub cipher_program: String,
    /// Symmetric cipher algorithm name passed to the cipher program
    pub cipher_algorithm: String,
    /// Produce ASCII-armored output
    pub armor: bool,
    /// Home directory for the cipher program
    pub cipher_home: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            archiver_program: "tar".to_string(),
            cipher_program: "gpg".to_string(),
            cipher_algorithm: "AES256".to_string(),
            armor: true,
            cipher_home: None,
        }
    }
}

impl ToolConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Deterministic names derived from the host and the run date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNames {
    /// Host name
    pub hostname: String,
    /// Date stamp (`%Y%m%d`)
    pub date: String,
}

impl RunNames {
    /// Create names for an explicit host and date
    pub fn new(hostname: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            date: date.into(),
        }
    }

    /// Names for this host and today's local date
    pub fn now() -> Self {
        let hostname = hostname::get()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self::new(hostname, Local::now().format("%Y%m%d").to_string())
    }

    /// Final encrypted artifact file name
    pub fn artifact_name(&self) -> String {
        format!("backup-{}-{}.tar.gz.enc", self.hostname, self.date)
    }

    /// Ledger file name
    pub fn ledger_name(&self) -> String {
        format!("backup-{}-{}.sha256", self.hostname, self.date)
    }

    /// Staging root name, which becomes the archive's root entry
    pub fn staging_root_name(&self) -> String {
        format!("backup-{}-{}", self.hostname, self.date)
    }

    /// Per-source staging subdirectory name
    pub fn source_dir_name(&self, label: &str) -> String {
        format!("backup-{}-{}", label, self.date)
    }
}

/// Outcome of a successful backup
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Path of the encrypted artifact
    pub artifact: PathBuf,
    /// Artifact size in bytes
    pub size_bytes: u64,
    /// Ledger path when checksums were recorded
    pub ledger: Option<PathBuf>,
    /// Number of sources staged
    pub sources_staged: usize,
    /// Number of digests appended to the ledger
    pub digests_recorded: usize,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl BackupReport {
    /// Artifact size in binary units
    pub fn human_size(&self) -> String {
        utils::format_size(self.size_bytes)
    }
}

/// Outcome of a successful extraction
#[derive(Debug, Clone)]
pub struct ExtractReport {
    /// Resolved path of the extracted tree
    pub extracted_root: PathBuf,
    /// Files whose digest was verified, when a ledger was supplied
    pub files_verified: Option<usize>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// Progress callback type
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Information passed to progress callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Items processed so far
    pub processed: u64,
    /// Total items to process (if known)
    pub total: Option<u64>,
    /// Whether the operation has completed
    pub finished: bool,
}

impl ProgressInfo {
    /// Get progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.processed as f32 / total as f32) * 100.0),
            _ => None,
        }
    }
}

/// Pipeline stages, used for logging transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Preconditions are being checked
    Init,
    /// Sources are being copied (and hashed)
    Staging,
    /// The staging root is being packed
    Archiving,
    /// The container is being encrypted
    Encrypting,
    /// The artifact is being decrypted
    Decrypting,
    /// The container is being unpacked
    Unpacking,
    /// The extracted tree is being checked against the ledger
    Verifying,
    /// The run finished successfully
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Staging => "staging",
            Stage::Archiving => "archiving",
            Stage::Encrypting => "encrypting",
            Stage::Decrypting => "decrypting",
            Stage::Unpacking => "unpacking",
            Stage::Verifying => "verifying",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}
