//! Error types for Stashbox
//!
//! Every stage of the backup and extract pipelines reports failure through
//! [`StashError`]. Errors propagate unchanged from the stage that raised them
//! up to the caller; only the command-line boundary turns them into a message
//! and a non-zero exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the Stashbox library
pub type Result<T> = std::result::Result<T, StashError>;

/// Main error type for all Stashbox operations
#[derive(Debug, Error)]
pub enum StashError {
    /// I/O errors not attributed to a more specific stage
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors while reading or writing JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Required external programs are not on `PATH`
    #[error("Missing dependencies: {}", .0.join(", "))]
    DependencyMissing(Vec<String>),

    /// The process lacks the privileges a backup needs
    #[error("Insufficient privileges: run this program as root")]
    NotElevated,

    /// The sources list does not exist
    #[error("Sources file does not exist: {0:?}")]
    SourcesFileMissing(PathBuf),

    /// A sources list line could not be parsed
    #[error("Invalid format at line {line}: '{text}'")]
    SourceParse {
        /// 1-based line number
        line: usize,
        /// Trimmed line content
        text: String,
    },

    /// A source path named in the list does not exist
    #[error("Path does not exist: {0:?}")]
    SourcePathMissing(PathBuf),

    /// The sources list contained no entries
    #[error("No valid sources found in file")]
    NoSources,

    /// A source is neither a regular file nor a directory
    #[error("The following source element is neither a file nor a directory: {0:?}")]
    NotFileOrDirectory(PathBuf),

    /// Copying a source into the staging area failed
    #[error("Copy failed for {path:?}: {source}")]
    CopyFailed {
        /// Path being copied when the failure occurred
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// A file could not be read while computing its digest
    #[error("Failed to read file {path:?}: {source}")]
    Hash {
        /// File being hashed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// The ledger could not be opened, written or read
    #[error("Failed to access checksum file {path:?}: {source}")]
    LedgerLoad {
        /// Ledger path
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// The archiving tool failed to create the container
    #[error("Cannot create compressed archive: {0}")]
    PackFailed(String),

    /// The archiving tool failed to list or extract the container
    #[error("Unable to extract compressed archive: {0}")]
    UnpackFailed(String),

    /// Encryption refused because the destination already exists
    #[error("Encryption failed: archive already exists: {0:?}")]
    DestinationExists(PathBuf),

    /// The cipher tool failed to encrypt
    #[error("Encryption failed: {0}")]
    EncryptFailed(String),

    /// The cipher tool failed to decrypt
    #[error("Decryption failed: {0}")]
    DecryptFailed(String),

    /// The container lists no entries
    #[error("Archive is empty or corrupted: {0:?}")]
    EmptyArchive(PathBuf),

    /// The extracted root predicted from the listing is absent
    #[error("Extracted {0:?} not found")]
    ExtractedRootMissing(PathBuf),

    /// A recomputed digest is not present in the ledger
    #[error("Integrity error for {0:?}")]
    Integrity(PathBuf),

    /// An external program could not be started or waited on
    #[error("Failed to run {tool}: {source}")]
    ToolSpawn {
        /// Program name
        tool: String,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// The artifact named for extraction does not exist
    #[error("Archive does not exist: {0:?}")]
    ArchiveMissing(PathBuf),

    /// The artifact is absent after a run that reported success
    #[error("Unable to create backup archive: {0:?}")]
    ArtifactMissing(PathBuf),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl StashError {
    /// Create a configuration error with a custom message
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        StashError::InvalidConfiguration(msg.into())
    }

    /// Wrap an I/O failure that happened while staging `path`
    pub fn copy_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StashError::CopyFailed {
            path: path.into(),
            source,
        }
    }

    /// Check if this error reports failed integrity verification
    pub fn is_integrity(&self) -> bool {
        matches!(self, StashError::Integrity(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            StashError::DependencyMissing(programs) => format!(
                "Missing dependencies: {}. Install them or point --config at their location.",
                programs.join(", ")
            ),
            StashError::NotElevated => {
                "Run this program as root! Sources may include files only root can read.".to_string()
            }
            StashError::DestinationExists(path) => format!(
                "Encryption failed: archive already exists at {:?}. \
                 Move it away or choose another output directory.",
                path
            ),
            StashError::Integrity(path) => format!("!! Integrity error for {:?} !!", path),
            _ => self.to_string(),
        }
    }
}
