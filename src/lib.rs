//! # Stashbox - Encrypted single-file backups
//!
//! Stashbox gathers a list of labeled files and directory trees into one
//! compressed, passphrase-encrypted artifact, optionally recording a SHA-256
//! digest of every staged file so that a later extraction can be verified.
//!
//! ## Overview
//!
//! A backup run:
//! - Reads labeled sources from a `label=path` list ([`SourceCatalog`])
//! - Copies each source into a private staging tree, preserving symlinks,
//!   permissions and timestamps and skipping sockets and pipes ([`StagingArea`])
//! - Records per-file digests into an append-only ledger ([`ledger`])
//! - Packs the staging tree with `tar` ([`TarArchiver`])
//! - Encrypts the container with `gpg` ([`GpgCipher`])
//!
//! Extraction reverses the last two steps and, given a ledger, checks every
//! extracted file against it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stashbox::{ExtractConfig, PipelineBuilder, RunConfig, SourceCatalog};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = PipelineBuilder::new().build();
//!
//! let report = pipeline.backup(&RunConfig {
//!     sources: SourceCatalog::parse(Path::new("sources.ini"))?,
//!     output_directory: PathBuf::from("/var/backups"),
//!     secret: "correct horse".into(),
//!     checksum: true,
//!     verbose: false,
//! })?;
//!
//! let restored = pipeline.extract(&ExtractConfig {
//!     archive: report.artifact.clone(),
//!     secret: "correct horse".into(),
//!     ledger: report.ledger.clone(),
//!     verbose: false,
//! })?;
//! println!("Restored into {}", restored.extracted_root.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Artifacts
//!
//! For host `h` on date `YYYYMMDD` a run produces, in the output directory:
//! - `backup-h-YYYYMMDD.tar.gz.enc`: the encrypted container
//! - `backup-h-YYYYMMDD.sha256`: the ledger, when checksums are enabled
//!
//! The container's single root is `backup-h-YYYYMMDD/`, holding one
//! `backup-<label>-YYYYMMDD/` directory per source.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with [`StashError`]. Every stage error
//! propagates unchanged; transient files are removed on the way out.
//!
//! ## Module Organization
//!
//! - [`catalog`]: Sources list parsing
//! - [`staging`]: Tree copying
//! - [`ledger`]: Digests, ledger writing and verification
//! - [`archiver`]: Container packing and unpacking
//! - [`cipher`]: Symmetric encryption
//! - [`pipeline`]: Backup and extract orchestration
//! - [`progress`]: Progress display
//! - [`process`]: External program plumbing
//! - [`privilege`]: Elevated privilege check
//! - [`types`]: Common types and data structures
//! - [`error`]: Error types and handling

// Public API modules
pub mod archiver;
pub mod catalog;
pub mod cipher;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod privilege;
pub mod process;
pub mod progress;
pub mod staging;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use archiver::{Archiver, TarArchiver};
pub use catalog::SourceCatalog;
pub use cipher::{Cipher, GpgCipher};
pub use error::{Result, StashError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use privilege::{EffectiveUid, FixedPrivilege, PrivilegeCheck};
pub use progress::{ProgressDisplay, ProgressReporter};
pub use staging::StagingArea;
pub use types::*;
