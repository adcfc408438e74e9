//! Backup and extract orchestration
//!
//! ## Backup
//!
//! 1. Check external programs and privileges, create the output directory
//! 2. Stage every source into a fresh scratch root, hashing staged files
//!    into the run's ledger when checksums are enabled
//! 3. Pack the staging root into a temporary container
//! 4. Encrypt the container into the final artifact
//! 5. Remove the scratch root and container, whatever happened
//! 6. Report the artifact's size and the elapsed time
//!
//! ## Extract
//!
//! 1. Decrypt the artifact into a temporary container
//! 2. Unpack it next to the artifact
//! 3. Optionally verify the extracted tree against a ledger
//!
//! The temporary container is always removed. The extracted tree is removed
//! only when verification was requested and failed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stashbox::{PipelineBuilder, RunConfig, SourceCatalog};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = PipelineBuilder::new().build();
//! let report = pipeline.backup(&RunConfig {
//!     sources: SourceCatalog::parse(Path::new("sources.ini"))?,
//!     output_directory: PathBuf::from("/var/backups"),
//!     secret: "correct horse".into(),
//!     checksum: true,
//!     verbose: false,
//! })?;
//! println!("{} ({})", report.artifact.display(), report.human_size());
//! # Ok(())
//! # }
//! ```

use crate::archiver::{Archiver, TarArchiver};
use crate::cipher::{Cipher, GpgCipher};
use crate::error::{Result, StashError};
use crate::ledger::{self, LedgerWriter};
use crate::privilege::{EffectiveUid, PrivilegeCheck};
use crate::process;
use crate::progress::ProgressDisplay;
use crate::staging::StagingArea;
use crate::types::{BackupReport, ExtractConfig, ExtractReport, RunConfig, RunNames, Stage, ToolConfig};
use crate::utils;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// File name of the temporary container inside a backup's scratch directory
const CONTAINER_NAME: &str = "backup.tar.gz";

/// Sequences staging, hashing, archiving and encryption
pub struct Pipeline {
    archiver: Box<dyn Archiver>,
    cipher: Box<dyn Cipher>,
    privilege: Box<dyn PrivilegeCheck>,
    progress: Option<ProgressDisplay>,
    names: Option<RunNames>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("archiver", &self.archiver.required_programs())
            .field("cipher", &self.cipher.required_programs())
            .field("elevated", &self.privilege.is_elevated())
            .field("progress", &self.progress)
            .field("names", &self.names)
            .finish()
    }
}

/// Paths one backup run writes to
struct BackupPaths {
    scratch: PathBuf,
    staging_root: PathBuf,
    container: PathBuf,
    artifact: PathBuf,
    ledger: Option<PathBuf>,
}

impl Pipeline {
    /// Production pipeline for the given tool configuration
    pub fn from_tool_config(config: &ToolConfig) -> Self {
        PipelineBuilder::new().tool_config(config).build()
    }

    /// Fail unless every external program is available
    ///
    /// Runs before any filesystem mutation.
    pub fn check_dependencies(&self) -> Result<()> {
        let mut programs = self.archiver.required_programs();
        programs.extend(self.cipher.required_programs());
        process::require_programs(&programs)
    }

    fn display(&self, verbose: bool) -> ProgressDisplay {
        self.progress
            .clone()
            .unwrap_or_else(|| ProgressDisplay::from_verbose(verbose))
    }

    /// Create an encrypted backup of `config.sources`
    ///
    /// # Errors
    ///
    /// Any stage failure is returned unchanged after the scratch root and
    /// temporary container have been removed.
    #[instrument(skip_all, fields(sources = config.sources.len(), output = ?config.output_directory))]
    pub fn backup(&self, config: &RunConfig) -> Result<BackupReport> {
        let start = Instant::now();
        let display = self.display(config.verbose);

        self.check_dependencies()?;
        if !self.privilege.is_elevated() {
            return Err(StashError::NotElevated);
        }

        fs::create_dir_all(&config.output_directory)?;
        let output_dir = config.output_directory.canonicalize()?;
        let names = self.names.clone().unwrap_or_else(RunNames::now);

        let scratch = utils::unique_scratch_path(&output_dir, "");
        let paths = BackupPaths {
            staging_root: scratch.join(names.staging_root_name()),
            container: scratch.join(CONTAINER_NAME),
            artifact: output_dir.join(names.artifact_name()),
            ledger: config.checksum.then(|| output_dir.join(names.ledger_name())),
            scratch,
        };

        if paths.artifact.exists() {
            return Err(StashError::DestinationExists(paths.artifact));
        }

        let mut stage = Stage::Init;
        let result = self.run_backup(config, &names, &paths, &display, &mut stage);
        utils::cleanup_paths(&[&paths.staging_root, &paths.container, &paths.scratch]);

        let digests_recorded = match result {
            Ok(count) => count,
            Err(e) => {
                warn!(%stage, "Backup failed: {}", e);
                return Err(e);
            }
        };

        let size_bytes = fs::metadata(&paths.artifact)
            .map_err(|_| StashError::ArtifactMissing(paths.artifact.clone()))?
            .len();

        info!(stage = %Stage::Done, "Created {:?} ({} bytes)", paths.artifact, size_bytes);
        Ok(BackupReport {
            artifact: paths.artifact,
            size_bytes,
            ledger: paths.ledger,
            sources_staged: config.sources.len(),
            digests_recorded,
            elapsed: start.elapsed(),
        })
    }

    /// Stages through encryption; returns the number of digests recorded
    fn run_backup(
        &self,
        config: &RunConfig,
        names: &RunNames,
        paths: &BackupPaths,
        display: &ProgressDisplay,
        stage: &mut Stage,
    ) -> Result<usize> {
        *stage = Stage::Staging;
        fs::create_dir_all(&paths.staging_root)
            .map_err(|e| StashError::copy_failed(&paths.staging_root, e))?;

        let mut ledger = match &paths.ledger {
            Some(path) => Some(LedgerWriter::open(path)?),
            None => None,
        };

        let total = config.sources.len();
        for (idx, source) in config.sources.iter().enumerate() {
            info!("Copying {} ({}/{})", source.label, idx + 1, total);
            let source_dir = paths.staging_root.join(names.source_dir_name(&source.label));
            fs::create_dir_all(&source_dir).map_err(|e| StashError::copy_failed(&source_dir, e))?;

            let mut marker = display.marker(&format!("Copying {} ({}/{})...", source.label, idx + 1, total));
            StagingArea::stage(&source.path, &source_dir)?;
            marker.finish();

            if let Some(writer) = ledger.as_mut() {
                let files = ledger::collect_files(&source_dir)?;
                let mut reporter = display.tracker("Computing checksums...", files.len() as u64);
                writer.record_all(&files, &mut reporter)?;
                reporter.finish();
                debug!("{} digests recorded after '{}'", writer.recorded(), source.label);
            }
        }

        let digests = match ledger {
            Some(writer) => writer.finish()?,
            None => 0,
        };
        debug!("Staged {} sources, recorded {} digests", total, digests);

        *stage = Stage::Archiving;
        self.archiver.pack(&paths.staging_root, &paths.container, display)?;

        *stage = Stage::Encrypting;
        self.cipher.encrypt(&paths.container, &paths.artifact, &config.secret, display)?;

        Ok(digests)
    }

    /// Decrypt, unpack and optionally verify an artifact
    ///
    /// # Errors
    ///
    /// Any stage failure is returned unchanged after the temporary container
    /// (and, for failed verification, the extracted tree) has been removed.
    #[instrument(skip_all, fields(archive = ?config.archive))]
    pub fn extract(&self, config: &ExtractConfig) -> Result<ExtractReport> {
        let start = Instant::now();
        let display = self.display(config.verbose);

        self.check_dependencies()?;
        if !config.archive.is_file() {
            return Err(StashError::ArchiveMissing(config.archive.clone()));
        }
        if let Some(ledger) = &config.ledger {
            if !ledger.is_file() {
                return Err(StashError::LedgerLoad {
                    path: ledger.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "checksum file does not exist"),
                });
            }
        }

        let archive = config.archive.canonicalize()?;
        let parent = archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let container = utils::unique_scratch_path(&parent, ".tar.gz");

        let mut stage = Stage::Init;
        let result = self.run_extract(config, &archive, &container, &display, &mut stage);
        utils::cleanup_paths(&[&container]);

        let (root, files_verified) = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%stage, "Extraction failed: {}", e);
                return Err(e);
            }
        };

        let extracted_root = root.canonicalize().unwrap_or(root);
        info!(stage = %Stage::Done, "Extracted to {:?}", extracted_root);
        Ok(ExtractReport {
            extracted_root,
            files_verified,
            elapsed: start.elapsed(),
        })
    }

    fn run_extract(
        &self,
        config: &ExtractConfig,
        archive: &Path,
        container: &Path,
        display: &ProgressDisplay,
        stage: &mut Stage,
    ) -> Result<(PathBuf, Option<usize>)> {
        *stage = Stage::Decrypting;
        self.cipher.decrypt(archive, container, &config.secret, display)?;

        *stage = Stage::Unpacking;
        let root = self.archiver.unpack(container, display)?;

        let Some(ledger_path) = &config.ledger else {
            return Ok((root, None));
        };

        *stage = Stage::Verifying;
        let mut reporter = display.tracker("Verifying backup...", 0);
        match ledger::verify(&root, ledger_path, &mut reporter) {
            Ok(count) => Ok((root, Some(count))),
            Err(e) => {
                drop(reporter);
                utils::cleanup_paths(&[&root]);
                Err(e)
            }
        }
    }
}

/// Builder for [`Pipeline`]
///
/// Defaults to `tar`, `gpg` and the effective user id check.
///
/// ```rust
/// use stashbox::PipelineBuilder;
/// use stashbox::privilege::FixedPrivilege;
/// use stashbox::types::ToolConfig;
///
/// let pipeline = PipelineBuilder::new()
///     .tool_config(&ToolConfig::default())
///     .privilege(FixedPrivilege(true))
///     .build();
/// ```
pub struct PipelineBuilder {
    archiver: Box<dyn Archiver>,
    cipher: Box<dyn Cipher>,
    privilege: Box<dyn PrivilegeCheck>,
    progress: Option<ProgressDisplay>,
    names: Option<RunNames>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            archiver: Box::new(TarArchiver::default()),
            cipher: Box::new(GpgCipher::default()),
            privilege: Box::new(EffectiveUid),
            progress: None,
            names: None,
        }
    }

    /// Use the archiver and cipher described by `config`
    pub fn tool_config(mut self, config: &ToolConfig) -> Self {
        self.archiver = Box::new(TarArchiver::new(config.archiver_program.clone()));
        self.cipher = Box::new(GpgCipher::from_config(config));
        self
    }

    /// Set the archiver
    pub fn archiver(mut self, archiver: impl Archiver + 'static) -> Self {
        self.archiver = Box::new(archiver);
        self
    }

    /// Set the cipher
    pub fn cipher(mut self, cipher: impl Cipher + 'static) -> Self {
        self.cipher = Box::new(cipher);
        self
    }

    /// Set the privilege check
    pub fn privilege(mut self, privilege: impl PrivilegeCheck + 'static) -> Self {
        self.privilege = Box::new(privilege);
        self
    }

    /// Route progress to `display` regardless of the verbose flag
    pub fn progress(mut self, display: ProgressDisplay) -> Self {
        self.progress = Some(display);
        self
    }

    /// Use fixed host and date names instead of the current ones
    pub fn names(mut self, names: RunNames) -> Self {
        self.names = Some(names);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            archiver: self.archiver,
            cipher: self.cipher,
            privilege: self.privilege,
            progress: self.progress,
            names: self.names,
        }
    }
}
