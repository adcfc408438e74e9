//! Archiver adapter
//!
//! Packs a directory into one gzip-compressed tar container and unpacks it
//! again by driving an external `tar` program.
//!
//! The container's single root entry is the packed directory's own name:
//! `tar` runs with the directory's parent as its working context. Extraction
//! does not know that name in advance, so [`TarArchiver::list`] inspects the
//! container first.
//!
//! With progress enabled, `tar` runs verbosely and every line it prints
//! advances the progress display by one entry.

use crate::error::{Result, StashError};
use crate::process::{self, ToolOutput};
use crate::progress::ProgressDisplay;
use crate::utils;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Packs and unpacks compressed containers
pub trait Archiver: Send + Sync {
    /// External programs this archiver needs on `PATH`
    fn required_programs(&self) -> Vec<String>;

    /// Pack `source_dir` into `output`, rooted at `source_dir`'s name
    fn pack(&self, source_dir: &Path, output: &Path, progress: &ProgressDisplay) -> Result<()>;

    /// Unpack `archive` next to itself, returning the extracted root
    fn unpack(&self, archive: &Path, progress: &ProgressDisplay) -> Result<PathBuf>;
}

/// Entry count and root segment of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveListing {
    /// Number of entries listed
    pub entries: u64,
    /// Top-level path segment of the first entry
    pub root: String,
}

impl ArchiveListing {
    /// Build a listing from the archiving tool's list output
    ///
    /// Returns `None` when no entry names a root segment.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let entries: Vec<&str> = lines
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let root = entries.iter().find_map(|entry| {
            entry
                .trim_start_matches("./")
                .split('/')
                .find(|segment| !segment.is_empty())
                .map(str::to_string)
        })?;

        Some(Self {
            entries: entries.len() as u64,
            root,
        })
    }
}

/// [`Archiver`] backed by a GNU tar compatible program
#[derive(Debug, Clone)]
pub struct TarArchiver {
    program: String,
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self::new("tar")
    }
}

impl TarArchiver {
    /// Use `program` as the tar executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// List `archive` without modifying anything
    ///
    /// # Errors
    ///
    /// - [`StashError::UnpackFailed`] if the listing command fails
    /// - [`StashError::EmptyArchive`] if no entries are listed
    pub fn list(&self, archive: &Path) -> Result<ArchiveListing> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-tzf").arg(archive);
        let output = process::run_captured(&mut cmd, None)?;
        if !output.success() {
            return Err(StashError::UnpackFailed(format!(
                "failed to list archive content: {}",
                output.diagnostics()
            )));
        }

        let listing = ArchiveListing::from_lines(output.stdout.lines())
            .ok_or_else(|| StashError::EmptyArchive(archive.to_path_buf()))?;
        debug!(
            "Archive {:?} lists {} entries under '{}'",
            archive, listing.entries, listing.root
        );
        Ok(listing)
    }

    /// Run `cmd`, streaming its verbose output into a tracker when enabled
    fn run_with_progress(
        &self,
        cmd: &mut Command,
        progress: &ProgressDisplay,
        operation: &str,
        total: u64,
    ) -> Result<ToolOutput> {
        if !progress.is_enabled() {
            return process::run_captured(cmd, None);
        }

        let mut reporter = progress.tracker(operation, total);
        let output = process::run_streaming(cmd, |line| {
            if let Some(name) = utils::entry_name(line) {
                reporter.advance(&name);
            }
        })?;
        reporter.finish();
        Ok(output)
    }
}

fn working_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

impl Archiver for TarArchiver {
    fn required_programs(&self) -> Vec<String> {
        vec![self.program.clone()]
    }

    fn pack(&self, source_dir: &Path, output: &Path, progress: &ProgressDisplay) -> Result<()> {
        let name = source_dir.file_name().ok_or_else(|| {
            StashError::PackFailed(format!("{:?} has no directory name", source_dir))
        })?;

        let mut cmd = Command::new(&self.program);
        if progress.is_enabled() {
            cmd.arg("-v");
        }
        cmd.arg("-czf")
            .arg(output)
            .arg("-C")
            .arg(working_dir(source_dir))
            .arg(name);

        let total = if progress.is_enabled() {
            utils::count_entries(source_dir)
        } else {
            0
        };
        let output_status = self.run_with_progress(&mut cmd, progress, "Compressing backup...", total)?;

        if !output_status.success() {
            return Err(StashError::PackFailed(output_status.diagnostics()));
        }
        debug!("Packed {:?} into {:?}", source_dir, output);
        Ok(())
    }

    fn unpack(&self, archive: &Path, progress: &ProgressDisplay) -> Result<PathBuf> {
        let listing = self.list(archive)?;
        let parent = working_dir(archive);

        let mut cmd = Command::new(&self.program);
        if progress.is_enabled() {
            cmd.arg("-v");
        }
        cmd.arg("-xzf").arg(archive).arg("-C").arg(parent);

        let output = self.run_with_progress(&mut cmd, progress, "Extracting backup...", listing.entries)?;
        if !output.success() {
            return Err(StashError::UnpackFailed(output.diagnostics()));
        }

        let root = parent.join(&listing.root);
        if !root.exists() {
            return Err(StashError::ExtractedRootMissing(root));
        }
        debug!("Unpacked {:?} into {:?}", archive, root);
        Ok(root)
    }
}
