//! Checksum ledger: per-file SHA-256 digests for integrity verification
//!
//! During a backup every regular file staged for every source is hashed and
//! its digest appended to one ledger file per run. After extraction the
//! ledger is read back and every regular file of the extracted tree must
//! hash to a digest present in it.
//!
//! ## Format
//!
//! One lowercase hexadecimal SHA-256 digest per line, no file names. When a
//! line carries more than one whitespace-separated field (the `sha256sum`
//! layout), only the first field is used.
//!
//! Verification is membership-only: it proves a digest was seen during the
//! backup, not that a file matches its own earlier copy.

use crate::error::{Result, StashError};
use crate::progress::ProgressReporter;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Read buffer size used while hashing
const CHUNK_SIZE: usize = 8192;

/// Hash a file's content using SHA-256
///
/// The file is streamed in fixed-size chunks, so memory use does not grow
/// with file size.
///
/// # Errors
///
/// [`StashError::Hash`] naming the file if it cannot be opened or read.
pub fn digest(path: &Path) -> Result<String> {
    let hash_err = |source| StashError::Hash {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(hash_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(hash_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Collect every regular file under `root`, recursively
///
/// Symbolic links are neither followed nor returned. Files are returned in
/// file-name order per directory.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Load the set of expected digests from a ledger file
pub fn load(ledger: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(ledger).map_err(|source| StashError::LedgerLoad {
        path: ledger.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|digest| digest.to_ascii_lowercase())
        .collect())
}

/// Check every regular file under `extracted_dir` against `ledger`
///
/// Stops at the first file whose digest is not in the ledger. Returns the
/// number of files checked.
///
/// # Errors
///
/// - [`StashError::LedgerLoad`] if the ledger cannot be read
/// - [`StashError::Hash`] if a file cannot be read
/// - [`StashError::Integrity`] naming the first file that fails
pub fn verify(
    extracted_dir: &Path,
    ledger: &Path,
    progress: &mut ProgressReporter,
) -> Result<usize> {
    let expected = load(ledger)?;
    let files = collect_files(extracted_dir)?;
    debug!(
        "Verifying {} files against {} recorded digests",
        files.len(),
        expected.len()
    );
    progress.set_total(files.len() as u64);

    for file in &files {
        let file_digest = digest(file)?;
        if !expected.contains(&file_digest) {
            warn!("Integrity check failed for {:?}", file);
            return Err(StashError::Integrity(file.clone()));
        }
        progress.advance(&display_name(file));
    }

    progress.finish();
    Ok(files.len())
}

/// Append-only handle on a run's ledger
///
/// Opened once per run and shared by every source. The handle is closed when
/// dropped, including on early returns.
#[derive(Debug)]
pub struct LedgerWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    recorded: usize,
}

impl LedgerWriter {
    /// Open (creating if needed) `path` for appending
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StashError::LedgerLoad {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Opened checksum ledger {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            recorded: 0,
        })
    }

    /// Number of digests recorded through this handle
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Append one digest
    pub fn record(&mut self, digest: &str) -> Result<()> {
        writeln!(self.writer, "{}", digest).map_err(|source| StashError::LedgerLoad {
            path: self.path.clone(),
            source,
        })?;
        self.recorded += 1;
        Ok(())
    }

    /// Hash `files` and append their digests, stopping at the first failure
    pub fn record_all(&mut self, files: &[PathBuf], progress: &mut ProgressReporter) -> Result<()> {
        for file in files {
            let file_digest = digest(file)?;
            self.record(&file_digest)?;
            progress.advance(&display_name(file));
        }
        Ok(())
    }

    /// Flush buffered digests to disk
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().map_err(|source| StashError::LedgerLoad {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.recorded)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
