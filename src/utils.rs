//! Utility functions for Stashbox
//!
//! Small helpers shared by the pipeline stages:
//!
//! - Size formatting in binary units
//! - Best-effort removal of transient artifacts
//! - Entry counting for progress totals
//! - Unique scratch names for concurrent runs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Prefix of every scratch path a run creates
pub const SCRATCH_PREFIX: &str = ".stashbox-";

/// Format bytes in binary units
///
/// Divides by 1024 while the value is at least 1024 and a larger unit is
/// available. Exact values print without decimals, others with two.
///
/// # Example
///
/// ```rust
/// use stashbox::utils::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1024), "1 KiB");
/// assert_eq!(format_size(1536), "1.50 KiB");
/// assert_eq!(format_size(1_048_576), "1 MiB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if size.fract() == 0.0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Remove files and directory trees, ignoring failures
///
/// Missing paths are skipped. Failures are logged and swallowed so that
/// cleanup never masks the error that triggered it.
pub fn cleanup_paths<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Ok(()) => trace!("Removed {:?}", path),
            Err(e) => warn!("Failed to clean up {:?}: {}", path, e),
        }
    }
}

/// Count every entry under `root`, including `root` itself
///
/// Symbolic links are counted but not followed, matching what the archiving
/// tool lists in verbose mode. Unreadable entries are skipped.
pub fn count_entries(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .count() as u64
}

/// A path under `parent` that no other run will pick
pub fn unique_scratch_path(parent: &Path, suffix: &str) -> PathBuf {
    parent.join(format!(
        "{}{}{}",
        SCRATCH_PREFIX,
        Uuid::new_v4().simple(),
        suffix
    ))
}

/// Trailing path component of an entry reported by a tool
///
/// Returns `None` for blank lines.
pub fn entry_name(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let name = Path::new(line)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| line.to_string());
    Some(name)
}
