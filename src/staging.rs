//! Staging area: metadata-preserving copies of the sources
//!
//! Each source is copied into its own subdirectory of the run's staging
//! root before anything is archived. The copy:
//!
//! - preserves permission bits and access/modification times
//! - keeps symbolic links as links, never following them
//! - leaves out UNIX domain sockets, named pipes and broken symlinks
//! - replaces an existing destination directory instead of merging into it
//!
//! Directory metadata is applied after the directory's children have been
//! written, deepest first, so copying into a read-only directory still works
//! and copied modification times are not disturbed.

use crate::error::{Result, StashError};
use filetime::FileTime;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Copies sources into the staging root
#[derive(Debug, Default, Clone, Copy)]
pub struct StagingArea;

impl StagingArea {
    /// Copy `source` into `destination`
    ///
    /// A regular file is copied into `destination` under its own name when
    /// `destination` is an existing directory, otherwise to `destination`
    /// itself; missing parent directories are created. A directory replaces
    /// `destination` wholesale.
    ///
    /// # Errors
    ///
    /// - [`StashError::NotFileOrDirectory`] if `source` is neither
    /// - [`StashError::CopyFailed`] for any I/O failure, carrying the cause
    pub fn stage(source: &Path, destination: &Path) -> Result<()> {
        let metadata = fs::metadata(source).map_err(|e| StashError::copy_failed(source, e))?;

        if metadata.is_file() {
            let target = if destination.is_dir() {
                let name = source.file_name().ok_or_else(|| {
                    StashError::copy_failed(
                        source,
                        io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
                    )
                })?;
                destination.join(name)
            } else {
                destination.to_path_buf()
            };

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| StashError::copy_failed(parent, e))?;
            }
            copy_file(source, &target, &metadata)?;
            debug!("Staged file {:?} -> {:?}", source, target);
            return Ok(());
        }

        if metadata.is_dir() {
            if fs::symlink_metadata(destination).is_ok() {
                remove_existing(destination)?;
            }
            let copied = copy_tree(source, destination)?;
            debug!("Staged {} entries from {:?} -> {:?}", copied, source, destination);
            return Ok(());
        }

        Err(StashError::NotFileOrDirectory(source.to_path_buf()))
    }
}

/// Whether an entry is left out of the staged copy
///
/// Entries whose metadata cannot be read are left out as well.
pub fn should_skip(path: &Path) -> bool {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return true,
    };
    let file_type = metadata.file_type();

    if is_socket_or_fifo(&file_type) {
        return true;
    }

    // Broken symlink
    file_type.is_symlink() && fs::metadata(path).is_err()
}

#[cfg(unix)]
fn is_socket_or_fifo(file_type: &fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_socket() || file_type.is_fifo()
}

#[cfg(not(unix))]
fn is_socket_or_fifo(_file_type: &fs::FileType) -> bool {
    false
}

fn remove_existing(destination: &Path) -> Result<()> {
    let result = if destination.is_dir() {
        fs::remove_dir_all(destination)
    } else {
        fs::remove_file(destination)
    };
    result.map_err(|e| StashError::copy_failed(destination, e))
}

/// Recursively copy a directory, returning the number of entries written
fn copy_tree(source: &Path, destination: &Path) -> Result<usize> {
    let mut directories: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut copied = 0usize;
    let mut walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            StashError::copy_failed(path, e.into())
        })?;
        let path = entry.path();

        if entry.depth() == 0 {
            fs::create_dir_all(destination).map_err(|e| StashError::copy_failed(destination, e))?;
            directories.push((path.to_path_buf(), destination.to_path_buf()));
            continue;
        }

        if should_skip(path) {
            trace!("Skipping special entry {:?}", path);
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let relative = path.strip_prefix(source).map_err(|_| {
            StashError::copy_failed(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "entry outside source tree"),
            )
        })?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir(&target).map_err(|e| StashError::copy_failed(path, e))?;
            directories.push((path.to_path_buf(), target));
        } else if file_type.is_symlink() {
            copy_symlink(path, &target)?;
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|e| StashError::copy_failed(path, e.into()))?;
            copy_file(path, &target, &metadata)?;
        } else {
            return Err(StashError::copy_failed(
                path,
                io::Error::new(io::ErrorKind::Unsupported, "unsupported file type"),
            ));
        }
        copied += 1;
    }

    for (src, dst) in directories.iter().rev() {
        let metadata = fs::metadata(src).map_err(|e| StashError::copy_failed(src, e))?;
        fs::set_permissions(dst, metadata.permissions())
            .map_err(|e| StashError::copy_failed(dst, e))?;
        set_times(dst, &metadata, false).map_err(|e| StashError::copy_failed(dst, e))?;
    }

    Ok(copied)
}

/// Copy one regular file with its permissions and timestamps
fn copy_file(source: &Path, target: &Path, metadata: &Metadata) -> Result<()> {
    fs::copy(source, target).map_err(|e| StashError::copy_failed(source, e))?;
    set_times(target, metadata, false).map_err(|e| StashError::copy_failed(target, e))
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    let link_target = fs::read_link(source).map_err(|e| StashError::copy_failed(source, e))?;
    std::os::unix::fs::symlink(&link_target, target)
        .map_err(|e| StashError::copy_failed(source, e))?;
    let metadata = fs::symlink_metadata(source).map_err(|e| StashError::copy_failed(source, e))?;
    set_times(target, &metadata, true).map_err(|e| StashError::copy_failed(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _target: &Path) -> Result<()> {
    Err(StashError::copy_failed(
        source,
        io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"),
    ))
}

fn set_times(path: &Path, metadata: &Metadata, symlink: bool) -> io::Result<()> {
    let atime = FileTime::from_last_access_time(metadata);
    let mtime = FileTime::from_last_modification_time(metadata);
    if symlink {
        filetime::set_symlink_file_times(path, atime, mtime)
    } else {
        filetime::set_file_times(path, atime, mtime)
    }
}
