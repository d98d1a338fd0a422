//! Disk operations for publish plugins.
//!
//! Copying to the publish location and the compensating deletes share
//! these helpers so sequence handling stays in one place.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::pathutil;

#[derive(Debug)]
pub enum FileError {
    /// A copy to the publish location failed.
    Copy {
        source_path: PathBuf,
        dest_path: PathBuf,
        source: io::Error,
    },
    /// Creating the destination folder failed.
    CreateDir { path: PathBuf, source: io::Error },
    /// Removing a published file failed.
    Delete { path: PathBuf, source: io::Error },
    /// A sequence member carries no frame number, so no destination
    /// frame path can be derived for it.
    MissingFrameNumber { path: PathBuf },
    /// A sequence destination carries no frame placeholder, so every
    /// member would land on the same path.
    MissingFramePlaceholder { path: PathBuf },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Copy {
                source_path,
                dest_path,
                source,
            } => write!(
                f,
                "failed to copy {} to {}: {}",
                source_path.display(),
                dest_path.display(),
                source
            ),
            FileError::CreateDir { path, source } => {
                write!(f, "failed to create folder {}: {}", path.display(), source)
            }
            FileError::Delete { path, source } => {
                write!(f, "failed to delete {}: {}", path.display(), source)
            }
            FileError::MissingFrameNumber { path } => {
                write!(f, "no frame number in sequence file {}", path.display())
            }
            FileError::MissingFramePlaceholder { path } => {
                write!(
                    f,
                    "no frame placeholder in sequence destination {}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Copy { source, .. }
            | FileError::CreateDir { source, .. }
            | FileError::Delete { source, .. } => Some(source),
            FileError::MissingFrameNumber { .. }
            | FileError::MissingFramePlaceholder { .. } => None,
        }
    }
}

/// Copy files to a publish destination, returning the paths written.
///
/// For a sequence, `dest_path` is a frame pattern (`%04d` or `#`s) and
/// each source file lands on the destination frame matching its own
/// frame number. A source that already sits at its destination is left
/// alone and still reported as written, so re-publishing in place is a
/// no-op rather than an error.
pub fn copy_files(
    source_files: &[PathBuf],
    dest_path: &Path,
    is_sequence: bool,
) -> Result<Vec<PathBuf>, FileError> {
    let mut written = Vec::with_capacity(source_files.len());

    for source in source_files {
        let dest = if is_sequence {
            let frame = pathutil::frame_number(source).ok_or_else(|| {
                FileError::MissingFrameNumber {
                    path: source.clone(),
                }
            })?;
            pathutil::path_for_frame(dest_path, &frame, None).ok_or_else(|| {
                FileError::MissingFramePlaceholder {
                    path: dest_path.to_path_buf(),
                }
            })?
        } else {
            dest_path.to_path_buf()
        };

        if *source == dest {
            debug!(path = %dest.display(), "file already at publish location");
            written.push(dest);
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| FileError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::copy(source, &dest).map_err(|err| FileError::Copy {
            source_path: source.clone(),
            dest_path: dest.clone(),
            source: err,
        })?;
        debug!(from = %source.display(), to = %dest.display(), "copied file");
        written.push(dest);
    }

    Ok(written)
}

/// Best-effort removal of published files. Every path is attempted;
/// failures are logged and returned rather than aborting the batch.
pub fn delete_files(paths: &[PathBuf]) -> Vec<FileError> {
    let mut failures = Vec::new();
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "deleted file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "file already gone");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to delete file");
                failures.push(FileError::Delete {
                    path: path.clone(),
                    source: err,
                });
            }
        }
    }
    failures
}
