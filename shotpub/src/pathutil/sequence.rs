//! Frame-sequence discovery on disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{frame_regex, path_for_frame};

/// One discovered frame sequence: a pattern path plus the ordered files
/// that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    /// Pattern path with the frame number replaced by a width-matched
    /// printf-style placeholder.
    pub pattern: PathBuf,

    /// Matching files, sorted lexicographically. Because the padding width
    /// is fixed within a sequence this ordering is also numeric.
    pub files: Vec<PathBuf>,
}

/// Expand a sequence pattern path and list the matching files on disk.
///
/// The placeholder is replaced with a wildcard and globbed. Files are
/// sorted lexicographically, which is numerically correct because padding
/// width is fixed. Returns an empty list when the path has no placeholder
/// or nothing matches.
pub fn sequence_files(pattern_path: &Path) -> Vec<PathBuf> {
    let Some(glob_path) = path_for_frame(pattern_path, "*", None) else {
        return Vec::new();
    };
    let Some(glob_str) = glob_path.to_str() else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = match glob::glob(glob_str) {
        Ok(paths) => paths.flatten().filter(|p| p.is_file()).collect(),
        Err(_) => Vec::new(),
    };

    files.sort();
    files
}

/// Scan one folder (non-recursive) for files that appear to carry frame
/// numbers and group them into sequences.
///
/// Files are grouped by `(prefix, extension)`; mixed extensions in the
/// same folder yield separate sequences. Files without a detectable frame
/// number are ignored, as are subfolders. When `extensions` is given, only
/// sequences with those extensions are reported.
///
/// # Errors
///
/// Returns an error if the folder cannot be read.
pub fn frame_sequences(
    folder: &Path,
    extensions: Option<&[&str]>,
) -> io::Result<Vec<FrameSequence>> {
    debug!(folder = %folder.display(), "scanning folder for frame sequences");

    // Keyed by filename-without-frame so each (prefix, extension) pair
    // forms one group. BTreeMap keeps the result deterministic.
    let mut groups: BTreeMap<String, FrameSequence> = BTreeMap::new();

    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = frame_regex().captures(filename) else {
            continue;
        };

        let prefix = caps.get(1).unwrap().as_str();
        let sep = caps.get(2).unwrap().as_str();
        let frame = caps.get(3).unwrap().as_str();
        let ext = caps.get(4).unwrap().as_str();

        if let Some(wanted) = extensions {
            if !wanted.contains(&ext) {
                continue;
            }
        }

        let key = format!("{}.{}", prefix, ext);
        let sequence = groups.entry(key).or_insert_with(|| {
            let pattern = folder.join(format!("{}{}%0{}d.{}", prefix, sep, frame.len(), ext));
            debug!(pattern = %pattern.display(), "found sequence");
            FrameSequence {
                pattern,
                files: Vec::new(),
            }
        });
        sequence.files.push(path);
    }

    let mut sequences: Vec<FrameSequence> = groups.into_values().collect();
    for sequence in &mut sequences {
        sequence.files.sort();
    }
    Ok(sequences)
}
