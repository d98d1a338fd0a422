//! Path inference utilities.
//!
//! Pure, host-independent inference over file paths: frame-sequence
//! detection and replacement, version-number extraction and incrementing,
//! and publish-name derivation. The only I/O performed here is directory
//! listing for sequence discovery.
//!
//! # Conventions
//!
//! - A *version token* is a trailing `v<digits>` run delimited by `.`, `_`
//!   or `-` and sitting just before the optional extension
//!   (`scene.v002.ma`). The `v` marker is case-insensitive.
//! - A *frame token* is a trailing purely-numeric run delimited by `.`, `_`
//!   or `-` and sitting just before the extension (`render.1001.exr`).
//!   Only the rightmost candidate is considered.
//! - Sequence patterns use printf-style placeholders (`render.%04d.exr`)
//!   whose width matches the discovered zero padding.
//!
//! Functions return `None` when no token is present; callers must treat
//! that as "not applicable" rather than an error.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

mod sequence;

pub use sequence::{frame_sequences, sequence_files, FrameSequence};

/// Maximum number of on-disk probes when searching for a free version slot.
const MAX_VERSION_PROBES: u32 = 10_000;

/// Errors from version-probing helpers.
#[derive(Debug, Error)]
pub enum PathError {
    /// The next version path could not be derived mid-probe.
    #[error("cannot determine next version for {0}")]
    CannotDetermineNextVersion(PathBuf),

    /// The probe loop hit its iteration bound without finding a free slot.
    #[error("no available version slot found for {0}")]
    ProbeLimitExceeded(PathBuf),

    /// The supplied save callback failed.
    #[error("failed to save {path}: {source}")]
    SaveFailed { path: PathBuf, source: io::Error },
}

/// Matches a trailing `v<digits>` version token before an optional extension.
fn version_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(.*)([._-])v(\d+)(?:\.(\S+))?$").unwrap())
}

/// Matches a trailing numeric frame token before the extension.
fn frame_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.*)([._-])(\d+)\.(\S+)$").unwrap())
}

/// Matches a printf-style frame placeholder of any width before the extension.
fn frame_spec_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.*)([._-])%0(\d+)d\.(\S+)$").unwrap())
}

/// Split a path into its folder and UTF-8 filename.
///
/// Paths with non-UTF-8 filenames are not supported by the inference
/// helpers and yield `None`.
fn split_path(path: &Path) -> Option<(&Path, &str)> {
    let filename = path.file_name()?.to_str()?;
    let folder = path.parent().unwrap_or_else(|| Path::new(""));
    Some((folder, filename))
}

/// Derive the display name to use when publishing the given path.
///
/// Strips a trailing version token and collapses a trailing frame number
/// (or frame placeholder) into a run of `#` characters of matching width,
/// so the name stays stable across versions and frames:
///
/// ```
/// use std::path::Path;
/// use shotpub::pathutil::publish_name;
///
/// assert_eq!(publish_name(Path::new("/p/scene.v001.ma")), "scene.ma");
/// assert_eq!(publish_name(Path::new("/p/shot.0042.jpg")), "shot.####.jpg");
/// ```
///
/// Applying this to an already-derived name is a no-op.
pub fn publish_name(path: &Path) -> String {
    debug!(path = %path.display(), "deriving publish name");

    // Normalize a placeholder path to a concrete frame so the frame regex
    // below sees digits.
    let concrete;
    let path = match path_for_frame(path, "1001", None) {
        Some(p) => {
            concrete = p;
            concrete.as_path()
        }
        None => path,
    };

    let Some((_, filename)) = split_path(path) else {
        return String::new();
    };
    let mut filename = filename.to_string();

    if let Some(caps) = frame_regex().captures(&filename) {
        let prefix = caps.get(1).unwrap().as_str();
        let sep = caps.get(2).unwrap().as_str();
        let hashes = "#".repeat(caps.get(3).unwrap().as_str().len());
        let ext = caps.get(4).unwrap().as_str();
        filename = format!("{}{}{}.{}", prefix, sep, hashes, ext);
    }

    let framed = filename;
    let mut filename = framed.clone();
    if let Some(caps) = version_regex().captures(&framed) {
        filename = caps.get(1).unwrap().as_str().to_string();
        if let Some(ext) = caps.get(4) {
            filename = format!("{}.{}", filename, ext.as_str());
        }
    }

    filename
}

/// Extract the version number from the supplied path.
///
/// Returns `None` if no version token is present.
pub fn version_number(path: &Path) -> Option<u32> {
    let (_, filename) = split_path(path)?;
    let caps = version_regex().captures(filename)?;
    caps.get(3).unwrap().as_str().parse().ok()
}

/// Extract the frame number from the supplied path.
///
/// The frame is returned as a string so leading zero padding survives a
/// round trip through [`path_for_frame`]. Returns `None` if no frame token
/// is present.
pub fn frame_number(path: &Path) -> Option<String> {
    let (_, filename) = split_path(path)?;
    let caps = frame_regex().captures(filename)?;
    Some(caps.get(3).unwrap().as_str().to_string())
}

/// Substitute a frame value into a path carrying a frame placeholder.
///
/// `frame` may itself be a wildcard (`*`) for later glob matching. If
/// `frame_spec` is given, that literal token is located and replaced;
/// otherwise any printf-style `%0<n>d` placeholder is matched.
///
/// Returns `None` when the path carries no matching placeholder. That is a
/// normal outcome, not an error.
pub fn path_for_frame(path: &Path, frame: &str, frame_spec: Option<&str>) -> Option<PathBuf> {
    let (folder, filename) = split_path(path)?;

    let caps = match frame_spec {
        Some(spec) => {
            let pattern =
                Regex::new(&format!(r"^(.*)([._-])({})\.(\S+)$", regex::escape(spec))).ok()?;
            let caps = pattern.captures(filename)?;
            let prefix = caps.get(1).unwrap().as_str().to_string();
            let sep = caps.get(2).unwrap().as_str().to_string();
            let ext = caps.get(4).unwrap().as_str().to_string();
            (prefix, sep, ext)
        }
        None => {
            let caps = frame_spec_regex().captures(filename)?;
            let prefix = caps.get(1).unwrap().as_str().to_string();
            let sep = caps.get(2).unwrap().as_str().to_string();
            let ext = caps.get(4).unwrap().as_str().to_string();
            (prefix, sep, ext)
        }
    };

    let (prefix, sep, ext) = caps;
    Some(folder.join(format!("{}{}{}.{}", prefix, sep, frame, ext)))
}

/// Generalize one concrete sequence file into its pattern path.
///
/// The frame number is replaced with a printf-style placeholder whose width
/// matches the file's zero padding (`render.1001.exr` becomes
/// `render.%04d.exr`). A path that already carries a placeholder is
/// returned normalized. Returns `None` if the path has no frame number.
pub fn sequence_pattern(path: &Path) -> Option<PathBuf> {
    // A placeholder path is made concrete first so one code path handles
    // both forms.
    let concrete;
    let path = match path_for_frame(path, "1001", None) {
        Some(p) => {
            concrete = p;
            concrete.as_path()
        }
        None => path,
    };

    let (folder, filename) = split_path(path)?;
    let caps = frame_regex().captures(filename)?;

    let prefix = caps.get(1).unwrap().as_str();
    let sep = caps.get(2).unwrap().as_str();
    let padding = caps.get(3).unwrap().as_str().len();
    let ext = caps.get(4).unwrap().as_str();

    Some(folder.join(format!("{}{}%0{}d.{}", prefix, sep, padding, ext)))
}

/// Increment the version token found in the supplied path.
///
/// Padding width is preserved (`v007` becomes `v008`); when the
/// incremented number no longer fits, the width grows (`v999` becomes
/// `v1000`). That overflow behavior is intentional. Returns `None` if the
/// path carries no version token.
pub fn next_version_path(path: &Path) -> Option<PathBuf> {
    let (folder, filename) = split_path(path)?;
    let caps = version_regex().captures(filename)?;

    let prefix = caps.get(1).unwrap().as_str();
    let sep = caps.get(2).unwrap().as_str();
    let version_str = caps.get(3).unwrap().as_str();
    let padding = version_str.len();
    let next: u64 = version_str.parse::<u64>().ok()? + 1;

    let mut filename = format!("{}{}v{:0width$}", prefix, sep, next, width = padding);
    if let Some(ext) = caps.get(4) {
        filename = format!("{}.{}", filename, ext.as_str());
    }

    Some(folder.join(filename))
}

/// Return both the next version path and the next version number.
///
/// Either element is `None` when the corresponding token cannot be found.
pub fn next_version_info(path: &Path) -> (Option<PathBuf>, Option<u32>) {
    let next_path = next_version_path(path);
    let next_version = version_number(path).map(|v| v + 1);
    (next_path, next_version)
}

/// Insert a version token into a path that has none.
///
/// The token is inserted just before the extension with three-digit
/// padding (`scene.ma` with version 2 becomes `scene.v002.ma`). A path
/// that already carries a version token is returned unchanged.
pub fn inject_version_path(path: &Path, version: u32) -> PathBuf {
    let Some((folder, filename)) = split_path(path) else {
        return path.to_path_buf();
    };

    if version_regex().is_match(filename) {
        return path.to_path_buf();
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (filename, None),
    };

    let filename = match ext {
        Some(ext) => format!("{}.v{:03}.{}", stem, version, ext),
        None => format!("{}.v{:03}", stem, version),
    };

    folder.join(filename)
}

/// Save the supplied path to the next version number free on disk.
///
/// Derives successive version paths until one does not exist, then invokes
/// `save` with the winning path. Returns `Ok(None)` when the path carries
/// no version token (nothing to bump). The probe loop is bounded; if the
/// next version path ever becomes underivable mid-loop the function aborts
/// instead of spinning.
///
/// # Errors
///
/// Returns [`PathError::CannotDetermineNextVersion`] if version derivation
/// fails mid-probe, [`PathError::ProbeLimitExceeded`] if no free slot is
/// found within the bound, and [`PathError::SaveFailed`] if the callback
/// fails.
pub fn save_to_next_available_version<F>(path: &Path, mut save: F) -> Result<Option<PathBuf>, PathError>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    if version_number(path).is_none() {
        debug!(
            path = %path.display(),
            "no version token detected, skipping version bump"
        );
        return Ok(None);
    }

    let mut candidate = next_version_path(path)
        .ok_or_else(|| PathError::CannotDetermineNextVersion(path.to_path_buf()))?;

    let mut probes = 0;
    while candidate.exists() {
        probes += 1;
        if probes > MAX_VERSION_PROBES {
            return Err(PathError::ProbeLimitExceeded(path.to_path_buf()));
        }
        candidate = next_version_path(&candidate)
            .ok_or_else(|| PathError::CannotDetermineNextVersion(path.to_path_buf()))?;
    }

    save(&candidate).map_err(|source| PathError::SaveFailed {
        path: candidate.clone(),
        source,
    })?;

    debug!(path = %candidate.display(), "saved next available version");
    Ok(Some(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_publish_name_strips_version() {
        let name = publish_name(Path::new("/proj/shotA/scene.v002.ma"));
        assert_eq!(name, "scene.ma");
    }

    #[test]
    fn test_publish_name_collapses_frame() {
        let name = publish_name(Path::new("/renders/my_file.001.jpg"));
        assert_eq!(name, "my_file.###.jpg");
    }

    #[test]
    fn test_publish_name_handles_version_and_frame() {
        let name = publish_name(Path::new("/renders/beauty_v007.1001.exr"));
        assert_eq!(name, "beauty.####.exr");
    }

    #[test]
    fn test_publish_name_without_tokens_is_noop() {
        assert_eq!(publish_name(Path::new("/proj/scene.ma")), "scene.ma");
    }

    #[test]
    fn test_publish_name_is_idempotent() {
        let once = publish_name(Path::new("/renders/shot.0042.jpg"));
        let twice = publish_name(Path::new("/renders").join(&once).as_path());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_publish_name_from_placeholder_path() {
        let name = publish_name(Path::new("/renders/shot.%04d.exr"));
        assert_eq!(name, "shot.####.exr");
    }

    #[test]
    fn test_version_number_extraction() {
        assert_eq!(version_number(Path::new("/p/scene.v002.ma")), Some(2));
        assert_eq!(version_number(Path::new("/p/scene_V011.nk")), Some(11));
        assert_eq!(version_number(Path::new("/p/scene.ma")), None);
    }

    #[test]
    fn test_version_number_rightmost_token_wins() {
        assert_eq!(version_number(Path::new("/p/v001/scene.v003.ma")), Some(3));
    }

    #[test]
    fn test_frame_number_preserves_padding() {
        assert_eq!(
            frame_number(Path::new("/r/shot.0042.jpg")),
            Some("0042".to_string())
        );
        assert_eq!(frame_number(Path::new("/r/shot.jpg")), None);
    }

    #[test]
    fn test_path_for_frame_substitutes_placeholder() {
        let path = path_for_frame(Path::new("/r/shot.%04d.exr"), "0042", None);
        assert_eq!(path, Some(PathBuf::from("/r/shot.0042.exr")));
    }

    #[test]
    fn test_path_for_frame_with_explicit_spec() {
        let path = path_for_frame(Path::new("/r/shot.{FRAME}.exr"), "7", Some("{FRAME}"));
        assert_eq!(path, Some(PathBuf::from("/r/shot.7.exr")));
    }

    #[test]
    fn test_path_for_frame_accepts_wildcard() {
        let path = path_for_frame(Path::new("/r/shot.%04d.exr"), "*", None);
        assert_eq!(path, Some(PathBuf::from("/r/shot.*.exr")));
    }

    #[test]
    fn test_path_for_frame_without_placeholder_is_none() {
        assert_eq!(path_for_frame(Path::new("/r/shot.exr"), "1", None), None);
    }

    #[test]
    fn test_sequence_pattern_round_trip() {
        let pattern = Path::new("/r/render.%04d.exr");
        let concrete = path_for_frame(pattern, "1001", None).unwrap();
        assert_eq!(sequence_pattern(&concrete), Some(pattern.to_path_buf()));
    }

    #[test]
    fn test_sequence_pattern_matches_padding_width() {
        let pattern = sequence_pattern(Path::new("/r/shot.01.jpg"));
        assert_eq!(pattern, Some(PathBuf::from("/r/shot.%02d.jpg")));
    }

    #[test]
    fn test_sequence_pattern_without_frame_is_none() {
        assert_eq!(sequence_pattern(Path::new("/r/shot.jpg")), None);
    }

    #[test]
    fn test_next_version_path_preserves_padding() {
        let next = next_version_path(Path::new("/proj/shotA/scene.v002.ma"));
        assert_eq!(next, Some(PathBuf::from("/proj/shotA/scene.v003.ma")));
    }

    #[test]
    fn test_next_version_path_width_growth_on_overflow() {
        let next = next_version_path(Path::new("/p/comp_v999.nk"));
        assert_eq!(next, Some(PathBuf::from("/p/comp_v1000.nk")));

        let stays = next_version_path(Path::new("/p/comp_v099.nk"));
        assert_eq!(stays, Some(PathBuf::from("/p/comp_v100.nk")));
    }

    #[test]
    fn test_next_version_path_without_token_is_none() {
        assert_eq!(next_version_path(Path::new("/p/comp.nk")), None);
    }

    #[test]
    fn test_next_version_increments_by_one() {
        let path = Path::new("/p/scene.v041.ma");
        let next = next_version_path(path).unwrap();
        assert_eq!(
            version_number(&next),
            Some(version_number(path).unwrap() + 1)
        );
    }

    #[test]
    fn test_next_version_info() {
        let (path, version) = next_version_info(Path::new("/p/scene.v007.ma"));
        assert_eq!(path, Some(PathBuf::from("/p/scene.v008.ma")));
        assert_eq!(version, Some(8));

        let (path, version) = next_version_info(Path::new("/p/scene.ma"));
        assert_eq!(path, None);
        assert_eq!(version, None);
    }

    #[test]
    fn test_inject_version_path() {
        assert_eq!(
            inject_version_path(Path::new("/p/scene.ma"), 2),
            PathBuf::from("/p/scene.v002.ma")
        );
        // Already versioned paths are returned unchanged.
        assert_eq!(
            inject_version_path(Path::new("/p/scene.v004.ma"), 2),
            PathBuf::from("/p/scene.v004.ma")
        );
    }

    #[test]
    fn test_save_to_next_available_version_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("scene.v001.ma");
        fs::write(&current, "a").unwrap();
        // v002 is taken, so the save should land on v003.
        fs::write(dir.path().join("scene.v002.ma"), "b").unwrap();

        let saved = save_to_next_available_version(&current, |p| fs::write(p, "c"))
            .unwrap()
            .unwrap();

        assert_eq!(saved, dir.path().join("scene.v003.ma"));
        assert!(saved.exists());
    }

    #[test]
    fn test_save_to_next_available_version_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("scene.ma");
        let saved = save_to_next_available_version(&current, |p| fs::write(p, "c")).unwrap();
        assert!(saved.is_none());
    }
}
