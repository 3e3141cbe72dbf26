use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Zero-byte sentinel next to an enclosure meaning "accept this file even
/// though it fails the size check". Written after download attempts are
/// exhausted; never deleted here.
pub const MARKER_SUFFIX: &str = ".sizeok";

// Declared lengths are routinely a little off from the actual payload
// (header padding, metadata stripping). Anything at or above this share of
// the declared size counts as intact.
const SIZE_TOLERANCE_PERCENT: f64 = 98.0;

pub fn marker_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(MARKER_SUFFIX);
    PathBuf::from(os)
}

pub fn has_override(path: &Path) -> bool {
    marker_path(path).is_file()
}

pub fn write_marker(path: &Path) -> io::Result<()> {
    fs::File::create(marker_path(path)).map(|_| ())
}

/// Is the local copy at `path` good enough to serve?
/// Override marker wins unconditionally; otherwise the file must exist and,
/// when the feed declared a length, be within tolerance of it.
pub fn is_usable(path: &Path, declared_len: Option<u64>) -> bool {
    if has_override(path) {
        return true;
    }
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    // Absent (or zero) declared length: existence is all we can check.
    let Some(declared) = declared_len.filter(|len| *len > 0) else {
        return true;
    };
    let percent = meta.len() as f64 / declared as f64 * 100.0;
    if percent >= SIZE_TOLERANCE_PERCENT {
        true
    } else {
        warn!(
            "truncated file {}: {} of {} bytes ({}%)",
            path.display(),
            meta.len(),
            declared,
            percent.round()
        );
        false
    }
}
