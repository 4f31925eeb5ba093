// src/filesystem/path.rs

//! Path utilities shared by the tree mapper, the package container and the
//! install ledger
//!
//! Every path that is stored (destination paths in a package, inner archive
//! paths, ledger data-file paths) is kept in one canonical relative form:
//! `/` separators, no leading root segment, no empty or `.` segments.
//! Paths arriving from packages are untrusted and additionally must not
//! contain `..` segments before they are joined onto an install root.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Canonicalise separators and drop root, empty and `.` segments
///
/// `..` segments are preserved; use [`sanitize_relative`] for untrusted input.
///
/// # Examples
///
/// ```
/// use fomm::filesystem::path::normalize_relative;
///
/// assert_eq!(normalize_relative("\\Data\\Meshes\\a.nif"), "Data/Meshes/a.nif");
/// assert_eq!(normalize_relative("/textures//./b.dds/"), "textures/b.dds");
/// ```
pub fn normalize_relative(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalise an untrusted relative path, rejecting traversal and empty paths
pub fn sanitize_relative(path: &str) -> Result<String> {
    let normalized = normalize_relative(path);

    if normalized.split('/').any(|segment| segment == "..") {
        return Err(Error::PathTraversal(path.to_string()));
    }

    if normalized.is_empty() {
        return Err(Error::InvalidPath(format!(
            "empty path after normalization: '{}'",
            path
        )));
    }

    Ok(normalized)
}

/// Safely join a root with an untrusted relative path
///
/// # Examples
///
/// ```
/// use fomm::filesystem::path::safe_join;
/// use std::path::{Path, PathBuf};
///
/// let root = Path::new("/games/Data");
/// assert_eq!(
///     safe_join(root, "meshes\\armor.nif").unwrap(),
///     PathBuf::from("/games/Data/meshes/armor.nif")
/// );
/// assert!(safe_join(root, "../Oblivion.ini").is_err());
/// ```
pub fn safe_join(root: impl AsRef<Path>, path: &str) -> Result<PathBuf> {
    let root = root.as_ref();
    let sanitized = sanitize_relative(path)?;
    let joined = root.join(&sanitized);

    if !joined.starts_with(root) {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Last segment of a `/`- or `\`-separated path
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Everything before the last segment of a normalised path, `None` at the top level
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|pos| &path[..pos])
}

/// Strip a leading directory segment, comparing case-insensitively
///
/// Returns `None` when the path does not start with `segment`.
pub fn strip_leading_segment<'a>(path: &'a str, segment: &str) -> Option<&'a str> {
    let (first, rest) = path.split_once('/')?;
    first.eq_ignore_ascii_case(segment).then_some(rest)
}
