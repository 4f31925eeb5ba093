// src/archive/mod.rs

//! Read-only access to the entries of an archive container
//!
//! Sources dragged into a package do not have to live on the filesystem:
//! a folder or file inside a zip archive is addressed with an archive source
//! of the form
//!
//! ```text
//! archive://<container path>//<inner path>
//! ```
//!
//! where the first `//` after the container path separates it from the
//! inner path. Inner paths are canonical relative paths (`/` separators, no
//! leading or trailing separator); the empty inner path is the archive root.
//!
//! [`Archive`] indexes a container once and answers directory queries from
//! the index. Directories that only exist implicitly (as the prefix of a
//! file entry) are directories all the same.

use crate::error::{Error, Result};
use crate::filesystem::path::{file_name, normalize_relative, parent};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Prefix marking a source as living inside an archive
pub const ARCHIVE_PREFIX: &str = "archive://";

/// Separator between the container path and the inner path
const INNER_SEPARATOR: &str = "//";

/// A location inside an archive container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchivePath {
    /// Filesystem path of the container
    pub container: PathBuf,
    /// Canonical inner path, empty for the archive root
    pub inner: String,
}

impl ArchivePath {
    /// Create an archive path, canonicalising the inner path
    pub fn new(container: impl Into<PathBuf>, inner: &str) -> Self {
        Self {
            container: container.into(),
            inner: normalize_relative(inner),
        }
    }

    /// Parse an `archive://` source string
    ///
    /// Returns `None` for strings without the archive prefix or without a
    /// container path.
    pub fn parse(source: &str) -> Option<Self> {
        let rest = source.strip_prefix(ARCHIVE_PREFIX)?;
        let (container, inner) = match rest.find(INNER_SEPARATOR) {
            Some(pos) => (&rest[..pos], &rest[pos + INNER_SEPARATOR.len()..]),
            None => (rest, ""),
        };

        if container.is_empty() {
            return None;
        }

        Some(Self::new(container, inner))
    }

    /// Returns true if `source` uses the archive prefix
    pub fn is_archive_source(source: &str) -> bool {
        source.starts_with(ARCHIVE_PREFIX)
    }

    /// Render back to an `archive://` source string
    pub fn to_source(&self) -> String {
        format!(
            "{}{}{}{}",
            ARCHIVE_PREFIX,
            self.container.to_string_lossy(),
            INNER_SEPARATOR,
            self.inner
        )
    }

    /// Another location in the same container
    pub fn with_inner(&self, inner: &str) -> Self {
        Self::new(self.container.clone(), inner)
    }

    /// The entry `name` directly below this location
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            self.with_inner(name)
        } else {
            self.with_inner(&format!("{}/{}", self.inner, name))
        }
    }

    /// Returns true for the archive root
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// Display name: last inner segment, or the container file name at the root
    pub fn name(&self) -> String {
        if self.is_root() {
            self.container
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            file_name(&self.inner).to_string()
        }
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_source())
    }
}

/// An indexed, read-only archive container
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    /// Canonical file path -> raw entry name as stored in the container
    files: HashMap<String, String>,
    directories: BTreeSet<String>,
}

impl Archive {
    /// Open and index an archive
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::NotFound(format!("archive {}: {}", path.display(), e))
        })?;
        let archive = ZipArchive::new(BufReader::new(file))?;

        let mut files = HashMap::new();
        let mut directories = BTreeSet::new();

        for raw in archive.file_names() {
            let canonical = normalize_relative(raw);
            if canonical.is_empty() {
                continue;
            }

            // Every prefix of an entry is a directory, listed or not
            let mut prefix = parent(&canonical);
            while let Some(dir) = prefix {
                directories.insert(dir.to_string());
                prefix = parent(dir);
            }

            if raw.ends_with('/') || raw.ends_with('\\') {
                directories.insert(canonical);
            } else {
                files.insert(canonical, raw.to_string());
            }
        }

        debug!(
            "Indexed archive {}: {} files, {} directories",
            path.display(),
            files.len(),
            directories.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            files,
            directories,
        })
    }

    /// Container path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if `inner` names a file or directory in the archive
    pub fn exists(&self, inner: &str) -> bool {
        let inner = normalize_relative(inner);
        inner.is_empty() || self.files.contains_key(&inner) || self.directories.contains(&inner)
    }

    /// Returns true if `inner` names a directory (the root is a directory)
    pub fn is_directory(&self, inner: &str) -> bool {
        let inner = normalize_relative(inner);
        inner.is_empty() || self.directories.contains(&inner)
    }

    /// Immediate subdirectories of `inner`, as full inner paths
    pub fn directories(&self, inner: &str) -> Vec<String> {
        let inner = normalize_relative(inner);
        let mut found: Vec<String> = self
            .directories
            .iter()
            .filter(|d| is_immediate_child(&inner, d))
            .cloned()
            .collect();
        sort_case_insensitive(&mut found);
        found
    }

    /// Immediate files of `inner`, as full inner paths
    pub fn files(&self, inner: &str) -> Vec<String> {
        let inner = normalize_relative(inner);
        let mut found: Vec<String> = self
            .files
            .keys()
            .filter(|f| is_immediate_child(&inner, f))
            .cloned()
            .collect();
        sort_case_insensitive(&mut found);
        found
    }

    /// Every file in the archive below `inner`, as full inner paths
    pub fn files_recursive(&self, inner: &str) -> Vec<String> {
        let inner = normalize_relative(inner);
        let mut found: Vec<String> = self
            .files
            .keys()
            .filter(|f| inner.is_empty() || f.starts_with(&format!("{}/", inner)))
            .cloned()
            .collect();
        sort_case_insensitive(&mut found);
        found
    }

    /// Read the content of a file entry
    pub fn read(&self, inner: &str) -> Result<Vec<u8>> {
        let inner = normalize_relative(inner);
        let raw = self.files.get(&inner).ok_or_else(|| {
            Error::NotFound(format!("{} in archive {}", inner, self.path.display()))
        })?;

        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let mut entry = archive.by_name(raw)?;

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        Ok(content)
    }
}

fn is_immediate_child(dir: &str, candidate: &str) -> bool {
    parent(candidate).unwrap_or("") == dir
}

fn sort_case_insensitive(paths: &mut [String]) {
    paths.sort_by_key(|p| p.to_lowercase());
}
