// src/mapper/source.rs

//! Classification and enumeration of raw source strings
//!
//! A source is one of:
//! - a filesystem path (`/home/user/mods/cities/textures`)
//! - an archive entry (`archive:///home/user/cities.zip//textures`)
//! - a virtual folder created by the user (`new://Folder Name`)

use crate::archive::{Archive, ArchivePath};
use crate::error::{Error, Result};
use crate::filesystem::path::file_name;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix marking a virtual folder with no backing content
pub const NEW_PREFIX: &str = "new://";

/// Build the source string for a virtual folder
pub fn virtual_source(name: &str) -> String {
    format!("{}{}", NEW_PREFIX, name)
}

/// Returns true for virtual folder sources
pub fn is_virtual(source: &str) -> bool {
    source.starts_with(NEW_PREFIX)
}

/// What a raw source string refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Filesystem(PathBuf),
    Archive(ArchivePath),
    Virtual(String),
}

impl SourceKind {
    /// Classify a raw source string
    pub fn classify(source: &str) -> Self {
        if let Some(name) = source.strip_prefix(NEW_PREFIX) {
            return Self::Virtual(name.to_string());
        }
        match ArchivePath::parse(source) {
            Some(path) => Self::Archive(path),
            None => Self::Filesystem(PathBuf::from(source)),
        }
    }

    /// Name the source takes in the destination tree
    pub fn name(&self) -> String {
        match self {
            Self::Filesystem(path) => file_name(&path.to_string_lossy()).to_string(),
            Self::Archive(path) => path.name(),
            Self::Virtual(name) => name.clone(),
        }
    }
}

/// Answers existence and listing queries for sources, caching opened archives
#[derive(Debug, Default)]
pub struct SourceResolver {
    archives: HashMap<PathBuf, Archive>,
}

impl SourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reuse) the archive at `container`
    pub fn archive(&mut self, container: &Path) -> Result<&Archive> {
        if !self.archives.contains_key(container) {
            let archive = Archive::open(container)?;
            self.archives.insert(container.to_path_buf(), archive);
        }
        self.archives
            .get(container)
            .ok_or_else(|| Error::NotFound(container.display().to_string()))
    }

    /// Returns `Some(is_directory)` for a usable source, `None` if it has
    /// vanished or is a system-hidden filesystem entry
    pub fn inspect(&mut self, source: &str) -> Option<bool> {
        match SourceKind::classify(source) {
            SourceKind::Virtual(_) => Some(true),
            SourceKind::Filesystem(path) => {
                let metadata = fs::metadata(&path).ok()?;
                if is_system_hidden(&metadata) {
                    debug!("Skipping system entry {}", path.display());
                    return None;
                }
                Some(metadata.is_dir())
            }
            SourceKind::Archive(path) => {
                let archive = match self.archive(&path.container) {
                    Ok(archive) => archive,
                    Err(e) => {
                        debug!("Cannot open archive for {}: {}", source, e);
                        return None;
                    }
                };
                archive
                    .exists(&path.inner)
                    .then(|| archive.is_directory(&path.inner))
            }
        }
    }

    /// Returns true if the source is a directory (virtual folders included)
    pub fn is_directory(&mut self, source: &str) -> bool {
        self.inspect(source).unwrap_or(false)
    }

    /// Immediate children of a directory source: directories first, then
    /// files, each group sorted by name ignoring case
    ///
    /// Virtual folders have no children. A vanished source is `NotFound`.
    pub fn children(&mut self, source: &str) -> Result<Vec<String>> {
        match SourceKind::classify(source) {
            SourceKind::Virtual(_) => Ok(Vec::new()),
            SourceKind::Filesystem(path) => list_directory(&path),
            SourceKind::Archive(path) => {
                let archive = self.archive(&path.container)?;
                if !archive.is_directory(&path.inner) {
                    return Err(Error::NotFound(source.to_string()));
                }
                Ok(archive
                    .directories(&path.inner)
                    .into_iter()
                    .chain(archive.files(&path.inner))
                    .map(|inner| path.with_inner(&inner).to_source())
                    .collect())
            }
        }
    }
}

fn list_directory(path: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(path)
        .map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;

    let mut directories = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let child = entry.path();
        match entry.metadata() {
            Ok(m) if m.is_dir() => directories.push(child),
            Ok(_) => files.push(child),
            Err(e) => debug!("Skipping unreadable entry {}: {}", child.display(), e),
        }
    }

    for group in [&mut directories, &mut files] {
        group.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()));
    }

    Ok(directories
        .into_iter()
        .chain(files)
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

#[cfg(windows)]
fn is_system_hidden(metadata: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
}

#[cfg(not(windows))]
fn is_system_hidden(_metadata: &fs::Metadata) -> bool {
    false
}
