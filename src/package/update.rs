// src/package/update.rs

//! Scoped mutation of a package container
//!
//! Changes are staged in a [`PackageUpdate`] and applied in one pass: the
//! untouched entries are raw-copied into a new archive next to the original,
//! staged entries are appended, and the new archive is renamed over the old
//! one. Until the rename the original container is never modified, so a
//! failure at any point leaves the last committed state in place.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entries to add or delete in one transaction
#[derive(Debug, Default)]
pub struct PackageUpdate {
    /// Lower-cased name -> (entry name, content)
    adds: BTreeMap<String, (String, Vec<u8>)>,
    /// Lower-cased names
    deletes: BTreeSet<String>,
}

impl PackageUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn add(&mut self, name: &str, content: impl Into<Vec<u8>>) {
        let key = name.to_lowercase();
        self.deletes.remove(&key);
        self.adds.insert(key, (name.to_string(), content.into()));
    }

    /// Delete an entry (a no-op if the container does not have it)
    pub fn delete(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.adds.remove(&key);
        self.deletes.insert(key);
    }

    /// Returns true if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty()
    }

    fn touches(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.adds.contains_key(&key) || self.deletes.contains(&key)
    }
}

/// Apply staged changes to the container at `path`
pub(crate) fn apply(path: &Path, update: &PackageUpdate) -> Result<()> {
    rewrite(path, update).map_err(|e| match e {
        Error::TransactionError(_) => e,
        other => Error::TransactionError(format!(
            "failed to update {}: {}",
            path.display(),
            other
        )),
    })
}

fn rewrite(path: &Path, update: &PackageUpdate) -> Result<()> {
    let mut source = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = ZipWriter::new(temp.as_file_mut());

        for index in 0..source.len() {
            let entry = source.by_index_raw(index)?;
            if update.touches(entry.name()) {
                debug!("Replacing entry {}", entry.name());
                continue;
            }
            writer.raw_copy_file(entry)?;
        }

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in update.adds.values() {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
        }

        writer.finish()?;
    }
    drop(source);

    temp.as_file().sync_all()?;
    temp.persist(path)?;

    Ok(())
}
