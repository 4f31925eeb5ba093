// src/ledger/mod.rs

//! Install Ledger
//!
//! The ledger records which files under the install root were installed by
//! which mod, so deactivating a mod removes exactly its own claims. Several
//! mods may claim the same path (shared assets); a file entry disappears once
//! its last claim is retracted, and a mod entry once it claims nothing.
//!
//! The ledger is an explicit handle: open it once, pass it to the activation
//! functions, and call [`InstallLedger::commit`] after every mutation. There
//! is no write-behind.

mod document;
mod migrate;

pub use document::ModEntry;
pub use migrate::{CURRENT_VERSION, current_version};

use crate::error::{Error, Result};
use crate::filesystem::path::normalize_relative;
use crate::filesystem::write_atomic;
use crate::version::Version;
use crate::xml;
use document::LedgerDocument;
use rand::Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reserved mod name owning the values a mod overwrote
pub const ORIGINAL_VALUES: &str = "ORIGINAL_VALUES";
/// Reserved mod name owning values set by the tool itself
pub const FOMM: &str = "FOMM";

/// Length of a generated mod key
const KEY_LENGTH: usize = 8;

/// Generate a mod key not present in `used`
pub(crate) fn generate_key(used: &HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let key: String = (0..KEY_LENGTH)
            .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
            .collect();
        if !used.contains(&key) {
            return key;
        }
    }
}

/// The persisted install ledger
#[derive(Debug)]
pub struct InstallLedger {
    path: PathBuf,
    file_version: Version,
    document: LedgerDocument,
}

impl InstallLedger {
    /// Load the ledger at `path`, migrating it to the current schema
    ///
    /// A missing file yields an empty ledger that is written on the first
    /// commit. A migrated ledger is committed before this returns; if the
    /// migration fails the file on disk is left as it was.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!("No install log at {}, starting empty", path.display());
            return Ok(Self {
                path,
                file_version: current_version(),
                document: LedgerDocument::default(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let mut root = xml::parse(&content)?
            .ok_or_else(|| Error::format(format!("{} has no root element", path.display())))?;

        let migrated = migrate::migrate(&mut root)?;
        let document = LedgerDocument::from_element(&root)?;

        let mut ledger = Self {
            path,
            file_version: migrate::file_version(&root)?,
            document,
        };

        if migrated {
            ledger.commit()?;
            info!(
                "Install log {} migrated to schema {}",
                ledger.path.display(),
                CURRENT_VERSION
            );
        }

        debug!(
            "Loaded install log {} ({} mods, {} files)",
            ledger.path.display(),
            ledger.document.mods.len(),
            ledger.document.data_files.len()
        );

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version of the loaded document
    pub fn file_version(&self) -> &Version {
        &self.file_version
    }

    pub fn mods(&self) -> &[ModEntry] {
        &self.document.mods
    }

    /// Key of the mod registered under `name`
    pub fn mod_key(&self, name: &str) -> Option<&str> {
        self.document
            .mods
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.key.as_str())
    }

    /// Register a mod, returning its key
    ///
    /// A mod already registered under `name` keeps its key and has its
    /// version updated.
    pub fn register_mod(
        &mut self,
        name: &str,
        version: &str,
        machine_version: &Version,
    ) -> Result<String> {
        if name.is_empty() {
            return Err(Error::InvalidPath("mod name must not be empty".to_string()));
        }

        if let Some(entry) = self.document.mods.iter_mut().find(|m| m.name == name) {
            entry.version = version.to_string();
            entry.machine_version = machine_version.clone();
            return Ok(entry.key.clone());
        }

        let used: HashSet<String> = self.document.mods.iter().map(|m| m.key.clone()).collect();
        let key = generate_key(&used);
        self.document.mods.push(ModEntry {
            key: key.clone(),
            name: name.to_string(),
            version: version.to_string(),
            machine_version: machine_version.clone(),
        });

        debug!("Registered mod '{}' as {}", name, key);
        Ok(key)
    }

    /// Record that the mod `key` installed `path`
    pub fn record_install(&mut self, key: &str, path: &str) -> Result<()> {
        self.require_mod(key)?;
        let path = canonical_path(path)?;

        let owners = self.document.data_files.entry(path).or_default();
        if !owners.iter().any(|k| k == key) {
            owners.push(key.to_string());
        }
        Ok(())
    }

    /// Retract the claim of mod `key` on `path`
    ///
    /// Returns true if a claim was removed. The file entry is pruned when no
    /// claims remain, and the mod entry when it claims no file any more, so
    /// retracting an unknown key is a no-op.
    pub fn record_uninstall(&mut self, key: &str, path: &str) -> Result<bool> {
        let path = canonical_path(path)?;

        let Some(owners) = self.document.data_files.get_mut(&path) else {
            return Ok(false);
        };
        let before = owners.len();
        owners.retain(|k| k != key);
        let removed = owners.len() != before;

        if owners.is_empty() {
            self.document.data_files.remove(&path);
        }
        if removed {
            self.prune_mod(key);
        }
        Ok(removed)
    }

    /// Drop the mod entry for `key` if it claims nothing
    ///
    /// Reserved entries are never pruned.
    pub fn prune_mod(&mut self, key: &str) -> bool {
        if self.document.data_files.values().any(|owners| owners.iter().any(|k| k == key)) {
            return false;
        }

        let before = self.document.mods.len();
        self.document
            .mods
            .retain(|m| m.key != key || m.name == ORIGINAL_VALUES || m.name == FOMM);
        let pruned = self.document.mods.len() != before;
        if pruned {
            debug!("Pruned mod {} with no remaining files", key);
        }
        pruned
    }

    /// Files claimed by the mod `key`, in path order
    pub fn installed_files(&self, key: &str) -> Vec<&str> {
        self.document
            .data_files
            .iter()
            .filter(|(_, owners)| owners.iter().any(|k| k == key))
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Keys of the mods claiming `path`, in install order
    pub fn installing_mods(&self, path: &str) -> Vec<&str> {
        let path = normalize_relative(path);
        self.document
            .data_files
            .get(&path)
            .map(|owners| owners.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Write the ledger back to disk atomically
    pub fn commit(&mut self) -> Result<()> {
        let current = current_version();
        let root = self.document.to_element(&current);
        let content = xml::to_string(&root)?;
        write_atomic(&self.path, content.as_bytes())?;

        self.file_version = current;
        debug!("Committed install log {}", self.path.display());
        Ok(())
    }

    fn require_mod(&self, key: &str) -> Result<()> {
        if self.document.mods.iter().any(|m| m.key == key) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("mod key {} in install log", key)))
        }
    }
}

fn canonical_path(path: &str) -> Result<String> {
    let normalized = normalize_relative(path);
    if normalized.is_empty() {
        return Err(Error::InvalidPath(format!("empty data file path '{}'", path)));
    }
    Ok(normalized)
}
