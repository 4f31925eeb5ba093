// src/ledger/document.rs

//! Current-schema ledger document
//!
//! ```xml
//! <installLog fileVersion="0.2.0.0">
//!   <modList>
//!     <mod name="better cities" key="qdqaaqvc">
//!       <version machineVersion="1.5">1.5</version>
//!     </mod>
//!   </modList>
//!   <dataFiles>
//!     <file path="meshes/cities/wall.nif">
//!       <installingMods>
//!         <mod key="qdqaaqvc" />
//!       </installingMods>
//!     </file>
//!   </dataFiles>
//! </installLog>
//! ```

use crate::error::{Error, Result};
use crate::filesystem::path::normalize_relative;
use crate::version::Version;
use crate::xml::Element;
use std::collections::BTreeMap;
use tracing::warn;

pub(crate) const ROOT: &str = "installLog";
pub(crate) const MOD_LIST: &str = "modList";
pub(crate) const DATA_FILES: &str = "dataFiles";
pub(crate) const INSTALLING_MODS: &str = "installingMods";
pub(crate) const FILE_VERSION_ATTR: &str = "fileVersion";

/// One installed mod as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    /// Opaque generated key referenced by data-file claims
    pub key: String,
    pub name: String,
    /// Display version
    pub version: String,
    pub machine_version: Version,
}

/// Parsed ledger content
#[derive(Debug, Default)]
pub(crate) struct LedgerDocument {
    pub mods: Vec<ModEntry>,
    /// Canonical path -> keys of the mods claiming it, in install order
    pub data_files: BTreeMap<String, Vec<String>>,
}

impl LedgerDocument {
    /// Read a document already migrated to the current schema
    pub fn from_element(root: &Element) -> Result<Self> {
        let mut document = Self::default();

        if let Some(list) = root.child(MOD_LIST) {
            for el in list.children_named("mod") {
                document.mods.push(parse_mod(el)?);
            }
        }

        if let Some(files) = root.child(DATA_FILES) {
            for el in files.children_named("file") {
                let raw = el
                    .attr("path")
                    .ok_or_else(|| Error::format("data file entry without a path"))?;
                let path = normalize_relative(raw);
                if path.is_empty() {
                    return Err(Error::format(format!("invalid data file path '{}'", raw)));
                }

                let claims = el
                    .child(INSTALLING_MODS)
                    .into_iter()
                    .flat_map(|m| m.children_named("mod"))
                    .filter_map(|m| m.attr("key"));
                for key in claims {
                    if !document.mods.iter().any(|m| m.key == key) {
                        warn!("Ignoring claim on {} by unknown mod key {}", path, key);
                        continue;
                    }
                    let owners = document.data_files.entry(path.clone()).or_default();
                    if !owners.iter().any(|k| k == key) {
                        owners.push(key.to_string());
                    }
                }
            }
        }

        Ok(document)
    }

    /// Build the document element for `file_version`
    pub fn to_element(&self, file_version: &Version) -> Element {
        let mut mod_list = Element::new(MOD_LIST);
        for entry in &self.mods {
            mod_list.push(
                Element::new("mod")
                    .with_attr("name", entry.name.as_str())
                    .with_attr("key", entry.key.as_str())
                    .with_child(
                        Element::new("version")
                            .with_attr("machineVersion", entry.machine_version.to_string())
                            .with_text(entry.version.as_str()),
                    ),
            );
        }

        let mut data_files = Element::new(DATA_FILES);
        for (path, owners) in &self.data_files {
            let mut installing = Element::new(INSTALLING_MODS);
            for key in owners {
                installing.push(Element::new("mod").with_attr("key", key.as_str()));
            }
            data_files.push(
                Element::new("file")
                    .with_attr("path", path.as_str())
                    .with_child(installing),
            );
        }

        Element::new(ROOT)
            .with_attr(FILE_VERSION_ATTR, file_version.to_string())
            .with_child(mod_list)
            .with_child(data_files)
    }
}

fn parse_mod(el: &Element) -> Result<ModEntry> {
    let key = el
        .attr("key")
        .ok_or_else(|| Error::format("mod entry without a key"))?;
    let name = el
        .attr("name")
        .ok_or_else(|| Error::format(format!("mod entry {} without a name", key)))?;

    let (version, machine_version) = match el.child("version") {
        Some(v) => {
            let machine = v
                .attr("machineVersion")
                .map(Version::parse)
                .transpose()?
                .unwrap_or_else(|| Version::new(1, 0));
            (v.text(), machine)
        }
        None => ("1.0".to_string(), Version::new(1, 0)),
    };

    Ok(ModEntry {
        key: key.to_string(),
        name: name.to_string(),
        version,
        machine_version,
    })
}
