// src/ledger/migrate.rs

//! Ledger schema migrations
//!
//! Older ledgers are brought forward through an ordered chain of steps, one
//! per schema version. A ledger rewritten by a newer mod manager in the
//! known `0.5.0.0` layout is explicitly downgraded; any other newer schema is
//! refused.
//!
//! | Version   | Layout |
//! |-----------|--------|
//! | `0.1.0.0` | no `fileVersion`; mods and claims identified by `name` |
//! | `0.1.1.0` | generated `key` on mods, claims by key; raw paths |
//! | `0.2.0.0` | canonical `/` paths, every mod has a `version` child |
//! | `0.5.0.0` | foreign: `path` attribute and `name`/`installDate` children on mods, `data\` prefixed paths |

use super::document::{DATA_FILES, FILE_VERSION_ATTR, INSTALLING_MODS, MOD_LIST, ROOT};
use super::{FOMM, ORIGINAL_VALUES, generate_key};
use crate::error::{Error, Result};
use crate::filesystem::path::{normalize_relative, strip_leading_segment};
use crate::version::Version;
use crate::xml::Element;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

/// Schema written by this tool
pub const CURRENT_VERSION: &str = "0.2.0.0";

/// Schema assumed when `fileVersion` is absent
const INITIAL_VERSION: &str = "0.1.0.0";

/// Foreign schema that is downgraded instead of refused
const FOREIGN_VERSION: &str = "0.5.0.0";

const FOMOD_SUFFIX: &str = ".fomod";

type MigrationStep = fn(&mut Element) -> Result<()>;

/// Forward steps, each producing the schema it is listed with
const MIGRATIONS: &[(&str, MigrationStep)] = &[
    ("0.1.1.0", migrate_to_0_1_1_0),
    ("0.2.0.0", migrate_to_0_2_0_0),
];

/// The current schema version
pub fn current_version() -> Version {
    Version::new4(0, 2, 0, 0)
}

/// Schema version declared by a ledger document
pub fn file_version(root: &Element) -> Result<Version> {
    Version::parse(root.attr(FILE_VERSION_ATTR).unwrap_or(INITIAL_VERSION))
}

/// Bring a ledger document to the current schema in place
///
/// Returns true if the document changed and must be written back. On error
/// the document may be partially migrated and must be discarded.
pub fn migrate(root: &mut Element) -> Result<bool> {
    if root.name != ROOT {
        return Err(Error::format(format!(
            "unexpected root element '{}' in install log",
            root.name
        )));
    }

    let found = file_version(root)?;
    let current = current_version();

    if found == current {
        return Ok(false);
    }

    ensure_sections(root);

    if found == Version::parse(FOREIGN_VERSION)? {
        warn!(
            "Install log was written by another mod manager (schema {}), downgrading to {}",
            found, CURRENT_VERSION
        );
        downgrade_from_0_5_0_0(root)?;
        root.set_attr(FILE_VERSION_ATTR, CURRENT_VERSION);
        return Ok(true);
    }

    if found > current {
        return Err(Error::IncompatibleVersion(format!(
            "install log schema {} is newer than supported schema {}",
            found, CURRENT_VERSION
        )));
    }

    info!("Current install log schema: {}", found);
    for (version, step) in MIGRATIONS {
        if Version::parse(version)? <= found {
            continue;
        }
        info!("Applying install log migration to {}", version);
        step(root)?;
        root.set_attr(FILE_VERSION_ATTR, *version);
    }
    info!("Install log migration complete. Now at {}", CURRENT_VERSION);

    Ok(true)
}

/// Add the mod list and data file sections if the document lacks them
fn ensure_sections(root: &mut Element) {
    for name in [MOD_LIST, DATA_FILES] {
        if root.child(name).is_none() {
            root.push(Element::new(name));
        }
    }
}

fn section<'a>(root: &'a mut Element, name: &str) -> Result<&'a mut Element> {
    root.child_mut(name)
        .ok_or_else(|| Error::format(format!("install log has no {} section", name)))
}

/// 0.1.0.0 -> 0.1.1.0: give every mod a generated key and reference mods
/// from data files by key instead of by name
fn migrate_to_0_1_1_0(root: &mut Element) -> Result<()> {
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();

    let mods = section(root, MOD_LIST)?;
    for el in mods.elements_mut().filter(|e| e.name == "mod") {
        if let Some(key) = el.attr("key") {
            used.insert(key.to_string());
            if let Some(name) = el.attr("name") {
                keys.insert(name.to_string(), key.to_string());
            }
            continue;
        }
        let name = el
            .attr("name")
            .ok_or_else(|| Error::format("mod entry without a name"))?
            .to_string();
        let key = generate_key(&used);
        used.insert(key.clone());
        el.set_attr("key", key.as_str());
        keys.insert(name, key);
    }

    // Claims may name mods that never made it into the mod list
    let mut missing: Vec<(String, String)> = Vec::new();
    let files = section(root, DATA_FILES)?;
    for file in files.elements_mut().filter(|e| e.name == "file") {
        let Some(installing) = file.child_mut(INSTALLING_MODS) else {
            continue;
        };
        for claim in installing.elements_mut().filter(|e| e.name == "mod") {
            if claim.attr("key").is_some() {
                continue;
            }
            let name = claim
                .remove_attr("name")
                .ok_or_else(|| Error::format("mod claim without a name or key"))?;
            let key = match keys.get(&name) {
                Some(key) => key.clone(),
                None => {
                    let key = generate_key(&used);
                    used.insert(key.clone());
                    keys.insert(name.clone(), key.clone());
                    missing.push((name, key.clone()));
                    key
                }
            };
            claim.set_attr("key", key);
        }
    }

    let mods = section(root, MOD_LIST)?;
    for (name, key) in missing {
        warn!("Install log claims reference unlisted mod '{}', adding it", name);
        mods.push(Element::new("mod").with_attr("name", name).with_attr("key", key));
    }

    Ok(())
}

/// 0.1.1.0 -> 0.2.0.0: canonicalise data file paths (merging entries that
/// collapse onto the same path) and give every mod a version child
fn migrate_to_0_2_0_0(root: &mut Element) -> Result<()> {
    let mods = section(root, MOD_LIST)?;
    for el in mods.elements_mut().filter(|e| e.name == "mod") {
        if el.child("version").is_none() {
            el.push(
                Element::new("version")
                    .with_attr("machineVersion", "1.0")
                    .with_text("1.0"),
            );
        }
    }

    canonicalize_data_files(section(root, DATA_FILES)?, |raw| {
        let path = normalize_relative(raw);
        if path.is_empty() {
            Err(Error::format(format!("invalid data file path '{}'", raw)))
        } else {
            Ok(path)
        }
    })
}

/// 0.5.0.0 -> 0.2.0.0
///
/// Data file paths lose their leading `data` segment and are lowercased, so
/// case variants of one file merge into a single entry; a path outside `data`
/// was installed somewhere this tool cannot uninstall from and aborts the
/// downgrade. Mod entries take their name from the `path` attribute
/// (`Dummy Mod: ` prefix and `.fomod` suffix stripped, reserved values
/// mapped) and lose the `path` attribute and `name`/`installDate` children.
/// Mods without a `path` are dropped along with their claims.
fn downgrade_from_0_5_0_0(root: &mut Element) -> Result<()> {
    canonicalize_data_files(section(root, DATA_FILES)?, |raw| {
        let normalized = normalize_relative(raw);
        match strip_leading_segment(&normalized, "data") {
            Some(rest) if !rest.is_empty() => Ok(rest.to_lowercase()),
            _ => Err(Error::IncompatibleVersion(format!(
                "another mod manager installed the file {} which fomm cannot uninstall; \
                 the install log cannot be converted. Deactivate the mod that installed \
                 that file in the other mod manager and try again",
                raw
            ))),
        }
    })?;

    let mut dropped: HashSet<String> = HashSet::new();
    let mods = section(root, MOD_LIST)?;
    mods.retain_elements(|el| {
        if el.name == "mod" && el.attr("path").is_none() {
            if let Some(key) = el.attr("key") {
                dropped.insert(key.to_string());
            }
            return false;
        }
        true
    });

    for el in mods.elements_mut().filter(|e| e.name == "mod") {
        let Some(path) = el.remove_attr("path") else {
            continue;
        };
        el.set_attr("name", foreign_mod_name(&path));
        el.remove_children("name");
        el.remove_children("installDate");
    }

    if !dropped.is_empty() {
        warn!("Dropping {} mod entries without a path and their claims", dropped.len());
        let files = section(root, DATA_FILES)?;
        for file in files.elements_mut() {
            if let Some(installing) = file.child_mut(INSTALLING_MODS) {
                installing.retain_elements(|m| {
                    m.attr("key").is_none_or(|k| !dropped.contains(k))
                });
            }
        }
        files.retain_elements(|file| {
            file.child(INSTALLING_MODS)
                .is_some_and(|i| i.elements().next().is_some())
        });
    }

    Ok(())
}

/// Name a 0.5.0.0 mod entry takes from its `path` attribute
fn foreign_mod_name(path: &str) -> String {
    let name = if let Some(rest) = path.strip_prefix("Dummy Mod: ") {
        rest.to_string()
    } else if let Some(stem) = path
        .len()
        .checked_sub(FOMOD_SUFFIX.len())
        .filter(|&at| at > 0)
        .filter(|&at| path.get(at..).is_some_and(|s| s.eq_ignore_ascii_case(FOMOD_SUFFIX)))
        .map(|at| &path[..at])
    {
        stem.to_lowercase()
    } else {
        path.to_string()
    };

    match name.as_str() {
        "ORIGINAL_VALUE" => ORIGINAL_VALUES.to_string(),
        "MOD_MANAGER_VALUE" => FOMM.to_string(),
        _ => name,
    }
}

/// Rewrite every `file` path with `canonical`, merging claims of entries
/// that end up on the same path
fn canonicalize_data_files<F>(files: &mut Element, mut canonical: F) -> Result<()>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut merged: BTreeMap<String, Vec<Element>> = BTreeMap::new();
    for file in files.children_named("file") {
        let raw = file
            .attr("path")
            .ok_or_else(|| Error::format("data file entry without a path"))?;
        let path = canonical(raw)?;

        let claims = merged.entry(path).or_default();
        if let Some(installing) = file.child(INSTALLING_MODS) {
            for claim in installing.children_named("mod") {
                let duplicate = claims
                    .iter()
                    .any(|c| c.attr("key").is_some() && c.attr("key") == claim.attr("key"));
                if !duplicate {
                    claims.push(claim.clone());
                }
            }
        }
    }

    files.remove_children("file");
    for (path, claims) in merged {
        let mut installing = Element::new(INSTALLING_MODS);
        for claim in claims {
            installing.push(claim);
        }
        files.push(
            Element::new("file")
                .with_attr("path", path)
                .with_child(installing),
        );
    }

    Ok(())
}
