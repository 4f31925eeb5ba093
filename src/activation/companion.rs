// src/activation/companion.rs

//! Companion installed-state document
//!
//! Written next to the package when it is activated and deleted when it is
//! deactivated; it records exactly which files the last activation put into
//! the install root.
//!
//! ```xml
//! <installData>
//!   <installedFiles>
//!     <file>meshes/cities/wall.nif</file>
//!   </installedFiles>
//! </installData>
//! ```

use crate::error::{Error, Result};
use crate::filesystem::path::normalize_relative;
use crate::filesystem::write_atomic;
use crate::xml::{self, Element};
use std::path::Path;

const ROOT: &str = "installData";
const INSTALLED_FILES: &str = "installedFiles";

/// Files installed by one activation, as relative paths under the install root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledFiles {
    files: Vec<String>,
}

impl InstalledFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; duplicates (after normalisation) are ignored
    pub fn push(&mut self, path: &str) {
        let path = normalize_relative(path);
        if !path.is_empty() && !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read a companion document
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
                _ => Error::Io(e),
            })?;
        let root = xml::parse(&content)?
            .ok_or_else(|| Error::format(format!("{} has no root element", path.display())))?;
        Self::from_element(&root)
    }

    /// Write the companion document atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = xml::to_string(&self.to_element())?;
        write_atomic(path, content.as_bytes())
    }

    fn from_element(root: &Element) -> Result<Self> {
        if root.name != ROOT {
            return Err(Error::format(format!(
                "unexpected root element '{}' in installed-state document",
                root.name
            )));
        }
        let list = root
            .child(INSTALLED_FILES)
            .ok_or_else(|| Error::format("installed-state document has no installedFiles"))?;

        let mut installed = Self::new();
        for file in list.children_named("file") {
            installed.push(&file.text());
        }
        Ok(installed)
    }

    fn to_element(&self) -> Element {
        let mut list = Element::new(INSTALLED_FILES);
        for file in &self.files {
            list.push(Element::new("file").with_text(file.as_str()));
        }
        Element::new(ROOT).with_child(list)
    }
}

impl<S: AsRef<str>> FromIterator<S> for InstalledFiles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut installed = Self::new();
        for path in iter {
            installed.push(path.as_ref());
        }
        installed
    }
}
