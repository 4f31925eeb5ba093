// src/package/info.rs

//! Package metadata (`fomod/info.xml`)
//!
//! ```xml
//! <fomod>
//!   <Name>Better Cities</Name>
//!   <Version MachineVersion="1.5">1.5 beta</Version>
//!   <Author>someone</Author>
//!   <Description>...</Description>
//!   <MinFommVersion>0.13.0.0</MinFommVersion>
//! </fomod>
//! ```
//!
//! Every element is optional. Fields still at their default are omitted on
//! write so the document stays minimal.

use crate::error::{Error, Result};
use crate::version::Version;
use crate::xml::{self, Element};

pub const DEFAULT_AUTHOR: &str = "DEFAULT";
pub const DEFAULT_VERSION: &str = "1.0";

const ROOT: &str = "fomod";

/// Descriptive metadata of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub author: String,
    pub description: String,
    /// Free-form display version
    pub version: String,
    pub machine_version: Version,
    /// Oldest tool version able to load the package
    pub min_tool_version: Version,
}

impl PackageInfo {
    /// Metadata of a package without an info document
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: DEFAULT_AUTHOR.to_string(),
            description: String::new(),
            version: DEFAULT_VERSION.to_string(),
            machine_version: default_machine_version(),
            min_tool_version: default_min_tool_version(),
        }
    }

    /// Parse an info document on top of the defaults for `default_name`
    ///
    /// A package that needs a newer tool than `tool` is rejected with
    /// [`Error::IncompatibleVersion`].
    pub fn parse(content: &str, default_name: &str, tool: &Version) -> Result<Self> {
        let root = xml::parse(content)?
            .ok_or_else(|| Error::format("root element is missing from fomod/info.xml"))?;
        if root.name != ROOT {
            return Err(Error::format(format!(
                "unexpected root element '{}' in fomod/info.xml",
                root.name
            )));
        }

        let mut info = Self::with_defaults(default_name);
        for child in root.elements() {
            match child.name.as_str() {
                "Name" => info.name = child.text(),
                "Author" => info.author = child.text(),
                "Description" => info.description = child.text(),
                "Version" => {
                    info.version = child.text();
                    if let Some(machine) = child.attr("MachineVersion") {
                        info.machine_version = Version::parse(machine)?;
                    }
                }
                "MinFommVersion" => {
                    let required = Version::parse(&child.text())?;
                    if *tool < required {
                        return Err(Error::IncompatibleVersion(format!(
                            "this package requires fomm {} or newer (running {})",
                            required, tool
                        )));
                    }
                    info.min_tool_version = required;
                }
                other => {
                    return Err(Error::format(format!(
                        "unexpected element '{}' in fomod/info.xml",
                        other
                    )));
                }
            }
        }

        Ok(info)
    }

    /// Serialise to an info document, leaving out defaulted fields
    pub fn to_document(&self, default_name: &str) -> Result<String> {
        let mut root = Element::new(ROOT);

        if !self.name.is_empty() && self.name != default_name {
            root.push(Element::new("Name").with_text(self.name.as_str()));
        }
        if self.author != DEFAULT_AUTHOR {
            root.push(Element::new("Author").with_text(self.author.as_str()));
        }
        if self.version != DEFAULT_VERSION || self.machine_version != default_machine_version() {
            let display = if self.version.is_empty() {
                self.machine_version.to_string()
            } else {
                self.version.clone()
            };
            root.push(
                Element::new("Version")
                    .with_attr("MachineVersion", self.machine_version.to_string())
                    .with_text(display),
            );
        }
        if !self.description.is_empty() {
            root.push(Element::new("Description").with_text(self.description.as_str()));
        }
        if self.min_tool_version != default_min_tool_version() {
            root.push(Element::new("MinFommVersion").with_text(self.min_tool_version.to_string()));
        }

        xml::to_string(&root)
    }
}

fn default_machine_version() -> Version {
    Version::new(1, 0)
}

fn default_min_tool_version() -> Version {
    Version::new4(0, 0, 0, 0)
}
