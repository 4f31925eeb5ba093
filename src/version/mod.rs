// src/version/mod.rs

//! Machine-comparable versions for packages and the tool itself
//!
//! Packages carry two versions: a free-form display string and a
//! `MachineVersion` of the form `major.minor[.build[.revision]]`. The same
//! shape is used for the minimum tool version a package requires and for the
//! install ledger's `fileVersion`.
//!
//! Missing trailing components compare as zero, so `1.0` == `1.0.0.0`.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum number of dotted components
const MAX_COMPONENTS: usize = 4;

/// A dotted numeric version with one to four components
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u32>,
}

impl Version {
    /// Create a two-component version
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            parts: vec![major, minor],
        }
    }

    /// Create a four-component version
    pub fn new4(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            parts: vec![major, minor, build, revision],
        }
    }

    /// Parse a dotted version string
    ///
    /// Examples:
    /// - "1.0" → [1, 0]
    /// - "0.2.0.0" → [0, 2, 0, 0]
    /// - " 1.5 " → [1, 5] (surrounding whitespace is ignored)
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::format(format!("empty version string '{}'", s)));
        }

        let parts = trimmed
            .split('.')
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|e| Error::format(format!("invalid version '{}': {}", s, e)))
            })
            .collect::<Result<Vec<u32>>>()?;

        if parts.len() > MAX_COMPONENTS {
            return Err(Error::format(format!(
                "invalid version '{}': more than {} components",
                s, MAX_COMPONENTS
            )));
        }

        Ok(Self { parts })
    }

    /// The version of the running tool
    ///
    /// Derived from the crate version; pre-release and build metadata
    /// suffixes are ignored.
    pub fn tool() -> Self {
        let raw = env!("CARGO_PKG_VERSION");
        let core = raw.split(['-', '+']).next().unwrap_or(raw);
        Self::parse(core).unwrap_or_else(|_| Self::new4(0, 0, 0, 0))
    }

    /// Component at `index`, zero when absent
    pub fn component(&self, index: usize) -> u32 {
        self.parts.get(index).copied().unwrap_or(0)
    }

    /// Number of components as written
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false: a parsed version has at least one component
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (0..MAX_COMPONENTS)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_components() {
        let v = Version::parse("1.5").unwrap();
        assert_eq!(v.component(0), 1);
        assert_eq!(v.component(1), 5);
        assert_eq!(v.len(), 2);
        assert_eq!(v.to_string(), "1.5");
    }

    #[test]
    fn test_parse_four_components() {
        let v = Version::parse("0.2.0.0").unwrap();
        assert_eq!(v, Version::new4(0, 2, 0, 0));
        assert_eq!(v.to_string(), "0.2.0.0");
    }

    #[test]
    fn test_missing_components_compare_as_zero() {
        assert_eq!(Version::parse("1.0").unwrap(), Version::parse("1.0.0.0").unwrap());
        assert!(Version::parse("1.0").unwrap() < Version::parse("1.0.0.1").unwrap());
    }

    #[test]
    fn test_ordering() {
        let a = Version::parse("0.1.1.0").unwrap();
        let b = Version::parse("0.2.0.0").unwrap();
        let c = Version::parse("0.5.0.0").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(Version::parse("0.10").unwrap() > Version::parse("0.9").unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.x").is_err());
        assert!(Version::parse("1.2.3.4.5").is_err());
        assert!(Version::parse("-1.0").is_err());
    }

    #[test]
    fn test_tool_version_parses() {
        let tool = Version::tool();
        assert!(tool > Version::new4(0, 0, 0, 0));
    }
}
