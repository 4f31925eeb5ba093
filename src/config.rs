// src/config.rs

//! Configuration file
//!
//! ```toml
//! install_root = "/games/fallout3/Data"
//! ledger_path = "/games/fallout3/InstallLog.xml"
//! packages_dir = "/games/fallout3/mods"
//! ```
//!
//! Every key is optional; missing keys fall back to paths relative to the
//! current directory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_INSTALL_ROOT: &str = "Data";
pub const DEFAULT_LEDGER_PATH: &str = "InstallLog.xml";
pub const DEFAULT_PACKAGES_DIR: &str = "mods";

/// Tool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory installed files land in
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// Install ledger document
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Directory holding package containers
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,
}

fn default_install_root() -> PathBuf {
    PathBuf::from(DEFAULT_INSTALL_ROOT)
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_PATH)
}

fn default_packages_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PACKAGES_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            ledger_path: default_ledger_path(),
            packages_dir: default_packages_dir(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve a package argument
    ///
    /// An absolute or existing path is used as given; anything else names a
    /// container inside `packages_dir`.
    pub fn package_path(&self, package: &Path) -> PathBuf {
        if package.is_absolute() || package.exists() {
            package.to_path_buf()
        } else {
            self.packages_dir.join(package)
        }
    }

    /// Package containers in `packages_dir`, sorted by path
    ///
    /// A missing directory holds no packages.
    pub fn packages(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.packages_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut packages = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_package = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("fomod"));
            if is_package && path.is_file() {
                packages.push(path);
            }
        }
        packages.sort();
        Ok(packages)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("install_root", &self.install_root),
            ("ledger_path", &self.ledger_path),
            ("packages_dir", &self.packages_dir),
        ] {
            if value.as_os_str().is_empty() {
                return Err(Error::InvalidPath(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ledger_path, PathBuf::from("InstallLog.xml"));
    }

    #[test]
    fn test_parse_config() {
        let config = Config::parse(
            r#"
install_root = "/games/fallout3/Data"
ledger_path = "/games/fallout3/InstallLog.xml"
"#,
        )
        .unwrap();
        assert_eq!(config.install_root, PathBuf::from("/games/fallout3/Data"));
        assert_eq!(config.packages_dir, PathBuf::from("mods"));
    }

    #[test]
    fn test_package_path_falls_back_to_packages_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let existing = temp_dir.path().join("cities.fomod");
        std::fs::write(&existing, b"").unwrap();

        let config = Config {
            packages_dir: temp_dir.path().join("mods"),
            ..Config::default()
        };
        assert_eq!(config.package_path(&existing), existing);
        assert_eq!(
            config.package_path(Path::new("roads.fomod")),
            temp_dir.path().join("mods").join("roads.fomod")
        );
    }

    #[test]
    fn test_packages_lists_containers_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mods = temp_dir.path().join("mods");
        std::fs::create_dir_all(mods.join("unpacked.fomod")).unwrap();
        std::fs::write(mods.join("roads.FOMOD"), b"").unwrap();
        std::fs::write(mods.join("cities.fomod"), b"").unwrap();
        std::fs::write(mods.join("readme.txt"), b"").unwrap();

        let config = Config {
            packages_dir: mods.clone(),
            ..Config::default()
        };
        assert_eq!(
            config.packages().unwrap(),
            vec![mods.join("cities.fomod"), mods.join("roads.FOMOD")]
        );

        let missing = Config {
            packages_dir: temp_dir.path().join("absent"),
            ..Config::default()
        };
        assert!(missing.packages().unwrap().is_empty());
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(matches!(
            Config::parse(r#"install_root = """#),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(
            Config::parse("install_root = 3"),
            Err(Error::Config(_))
        ));
    }
}
