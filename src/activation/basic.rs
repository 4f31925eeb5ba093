// src/activation/basic.rs

//! Default install behaviour for packages without a script
//!
//! Every package entry except the `fomod/` metadata directory and the readme
//! is copied to the same relative path under the install root.

use super::{InstallOutcome, InstalledFiles, Installer};
use crate::error::{Error, Result};
use crate::filesystem::path::{normalize_relative, safe_join};
use crate::package::PackageFiles;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const METADATA_DIR: &str = "fomod/";

/// Copies package files straight into the install root
#[derive(Debug, Clone)]
pub struct BasicInstaller {
    install_root: PathBuf,
}

impl BasicInstaller {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Remove directories left empty between `file` and the install root
    fn remove_empty_parents(&self, file: &Path) {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if current == self.install_root || !current.starts_with(&self.install_root) {
                break;
            }
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

/// Whether an entry is package metadata rather than installable content
fn is_metadata(name: &str) -> bool {
    let lower = normalize_relative(name).to_lowercase();
    lower.starts_with(METADATA_DIR) || (!lower.contains('/') && lower.starts_with("readme - "))
}

impl Installer for BasicInstaller {
    fn install(
        &mut self,
        script: Option<&str>,
        files: &mut dyn PackageFiles,
    ) -> Result<InstallOutcome> {
        if script.is_some() {
            return Err(Error::Installer(
                "the package has an install script; the basic installer cannot run scripts"
                    .to_string(),
            ));
        }

        let mut installed = InstalledFiles::new();
        for name in files.file_names() {
            if is_metadata(&name) {
                continue;
            }
            let target = safe_join(&self.install_root, &name)?;
            let content = files.read_file(&name)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
            debug!("Installed {}", target.display());
            installed.push(&name);
        }

        Ok(InstallOutcome::Installed(installed))
    }

    fn uninstall(&mut self, files: &[String]) -> Result<()> {
        for name in files {
            let target = safe_join(&self.install_root, name)?;
            match fs::remove_file(&target) {
                Ok(()) => debug!("Removed {}", target.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Already gone: {}", target.display());
                }
                Err(e) => return Err(e.into()),
            }
            self.remove_empty_parents(&target);
        }
        Ok(())
    }
}
