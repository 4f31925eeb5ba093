// src/activation/mod.rs

//! Activation State Machine
//!
//! Activation runs a package through the installer collaborator, persists
//! what was installed as the package's companion document, and records every
//! file in the install ledger. Deactivation reverses it.
//!
//! ```text
//! Inactive -> Activating -> Active -> Deactivating -> Inactive
//! ```
//!
//! The companion document is the source of truth for what a package
//! installed; the ledger is an index derived from it. The companion document
//! is written before the ledger is updated on activation and deleted after the
//! ledger is committed on deactivation, so a crash in between is repaired by
//! [`reconcile`].

mod basic;
mod companion;

pub use basic::BasicInstaller;
pub use companion::InstalledFiles;

use crate::error::{Error, Result};
use crate::filesystem::path::sanitize_relative;
use crate::ledger::InstallLedger;
use crate::package::{Package, PackageFiles};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Activation state of one package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl ActivationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
        }
    }

    /// Whether a transition is underway
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Activating | Self::Deactivating)
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a requested transition did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The package changed state; carries the files installed or removed
    Completed(InstalledFiles),
    /// The package was already in the requested state
    Unchanged,
    /// The installer was cancelled; nothing was persisted
    Cancelled,
}

/// Result of running an installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(InstalledFiles),
    Cancelled,
}

/// The collaborator that actually puts files into the install root
pub trait Installer {
    /// Install a package, running `script` if it has one
    fn install(
        &mut self,
        script: Option<&str>,
        files: &mut dyn PackageFiles,
    ) -> Result<InstallOutcome>;

    /// Remove files no other package claims any more
    fn uninstall(&mut self, _files: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Tracks in-flight transitions so two cannot run for the same package
///
/// Transitions are keyed by package base name, the same key the ledger uses,
/// so two handles on one package (or on two files sharing a base name) are
/// serialised. Clones share the same set of in-flight transitions.
#[derive(Debug, Clone, Default)]
pub struct Activator {
    in_progress: Arc<Mutex<HashMap<String, ActivationState>>>,
}

/// Clears an in-flight transition when dropped
struct TransitionGuard<'a> {
    activator: &'a Activator,
    key: String,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.activator.lock().remove(&self.key);
    }
}

impl Activator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActivationState>> {
        self.in_progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of `package`
    pub fn state(&self, package: &Package) -> ActivationState {
        match self.lock().get(package.base_name()) {
            Some(state) => *state,
            None if package.is_active() => ActivationState::Active,
            None => ActivationState::Inactive,
        }
    }

    fn begin(&self, package: &Package, next: ActivationState) -> Result<TransitionGuard<'_>> {
        let key = package.base_name().to_string();
        let mut in_progress = self.lock();
        if let Some(current) = in_progress.get(&key).filter(|s| s.is_transitioning()) {
            return Err(Error::TransactionError(format!("{} is already {}", key, current)));
        }
        in_progress.insert(key.clone(), next);
        Ok(TransitionGuard { activator: self, key })
    }

    /// Activate `package`, recording its files under its base name
    ///
    /// A no-op for an active package. If the installer is cancelled or fails
    /// the package stays inactive and nothing is persisted.
    pub fn activate(
        &self,
        package: &mut Package,
        ledger: &mut InstallLedger,
        installer: &mut dyn Installer,
    ) -> Result<Transition> {
        if self.state(package) == ActivationState::Active {
            return Ok(Transition::Unchanged);
        }

        let _guard = self.begin(package, ActivationState::Activating)?;
        run_activation(package, ledger, installer)
    }

    /// Deactivate `package`
    ///
    /// A no-op for an inactive package. Files no other package claims are
    /// handed to the installer for removal.
    pub fn deactivate(
        &self,
        package: &Package,
        ledger: &mut InstallLedger,
        installer: &mut dyn Installer,
    ) -> Result<Transition> {
        if self.state(package) == ActivationState::Inactive {
            return Ok(Transition::Unchanged);
        }

        let _guard = self.begin(package, ActivationState::Deactivating)?;
        run_deactivation(package, ledger, installer)
    }
}

fn run_activation(
    package: &mut Package,
    ledger: &mut InstallLedger,
    installer: &mut dyn Installer,
) -> Result<Transition> {
    let script = package.script()?;
    let installed = match installer.install(script.as_deref(), package)? {
        InstallOutcome::Installed(installed) => installed,
        InstallOutcome::Cancelled => {
            info!("Activation of {} cancelled", package.path().display());
            return Ok(Transition::Cancelled);
        }
    };

    // Nothing is persisted until every reported path is usable
    for file in installed.files() {
        sanitize_relative(file)?;
    }

    installed.write(package.companion_path())?;

    let info = package.info();
    let key = ledger.register_mod(package.base_name(), &info.version, &info.machine_version)?;
    for file in installed.files() {
        ledger.record_install(&key, file)?;
    }
    ledger.commit()?;

    info!(
        "Activated {} ({} files)",
        package.path().display(),
        installed.len()
    );
    Ok(Transition::Completed(installed))
}

fn run_deactivation(
    package: &Package,
    ledger: &mut InstallLedger,
    installer: &mut dyn Installer,
) -> Result<Transition> {
    let installed = InstalledFiles::read(package.companion_path())?;

    match ledger.mod_key(package.base_name()).map(str::to_string) {
        Some(key) => {
            let orphaned: Vec<String> = installed
                .files()
                .iter()
                .filter(|file| {
                    ledger
                        .installing_mods(file)
                        .iter()
                        .all(|owner| *owner == key)
                })
                .cloned()
                .collect();
            installer.uninstall(&orphaned)?;

            for file in installed.files() {
                ledger.record_uninstall(&key, file)?;
            }
            ledger.prune_mod(&key);
            ledger.commit()?;
        }
        None => {
            warn!(
                "{} is not in the install log; removing its installed-state document only",
                package.base_name()
            );
        }
    }

    match std::fs::remove_file(package.companion_path()) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    info!(
        "Deactivated {} ({} files)",
        package.path().display(),
        installed.len()
    );
    Ok(Transition::Completed(installed))
}

/// Re-record every file of an active package in the ledger
///
/// Repairs the ledger after a crash between writing the companion document
/// and committing the ledger. Returns the number of files recorded; an
/// inactive package records nothing.
pub fn reconcile(package: &Package, ledger: &mut InstallLedger) -> Result<usize> {
    if !package.is_active() {
        return Ok(0);
    }

    let installed = InstalledFiles::read(package.companion_path())?;
    let key = match ledger.mod_key(package.base_name()) {
        Some(key) => key.to_string(),
        None => {
            let info = package.info();
            ledger.register_mod(package.base_name(), &info.version, &info.machine_version)?
        }
    };

    for file in installed.files() {
        ledger.record_install(&key, file)?;
    }
    ledger.commit()?;

    info!(
        "Reconciled {} with the install log ({} files)",
        package.path().display(),
        installed.len()
    );
    Ok(installed.len())
}
