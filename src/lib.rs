// src/lib.rs

//! FOMM mod package manager
//!
//! Builds mod packages from heterogeneous sources, stores them in versioned
//! zip containers, and tracks which installed files belong to which package
//! so deactivation is precise and reversible.
//!
//! # Architecture
//!
//! - [`archive`]: read-only access to entries inside zip containers
//! - [`mapper`]: merges sources into one destination tree and reduces it to
//!   a minimal set of copy instructions
//! - [`package`]: the package container, its metadata and scoped mutation
//! - [`ledger`]: the schema-versioned install ledger
//! - [`activation`]: activation and deactivation of packages

pub mod activation;
pub mod archive;
pub mod config;
mod error;
pub mod filesystem;
pub mod ledger;
pub mod mapper;
pub mod package;
pub mod version;
pub mod xml;

pub use activation::{
    ActivationState, Activator, BasicInstaller, InstallOutcome, InstalledFiles, Installer,
    Transition, reconcile,
};
pub use archive::{Archive, ArchivePath};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{InstallLedger, ModEntry};
pub use mapper::{CopyInstruction, FoundFile, NodeId, SourceMapper, SourceTree};
pub use package::{Package, PackageBuilder, PackageFiles, PackageInfo, PackageUpdate};
pub use version::Version;
