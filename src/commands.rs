// src/commands.rs
//! Command handlers for the fomm CLI

use anyhow::{Context, Result};
use fomm::{
    Activator, BasicInstaller, Config, InstallLedger, Package, PackageBuilder, PackageInfo,
    SourceMapper, Transition, Version,
};
use std::path::Path;
use tracing::{info, warn};

/// Show a package's metadata, conventional entries and activation state
pub fn cmd_info(config: &Config, package: &Path) -> Result<()> {
    let package_path = &config.package_path(package);
    let package = Package::open(package_path)
        .with_context(|| format!("Failed to open package {}", package_path.display()))?;
    let meta = package.info();

    println!("Package: {}", meta.name);
    println!("  Author: {}", meta.author);
    println!("  Version: {} ({})", meta.version, meta.machine_version);
    println!("  Minimum fomm version: {}", meta.min_tool_version);
    if !meta.description.is_empty() {
        println!("  Description: {}", meta.description);
    }
    println!("  Script: {}", if package.has_script() { "yes" } else { "no" });
    match package.readme_extension() {
        Some(ext) => println!("  Readme: yes (.{})", ext),
        None => println!("  Readme: no"),
    }
    println!("  Screenshot: {}", if package.has_screenshot() { "yes" } else { "no" });
    println!("  Active: {}", if package.is_active() { "yes" } else { "no" });

    Ok(())
}

/// Activate a package with the basic installer
pub fn cmd_activate(config: &Config, package: &Path) -> Result<()> {
    let package_path = &config.package_path(package);
    let mut package = Package::open(package_path)
        .with_context(|| format!("Failed to open package {}", package_path.display()))?;
    let mut ledger = InstallLedger::open(&config.ledger_path)?;
    let mut installer = BasicInstaller::new(&config.install_root);

    info!("Activating {}", package_path.display());
    match Activator::new().activate(&mut package, &mut ledger, &mut installer)? {
        Transition::Completed(files) => {
            println!("Activated {} ({} files installed)", package.info().name, files.len());
        }
        Transition::Unchanged => println!("{} is already active", package.info().name),
        Transition::Cancelled => println!("Activation of {} cancelled", package.info().name),
    }

    Ok(())
}

/// Deactivate a package, removing files no other package claims
pub fn cmd_deactivate(config: &Config, package: &Path) -> Result<()> {
    let package_path = &config.package_path(package);
    let package = Package::open(package_path)
        .with_context(|| format!("Failed to open package {}", package_path.display()))?;
    let mut ledger = InstallLedger::open(&config.ledger_path)?;
    let mut installer = BasicInstaller::new(&config.install_root);

    info!("Deactivating {}", package_path.display());
    match Activator::new().deactivate(&package, &mut ledger, &mut installer)? {
        Transition::Completed(files) => {
            println!("Deactivated {} ({} files released)", package.info().name, files.len());
        }
        Transition::Unchanged | Transition::Cancelled => {
            println!("{} is not active", package.info().name);
        }
    }

    Ok(())
}

/// List the package containers in the configured packages directory
pub fn cmd_list(config: &Config) -> Result<()> {
    let packages = config.packages().with_context(|| {
        format!("Failed to read packages directory {}", config.packages_dir.display())
    })?;
    if packages.is_empty() {
        println!("No packages in {}", config.packages_dir.display());
        return Ok(());
    }

    for path in packages {
        match Package::open(&path) {
            Ok(package) => {
                let meta = package.info();
                println!(
                    "  {} {} [{}]{}",
                    meta.name,
                    meta.version,
                    package.base_name(),
                    if package.is_active() { " (active)" } else { "" }
                );
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    Ok(())
}

/// Build a package from sources placed at the top level of the package
pub fn cmd_build(
    out: &Path,
    name: Option<&str>,
    author: Option<&str>,
    version: Option<&str>,
    sources: &[String],
) -> Result<()> {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .context("Output path has no file name")?;

    let mut mapper = SourceMapper::new();
    for source in sources {
        if mapper.add_path(None, source).is_none() {
            warn!("Skipping missing source {}", source);
        }
    }
    for container in mapper.archive_containers() {
        info!("Reading entries from archive {}", container);
    }
    let instructions = mapper.copy_instructions();
    if instructions.is_empty() {
        anyhow::bail!("Nothing to package: none of the sources exist");
    }

    let mut meta = PackageInfo::with_defaults(name.unwrap_or(&stem));
    if let Some(author) = author {
        meta.author = author.to_string();
    }
    if let Some(version) = version {
        meta.version = version.to_string();
        match Version::parse(version) {
            Ok(machine) => meta.machine_version = machine,
            Err(_) => warn!("Version '{}' is not numeric; machine version left at 1.0", version),
        }
    }

    let result = PackageBuilder::new(meta)
        .with_instructions(instructions)
        .build(out)?;
    println!("Built {} ({} entries)", result.path.display(), result.entries);

    Ok(())
}

/// Load the install ledger and list its mods with their claimed file counts
pub fn cmd_ledger(config: &Config) -> Result<()> {
    let ledger = InstallLedger::open(&config.ledger_path)
        .with_context(|| format!("Failed to load install log {}", config.ledger_path.display()))?;

    println!(
        "Install log {} (schema {})",
        ledger.path().display(),
        ledger.file_version()
    );
    if ledger.mods().is_empty() {
        println!("No mods installed.");
        return Ok(());
    }

    for entry in ledger.mods() {
        println!(
            "  {} [{}] {} - {} files",
            entry.name,
            entry.key,
            entry.version,
            ledger.installed_files(&entry.key).len()
        );
    }

    Ok(())
}
