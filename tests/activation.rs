// tests/activation.rs

//! Activation and deactivation against a real install root.

mod common;

use common::write_package;
use fomm::{
    ActivationState, Activator, BasicInstaller, Config, Error, InstallLedger, Package,
    Transition, reconcile,
};
use std::fs;

fn config(dir: &std::path::Path) -> Config {
    Config {
        install_root: dir.join("Data"),
        ledger_path: dir.join("InstallLog.xml"),
        packages_dir: dir.join("mods"),
    }
}

#[test]
fn test_activate_and_deactivate_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config(temp_dir.path());
    fs::create_dir_all(&config.packages_dir).unwrap();
    let path = write_package(
        &config.packages_dir,
        "Cities.fomod",
        &[
            ("cities.esp", "plugin"),
            ("Textures/City/wall.dds", "wall"),
            ("fomod/info.xml", "<fomod><Author>Arthmoor</Author></fomod>"),
            ("readme - cities.txt", "read me"),
        ],
    );

    let mut package = Package::open(&path).unwrap();
    let mut ledger = InstallLedger::open(&config.ledger_path).unwrap();
    let mut installer = BasicInstaller::new(&config.install_root);
    let activator = Activator::new();

    let Transition::Completed(installed) = activator
        .activate(&mut package, &mut ledger, &mut installer)
        .unwrap()
    else {
        panic!("activation should complete");
    };
    assert_eq!(installed.files(), ["Textures/City/wall.dds", "cities.esp"]);
    assert_eq!(activator.state(&package), ActivationState::Active);
    assert_eq!(fs::read(config.install_root.join("cities.esp")).unwrap(), b"plugin");
    assert!(!config.install_root.join("fomod").exists());
    assert!(!config.install_root.join("readme - cities.txt").exists());

    // Exactly the installed files are recorded, and the ledger is on disk
    let key = ledger.mod_key("cities").unwrap().to_string();
    let reloaded = InstallLedger::open(&config.ledger_path).unwrap();
    assert_eq!(
        reloaded.installed_files(&key),
        vec!["Textures/City/wall.dds", "cities.esp"]
    );

    activator
        .deactivate(&package, &mut ledger, &mut installer)
        .unwrap();
    assert_eq!(activator.state(&package), ActivationState::Inactive);
    assert!(!package.companion_path().exists());
    assert!(!config.install_root.join("cities.esp").exists());
    assert!(!config.install_root.join("Textures").exists());

    let reloaded = InstallLedger::open(&config.ledger_path).unwrap();
    assert!(reloaded.installed_files(&key).is_empty());
    assert!(reloaded.mod_key("cities").is_none());
}

#[test]
fn test_deactivating_inactive_package_is_unchanged() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config(temp_dir.path());
    let path = write_package(temp_dir.path(), "cities.fomod", &[("cities.esp", "x")]);

    let package = Package::open(&path).unwrap();
    let mut ledger = InstallLedger::open(&config.ledger_path).unwrap();
    let mut installer = BasicInstaller::new(&config.install_root);

    let transition = Activator::new()
        .deactivate(&package, &mut ledger, &mut installer)
        .unwrap();
    assert_eq!(transition, Transition::Unchanged);
    assert!(!config.ledger_path.exists());
}

#[test]
fn test_scripted_package_fails_with_basic_installer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config(temp_dir.path());
    let path = write_package(
        temp_dir.path(),
        "cities.fomod",
        &[("cities.esp", "x"), ("fomod/script.cs", "void OnActivate() {}")],
    );

    let mut package = Package::open(&path).unwrap();
    let mut ledger = InstallLedger::open(&config.ledger_path).unwrap();
    let mut installer = BasicInstaller::new(&config.install_root);
    let activator = Activator::new();

    let result = activator.activate(&mut package, &mut ledger, &mut installer);
    assert!(matches!(result, Err(Error::Installer(_))));
    assert_eq!(activator.state(&package), ActivationState::Inactive);
    assert!(!package.companion_path().exists());
    assert!(ledger.mods().is_empty());
}

#[test]
fn test_reconcile_after_lost_ledger() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config(temp_dir.path());
    let path = write_package(temp_dir.path(), "cities.fomod", &[("cities.esp", "x")]);

    let mut package = Package::open(&path).unwrap();
    let mut ledger = InstallLedger::open(&config.ledger_path).unwrap();
    let mut installer = BasicInstaller::new(&config.install_root);
    Activator::new()
        .activate(&mut package, &mut ledger, &mut installer)
        .unwrap();

    // Simulate a crash that lost the ledger update
    fs::remove_file(&config.ledger_path).unwrap();
    let mut ledger = InstallLedger::open(&config.ledger_path).unwrap();
    assert!(ledger.mods().is_empty());

    assert_eq!(reconcile(&package, &mut ledger).unwrap(), 1);
    let key = ledger.mod_key("cities").unwrap();
    assert_eq!(ledger.installed_files(key), vec!["cities.esp"]);
}
