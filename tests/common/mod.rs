// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::FileOptions;

/// Write a zip container with the given entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a package container named `name` into `dir`.
pub fn write_package(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let entries: Vec<(&str, &[u8])> = entries.iter().map(|(n, c)| (*n, c.as_bytes())).collect();
    write_zip(&path, &entries);
    path
}

/// Create a mod source directory:
///
/// ```text
/// cities/
///   cities.esp
///   textures/
///     road.dds
///     city/
///       wall.dds
/// ```
///
/// Returns (TempDir, path of `cities`) - keep the TempDir alive to prevent cleanup.
pub fn setup_source_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("cities");
    fs::create_dir_all(root.join("textures/city")).unwrap();
    fs::write(root.join("cities.esp"), b"plugin").unwrap();
    fs::write(root.join("textures/road.dds"), b"road").unwrap();
    fs::write(root.join("textures/city/wall.dds"), b"wall").unwrap();
    (temp_dir, root)
}

/// Lossy string form of a path, the way sources are passed around.
pub fn source(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
