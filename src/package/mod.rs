// src/package/mod.rs

//! Package Container
//!
//! A package is a zip archive holding the files to install plus a few
//! entries found by convention:
//!
//! - `fomod/info.xml`: metadata ([`PackageInfo`])
//! - `fomod/script.*`: optional install script
//! - `readme - <base name>.{txt,rtf,htm,html}` at the archive root
//! - `fomod/screenshot.{png,jpg,bmp}`
//!
//! A package is active when its companion document (same path, `.xml`
//! extension) exists.
//!
//! Every mutation goes through [`Package::transaction`], which stages
//! changes and rewrites the container atomically.

mod builder;
mod info;
mod update;

pub use builder::{BuildResult, PackageBuilder};
pub use info::{DEFAULT_AUTHOR, DEFAULT_VERSION, PackageInfo};
pub use update::PackageUpdate;

use crate::error::{Error, Result};
use crate::version::Version;
use image::ImageFormat;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Metadata entry
pub const INFO_ENTRY: &str = "fomod/info.xml";
/// Prefix of the script entry; the extension names the script language
pub const SCRIPT_PREFIX: &str = "fomod/script.";
/// Entry a script is written to when the package has none yet
pub const DEFAULT_SCRIPT_ENTRY: &str = "fomod/script.cs";
/// Readme extensions in lookup order
pub const README_EXTENSIONS: [&str; 4] = ["txt", "rtf", "htm", "html"];
/// Extension every written readme gets
pub const README_EXTENSION: &str = "rtf";
/// Screenshot extensions in lookup order
pub const SCREENSHOT_EXTENSIONS: [&str; 3] = ["png", "jpg", "bmp"];
/// Entry every written screenshot gets
pub const SCREENSHOT_ENTRY: &str = "fomod/screenshot.png";
/// Extension of the companion installed-state document
pub const COMPANION_EXTENSION: &str = "xml";

/// Read access to the files of a package, handed to installers
pub trait PackageFiles {
    /// Names of every file entry
    fn file_names(&self) -> Vec<String>;

    /// Content of one file entry
    fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// An opened package container
#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    companion_path: PathBuf,
    base_name: String,
    default_name: String,
    info: PackageInfo,
    has_info: bool,
    entries: Vec<String>,
    script_entry: Option<String>,
    readme_entry: Option<String>,
    screenshot_entry: Option<String>,
}

impl Package {
    /// Open a package, checking it against the running tool version
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_tool_version(path, &Version::tool())
    }

    /// Open a package, checking it against an explicit tool version
    pub fn open_with_tool_version(path: impl AsRef<Path>, tool: &Version) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let default_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(format!("no file name: {}", path.display())))?;

        let mut package = Self {
            companion_path: path.with_extension(COMPANION_EXTENSION),
            base_name: default_name.to_lowercase(),
            info: PackageInfo::with_defaults(default_name.as_str()),
            default_name,
            path,
            has_info: false,
            entries: Vec::new(),
            script_entry: None,
            readme_entry: None,
            screenshot_entry: None,
        };

        package.index()?;
        if let Some(entry) = package.find_entry(INFO_ENTRY) {
            let content = package.read_text(&entry)?;
            package.info = PackageInfo::parse(&content, &package.default_name, tool)?;
            package.has_info = true;
        }

        debug!(
            "Opened package {} ({} entries, script: {}, readme: {}, screenshot: {})",
            package.path.display(),
            package.entries.len(),
            package.script_entry.is_some(),
            package.readme_entry.is_some(),
            package.screenshot_entry.is_some()
        );

        Ok(package)
    }

    /// List entries and detect the conventional ones
    fn index(&mut self) -> Result<()> {
        let archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        self.entries = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        self.entries.sort();

        self.script_entry = self
            .entries
            .iter()
            .find(|e| e.to_lowercase().starts_with(SCRIPT_PREFIX))
            .cloned();
        self.readme_entry = README_EXTENSIONS
            .iter()
            .find_map(|ext| self.find_entry(&self.readme_name(ext)));
        self.screenshot_entry = SCREENSHOT_EXTENSIONS
            .iter()
            .find_map(|ext| self.find_entry(&format!("fomod/screenshot.{}", ext)));

        Ok(())
    }

    /// Entry name matching `name` ignoring case
    fn find_entry(&self, name: &str) -> Option<String> {
        let wanted = name.to_lowercase();
        self.entries.iter().find(|e| e.to_lowercase() == wanted).cloned()
    }

    fn readme_name(&self, extension: &str) -> String {
        format!("readme - {}.{}", self.base_name, extension)
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        let mut entry = archive.by_name(name)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        Ok(content)
    }

    fn read_text(&self, name: &str) -> Result<String> {
        let bytes = self.read_entry(name)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased file stem
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Path of the companion installed-state document
    pub fn companion_path(&self) -> &Path {
        &self.companion_path
    }

    /// Whether the companion document exists
    pub fn is_active(&self) -> bool {
        self.companion_path.exists()
    }

    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    /// Metadata for editing; persisted by [`commit_info`](Self::commit_info)
    pub fn info_mut(&mut self) -> &mut PackageInfo {
        &mut self.info
    }

    /// Whether the container has a metadata entry
    pub fn has_info(&self) -> bool {
        self.has_info
    }

    pub fn has_script(&self) -> bool {
        self.script_entry.is_some()
    }

    pub fn has_readme(&self) -> bool {
        self.readme_entry.is_some()
    }

    pub fn has_screenshot(&self) -> bool {
        self.screenshot_entry.is_some()
    }

    /// Extension of the current readme entry
    pub fn readme_extension(&self) -> Option<&str> {
        self.readme_entry
            .as_deref()
            .and_then(|e| e.rsplit_once('.'))
            .map(|(_, ext)| ext)
    }

    /// Run a scoped mutation
    ///
    /// Changes staged by `stage` are written only if it returns `Ok`, and
    /// then all at once; on any error the container keeps its last
    /// committed content.
    pub fn transaction<F>(&mut self, stage: F) -> Result<()>
    where
        F: FnOnce(&mut PackageUpdate) -> Result<()>,
    {
        let mut update = PackageUpdate::new();
        stage(&mut update)?;
        if update.is_empty() {
            return Ok(());
        }

        update::apply(&self.path, &update)?;
        self.index()
    }

    /// Install script text, if the package has one
    pub fn script(&self) -> Result<Option<String>> {
        self.script_entry
            .as_deref()
            .map(|entry| self.read_text(entry))
            .transpose()
    }

    /// Replace the install script; an empty script deletes the entry
    pub fn set_script(&mut self, script: &str) -> Result<()> {
        let existing = self.script_entry.clone();
        if script.is_empty() && existing.is_none() {
            return Ok(());
        }

        self.transaction(|tx| {
            match (&existing, script.is_empty()) {
                (Some(entry), true) => tx.delete(entry),
                (Some(entry), false) => tx.add(entry, script),
                (None, _) => tx.add(DEFAULT_SCRIPT_ENTRY, script),
            }
            Ok(())
        })
    }

    /// Readme text, if the package has one
    pub fn readme(&self) -> Result<Option<String>> {
        self.readme_entry
            .as_deref()
            .map(|entry| self.read_text(entry))
            .transpose()
    }

    /// Replace the readme; it is always stored with the `.rtf` extension and
    /// an empty readme deletes the entry
    pub fn set_readme(&mut self, readme: &str) -> Result<()> {
        let existing = self.readme_entry.clone();
        if readme.is_empty() && existing.is_none() {
            return Ok(());
        }
        let canonical = self.readme_name(README_EXTENSION);

        self.transaction(|tx| {
            if let Some(entry) = &existing {
                tx.delete(entry);
            }
            if !readme.is_empty() {
                tx.add(&canonical, readme);
            }
            Ok(())
        })
    }

    /// Raw bytes of the screenshot entry, if any
    pub fn screenshot(&self) -> Result<Option<Vec<u8>>> {
        self.screenshot_entry
            .as_deref()
            .map(|entry| self.read_entry(entry))
            .transpose()
    }

    /// Write the metadata, and optionally the screenshot, in one transaction
    ///
    /// When `set_screenshot` is true, `screenshot` replaces the current
    /// screenshot (re-encoded as PNG) or, if `None`, deletes it.
    pub fn commit_info(&mut self, set_screenshot: bool, screenshot: Option<&[u8]>) -> Result<()> {
        let document = self.info.to_document(&self.default_name)?;
        let png = match (set_screenshot, screenshot) {
            (true, Some(bytes)) => Some(normalize_screenshot(bytes)?),
            _ => None,
        };
        let existing_screenshot = self.screenshot_entry.clone();

        self.transaction(|tx| {
            tx.add(INFO_ENTRY, document);
            if set_screenshot {
                if let Some(entry) = &existing_screenshot {
                    tx.delete(entry);
                }
                if let Some(png) = png {
                    tx.add(SCREENSHOT_ENTRY, png);
                }
            }
            Ok(())
        })?;

        self.has_info = true;
        info!("Committed metadata for {}", self.path.display());
        Ok(())
    }
}

impl PackageFiles for Package {
    fn file_names(&self) -> Vec<String> {
        self.entries.clone()
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find_entry(name)
            .ok_or_else(|| Error::NotFound(format!("{} in {}", name, self.path.display())))?;
        self.read_entry(&entry)
    }
}

/// Re-encode any supported image as PNG
pub(crate) fn normalize_screenshot(bytes: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(bytes)?;
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn write_package(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (entry, content) in entries {
            writer.start_file(*entry, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn bmp_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Bmp).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_open_without_info_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "Better Cities.fomod", &[("a.esp", "x")]);

        let package = Package::open(&path).unwrap();
        assert!(!package.has_info());
        assert_eq!(package.info().name, "Better Cities");
        assert_eq!(package.base_name(), "better cities");
        assert_eq!(package.info().author, "DEFAULT");
        assert_eq!(package.companion_path(), temp_dir.path().join("Better Cities.xml"));
        assert!(!package.is_active());
    }

    #[test]
    fn test_conventional_entries_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(
            temp_dir.path(),
            "cities.fomod",
            &[
                ("fomod/script.vb", "script text"),
                ("readme - cities.htm", "<p>hi</p>"),
                ("readme - cities.txt", "hi"),
                ("fomod/screenshot.jpg", "jpg"),
            ],
        );

        let package = Package::open(&path).unwrap();
        assert_eq!(package.script().unwrap().as_deref(), Some("script text"));
        assert_eq!(package.readme_extension(), Some("txt"));
        assert_eq!(package.readme().unwrap().as_deref(), Some("hi"));
        assert_eq!(package.screenshot().unwrap().as_deref(), Some(b"jpg".as_slice()));
    }

    #[test]
    fn test_set_script_writes_and_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "cities.fomod", &[("a.esp", "x")]);

        let mut package = Package::open(&path).unwrap();
        package.set_script("void OnActivate() {}").unwrap();
        assert_eq!(
            Package::open(&path).unwrap().script().unwrap().as_deref(),
            Some("void OnActivate() {}")
        );
        assert!(package.file_names().contains(&DEFAULT_SCRIPT_ENTRY.to_string()));

        package.set_script("").unwrap();
        assert!(!package.has_script());
        assert!(Package::open(&path).unwrap().script().unwrap().is_none());
    }

    #[test]
    fn test_set_readme_normalizes_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(
            temp_dir.path(),
            "cities.fomod",
            &[("readme - cities.txt", "old")],
        );

        let mut package = Package::open(&path).unwrap();
        package.set_readme("{\\rtf1 new}").unwrap();
        assert_eq!(package.readme_extension(), Some("rtf"));
        assert!(!package.file_names().contains(&"readme - cities.txt".to_string()));
        assert_eq!(package.readme().unwrap().as_deref(), Some("{\\rtf1 new}"));

        package.set_readme("").unwrap();
        assert!(!package.has_readme());
    }

    #[test]
    fn test_commit_info_and_screenshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(
            temp_dir.path(),
            "cities.fomod",
            &[("fomod/screenshot.bmp", "stale")],
        );

        let mut package = Package::open(&path).unwrap();
        package.info_mut().author = "Arthmoor".to_string();
        package.commit_info(true, Some(&bmp_bytes())).unwrap();

        let reopened = Package::open(&path).unwrap();
        assert!(reopened.has_info());
        assert_eq!(reopened.info().author, "Arthmoor");
        assert_eq!(reopened.info().name, "cities");

        let png = reopened.screenshot().unwrap().unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
        assert!(!reopened.file_names().contains(&"fomod/screenshot.bmp".to_string()));

        let mut package = reopened;
        package.commit_info(true, None).unwrap();
        assert!(!package.has_screenshot());
    }

    #[test]
    fn test_failed_transaction_keeps_committed_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(
            temp_dir.path(),
            "cities.fomod",
            &[("fomod/script.cs", "original")],
        );

        let mut package = Package::open(&path).unwrap();
        let result = package.transaction(|tx| {
            tx.add(DEFAULT_SCRIPT_ENTRY, "changed");
            Err(Error::TransactionError("interrupted".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(package.script().unwrap().as_deref(), Some("original"));
    }

    #[test]
    fn test_read_file_ignores_case() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "cities.fomod", &[("Meshes/A.nif", "nif")]);

        let mut package = Package::open(&path).unwrap();
        assert_eq!(package.read_file("meshes/a.NIF").unwrap(), b"nif");
        assert!(matches!(package.read_file("missing"), Err(Error::NotFound(_))));
    }
}
