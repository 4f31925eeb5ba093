// src/package/builder.rs

//! Package builder
//!
//! Writes a new package container from copy instructions (usually produced
//! by the source tree mapper) plus metadata, script, readme and screenshot.
//! Directory sources are copied recursively, from the filesystem or from
//! inside an archive. When two instructions place content at the same
//! destination (ignoring case) the later one wins.

use super::info::PackageInfo;
use super::{DEFAULT_SCRIPT_ENTRY, INFO_ENTRY, README_EXTENSION, SCREENSHOT_ENTRY};
use crate::error::{Error, Result};
use crate::filesystem::path::{normalize_relative, sanitize_relative};
use crate::mapper::{CopyInstruction, SourceKind, SourceResolver};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Where the content of one package entry comes from
#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    ArchiveEntry { container: PathBuf, inner: String },
    Inline(Vec<u8>),
}

/// Summary of a finished build
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub path: PathBuf,
    /// Entries written, metadata included
    pub entries: usize,
}

/// Builds a package container
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    info: PackageInfo,
    instructions: Vec<CopyInstruction>,
    script: Option<String>,
    readme: Option<String>,
    screenshot: Option<Vec<u8>>,
}

impl PackageBuilder {
    /// Create a builder for a package with the given metadata
    pub fn new(info: PackageInfo) -> Self {
        Self {
            info,
            instructions: Vec::new(),
            script: None,
            readme: None,
            screenshot: None,
        }
    }

    /// Add copy instructions
    pub fn with_instructions(mut self, instructions: impl IntoIterator<Item = CopyInstruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Set the install script
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Set the readme (stored as `.rtf`)
    pub fn with_readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = Some(readme.into());
        self
    }

    /// Set the screenshot (any supported encoding, stored as PNG)
    pub fn with_screenshot(mut self, screenshot: Vec<u8>) -> Self {
        self.screenshot = Some(screenshot);
        self
    }

    /// Write the package to `output`, replacing it atomically
    pub fn build(&self, output: &Path) -> Result<BuildResult> {
        let default_name = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_name = default_name.to_lowercase();

        // Lower-cased destination -> (destination, origin)
        let mut plan: BTreeMap<String, (String, Origin)> = BTreeMap::new();
        let mut resolver = SourceResolver::new();
        for instruction in &self.instructions {
            self.plan_instruction(instruction, &mut resolver, &mut plan)?;
        }

        let mut metadata = vec![(
            INFO_ENTRY.to_string(),
            self.info.to_document(&default_name)?.into_bytes(),
        )];
        if let Some(script) = self.script.as_ref().filter(|s| !s.is_empty()) {
            metadata.push((DEFAULT_SCRIPT_ENTRY.to_string(), script.clone().into_bytes()));
        }
        if let Some(readme) = self.readme.as_ref().filter(|s| !s.is_empty()) {
            let name = format!("readme - {}.{}", base_name, README_EXTENSION);
            metadata.push((name, readme.clone().into_bytes()));
        }
        if let Some(screenshot) = &self.screenshot {
            metadata.push((
                SCREENSHOT_ENTRY.to_string(),
                super::normalize_screenshot(screenshot)?,
            ));
        }
        for (name, content) in metadata {
            plan.insert(name.to_lowercase(), (name, Origin::Inline(content)));
        }

        let entries = plan.len();
        write_container(output, &plan, &mut resolver)?;

        info!("Built package {} ({} entries)", output.display(), entries);
        Ok(BuildResult {
            path: output.to_path_buf(),
            entries,
        })
    }

    fn plan_instruction(
        &self,
        instruction: &CopyInstruction,
        resolver: &mut SourceResolver,
        plan: &mut BTreeMap<String, (String, Origin)>,
    ) -> Result<()> {
        // An empty destination is the package root
        let destination = if normalize_relative(&instruction.destination).is_empty() {
            None
        } else {
            Some(sanitize_relative(&instruction.destination)?)
        };
        let mut place = |relative: Option<&str>, origin: Origin| -> Result<()> {
            let target = match (&destination, relative) {
                (Some(dest), Some(rel)) => sanitize_relative(&format!("{}/{}", dest, rel))?,
                (Some(dest), None) => dest.clone(),
                (None, Some(rel)) => sanitize_relative(rel)?,
                (None, None) => {
                    return Err(Error::InvalidInstruction(format!(
                        "cannot copy the file {} onto the package root",
                        instruction.source
                    )));
                }
            };
            plan.insert(target.to_lowercase(), (target, origin));
            Ok(())
        };

        match SourceKind::classify(&instruction.source) {
            SourceKind::Virtual(_) => {
                debug!("Ignoring virtual source {}", instruction.source);
            }
            SourceKind::Filesystem(path) if path.is_dir() => {
                let mut files: Vec<PathBuf> = WalkDir::new(&path)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .collect();
                files.sort();

                for file in files {
                    let Ok(relative) = file.strip_prefix(&path) else {
                        continue;
                    };
                    let relative = relative.to_string_lossy().into_owned();
                    place(Some(&relative), Origin::File(file))?;
                }
            }
            SourceKind::Filesystem(path) => {
                if !path.is_file() {
                    return Err(Error::NotFound(instruction.source.clone()));
                }
                place(None, Origin::File(path))?;
            }
            SourceKind::Archive(path) => {
                let archive = resolver.archive(&path.container)?;
                if archive.is_directory(&path.inner) {
                    for inner in archive.files_recursive(&path.inner) {
                        let relative = if path.inner.is_empty() {
                            inner.clone()
                        } else {
                            inner[path.inner.len() + 1..].to_string()
                        };
                        place(
                            Some(&relative),
                            Origin::ArchiveEntry {
                                container: path.container.clone(),
                                inner,
                            },
                        )?;
                    }
                } else if archive.exists(&path.inner) {
                    place(
                        None,
                        Origin::ArchiveEntry {
                            container: path.container.clone(),
                            inner: path.inner.clone(),
                        },
                    )?;
                } else {
                    return Err(Error::NotFound(instruction.source.clone()));
                }
            }
        }

        Ok(())
    }
}

fn write_container(
    output: &Path,
    plan: &BTreeMap<String, (String, Origin)>,
    resolver: &mut SourceResolver,
) -> Result<()> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = ZipWriter::new(temp.as_file_mut());
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, origin) in plan.values() {
            let content = match origin {
                Origin::File(path) => fs::read(path)?,
                Origin::ArchiveEntry { container, inner } => resolver.archive(container)?.read(inner)?,
                Origin::Inline(bytes) => bytes.clone(),
            };
            writer.start_file(name.as_str(), options)?;
            writer.write_all(&content)?;
        }

        writer.finish()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Package, PackageFiles};
    use tempfile::TempDir;

    #[test]
    fn test_build_from_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("textures/city")).unwrap();
        fs::write(src.join("textures/city/wall.dds"), b"wall").unwrap();
        fs::write(src.join("cities.esp"), b"plugin").unwrap();

        let mut info = PackageInfo::with_defaults("cities");
        info.author = "Arthmoor".to_string();
        let output = temp_dir.path().join("out/cities.fomod");
        let result = PackageBuilder::new(info)
            .with_instructions([
                CopyInstruction::new(src.join("textures").to_string_lossy(), "textures"),
                CopyInstruction::new(src.join("cities.esp").to_string_lossy(), "Cities.esp"),
                CopyInstruction::new("new://docs", "docs"),
            ])
            .with_script("void OnActivate() {}")
            .with_readme("read me")
            .build(&output)
            .unwrap();
        assert_eq!(result.entries, 5);

        let mut package = Package::open(&output).unwrap();
        assert_eq!(package.info().author, "Arthmoor");
        assert!(package.has_script());
        assert_eq!(package.readme_extension(), Some("rtf"));
        assert_eq!(package.read_file("textures/city/wall.dds").unwrap(), b"wall");
        assert_eq!(package.read_file("Cities.esp").unwrap(), b"plugin");
    }

    #[test]
    fn test_later_instruction_wins() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.esp"), b"one").unwrap();
        fs::write(temp_dir.path().join("two.esp"), b"two").unwrap();

        let output = temp_dir.path().join("pack.fomod");
        PackageBuilder::new(PackageInfo::with_defaults("pack"))
            .with_instructions([
                CopyInstruction::new(temp_dir.path().join("one.esp").to_string_lossy(), "a.esp"),
                CopyInstruction::new(temp_dir.path().join("two.esp").to_string_lossy(), "A.ESP"),
            ])
            .build(&output)
            .unwrap();

        let mut package = Package::open(&output).unwrap();
        assert_eq!(package.read_file("a.esp").unwrap(), b"two");
    }

    #[test]
    fn test_root_destination_places_files_at_package_root() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("textures/city")).unwrap();
        fs::write(src.join("textures/city/wall.dds"), b"wall").unwrap();
        fs::write(src.join("cities.esp"), b"plugin").unwrap();

        let output = temp_dir.path().join("cities.fomod");
        PackageBuilder::new(PackageInfo::with_defaults("cities"))
            .with_instructions([CopyInstruction::new(src.to_string_lossy(), "/")])
            .build(&output)
            .unwrap();

        let mut package = Package::open(&output).unwrap();
        assert_eq!(package.read_file("textures/city/wall.dds").unwrap(), b"wall");
        assert_eq!(package.read_file("cities.esp").unwrap(), b"plugin");
    }

    #[test]
    fn test_file_onto_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.esp"), b"one").unwrap();

        let output = temp_dir.path().join("pack.fomod");
        let result = PackageBuilder::new(PackageInfo::with_defaults("pack"))
            .with_instructions([CopyInstruction::new(
                temp_dir.path().join("one.esp").to_string_lossy(),
                "/",
            )])
            .build(&output);
        assert!(matches!(result, Err(Error::InvalidInstruction(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_traversal_destination_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.esp"), b"one").unwrap();

        let output = temp_dir.path().join("pack.fomod");
        let result = PackageBuilder::new(PackageInfo::with_defaults("pack"))
            .with_instructions([CopyInstruction::new(
                temp_dir.path().join("one.esp").to_string_lossy(),
                "../escape.esp",
            )])
            .build(&output);
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
