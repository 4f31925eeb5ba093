// src/mapper/mod.rs

//! Source Tree Mapper
//!
//! Merges heterogeneous sources (directories, single files, archive entries
//! and virtual folders) into one destination tree, and turns that tree into
//! the minimal list of copy instructions needed to reproduce it.
//!
//! Directory contents are enumerated lazily: adding a directory at the top
//! level, or below an expanded node, lists its immediate children; deeper
//! levels are filled in by [`SourceMapper::expand`] or on demand by
//! [`SourceMapper::find_node`] and [`SourceMapper::find_files`].
//!
//! Enumeration is the only step that touches the disk. It can be cancelled
//! through the flag returned by [`SourceMapper::cancel_flag`]; nodes added
//! before the flag was raised stay valid.

mod compress;
mod find;
mod source;
mod tree;

pub use compress::CopyInstruction;
pub use find::FoundFile;
pub use source::{NEW_PREFIX, SourceKind, SourceResolver, is_virtual, virtual_source};
pub use tree::{NodeId, SourceNode, SourceTree, compare_nodes};

use crate::archive::ArchivePath;
use crate::error::{Error, Result};
use crate::filesystem::path::{file_name, normalize_relative, parent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Destination tree plus the resolver used to enumerate its sources
#[derive(Debug, Default)]
pub struct SourceMapper {
    tree: SourceTree,
    resolver: SourceResolver,
    cancel: Arc<AtomicBool>,
}

impl SourceMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live destination tree
    pub fn tree(&self) -> &SourceTree {
        &self.tree
    }

    /// Flag that stops enumeration when set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Add a source below `parent` (or at the top level)
    ///
    /// If a sibling with the same name (ignoring case) exists, the source is
    /// merged into it. Returns `None` for sources that no longer exist or are
    /// system entries.
    pub fn add_path(&mut self, parent: Option<NodeId>, source: &str) -> Option<NodeId> {
        self.add_path_named(parent, source, None)
    }

    /// Add a source under an explicit destination name
    pub fn add_path_named(
        &mut self,
        parent: Option<NodeId>,
        source: &str,
        name: Option<&str>,
    ) -> Option<NodeId> {
        let Some(is_directory) = self.resolver.inspect(source) else {
            debug!("Skipping missing source {}", source);
            return None;
        };

        let name = match name {
            Some(n) => n.to_string(),
            None => SourceKind::classify(source).name(),
        };
        if name.is_empty() {
            debug!("Skipping source without a name: {}", source);
            return None;
        }

        let id = match self.tree.find_child(parent, &name) {
            Some(existing) => {
                self.tree.add_source(existing, source);
                existing
            }
            None => self.tree.insert(parent, &name, is_directory, source),
        };

        let parent_open = parent.is_none_or(|p| self.tree.get(p).is_expanded());
        if self.tree.get(id).is_directory() && parent_open {
            self.enumerate_into(id, &[source.to_string()]);
        }

        Some(id)
    }

    /// Create an empty virtual folder
    pub fn new_folder(&mut self, parent: Option<NodeId>, name: &str) -> Result<NodeId> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::InvalidPath(format!("invalid folder name '{}'", name)));
        }
        let id = self
            .add_path(parent, &virtual_source(name))
            .ok_or_else(|| Error::InvalidPath(name.to_string()))?;
        if let Some(p) = parent {
            self.expand(p);
        }
        Ok(id)
    }

    /// Rename a node; names stay unique among siblings ignoring case
    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.tree.rename(id, name)
    }

    /// Remove a node and its subtree
    pub fn remove(&mut self, id: NodeId) {
        self.tree.detach(id);
    }

    /// Destination path of a node
    pub fn full_path(&self, id: NodeId) -> String {
        self.tree.full_path(id)
    }

    /// Expand a node: make sure its own children are listed, then list the
    /// contents of each child directory that has none yet
    pub fn expand(&mut self, id: NodeId) {
        self.populate(id);
        self.tree.set_expanded(id, true);

        let children = self.tree.get(id).children().to_vec();
        for child in children {
            if self.is_cancelled() {
                return;
            }
            self.populate(child);
        }
    }

    /// List the contents of a childless directory node from all its sources
    pub(crate) fn populate(&mut self, id: NodeId) {
        let node = self.tree.get(id);
        if !node.is_directory() || !node.children().is_empty() {
            return;
        }
        let sources = node.sources().to_vec();
        self.enumerate_into(id, &sources);
    }

    /// Add the children of every given source below `id`, directories from
    /// all sources first
    fn enumerate_into(&mut self, id: NodeId, sources: &[String]) {
        let mut directories = Vec::new();
        let mut files = Vec::new();

        for source in sources {
            let children = match self.resolver.children(source) {
                Ok(children) => children,
                Err(e) => {
                    debug!("Cannot enumerate {}: {}", source, e);
                    continue;
                }
            };
            for child in children {
                match self.resolver.inspect(&child) {
                    Some(true) => directories.push(child),
                    Some(false) => files.push(child),
                    None => {}
                }
            }
        }

        for child in directories.iter().chain(files.iter()) {
            if self.is_cancelled() {
                debug!("Enumeration cancelled below {}", self.tree.full_path(id));
                return;
            }
            self.add_path(Some(id), child);
        }
    }

    /// Walk `segments` down from the top level, expanding every node passed
    /// through; returns the deepest match and how many segments matched
    fn locate(&mut self, segments: &[&str]) -> (Option<NodeId>, usize) {
        let mut current = None;
        let mut matched = 0;

        for segment in segments {
            let Some(child) = self.tree.find_child(current, segment) else {
                break;
            };
            current = Some(child);
            matched += 1;
            if matched < segments.len() {
                self.expand(child);
            }
        }

        (current, matched)
    }

    /// Find the node at a destination path, ignoring case
    ///
    /// Nodes along the way are expanded so that paths below lazily listed
    /// directories resolve.
    pub fn find_node(&mut self, path: &str) -> Option<NodeId> {
        let normalized = normalize_relative(path);
        if normalized.is_empty() {
            return None;
        }
        let segments: Vec<&str> = normalized.split('/').collect();
        match self.locate(&segments) {
            (node, matched) if matched == segments.len() => node,
            _ => None,
        }
    }

    /// Find or create the folder at `path`, creating missing segments as
    /// virtual folders
    fn ensure_folder(&mut self, path: &str) -> Option<NodeId> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (mut current, matched) = self.locate(&segments);

        for segment in &segments[matched..] {
            current = self.add_path(current, &virtual_source(segment));
        }

        current
    }

    /// Rebuild the tree from a list of copy instructions
    ///
    /// An instruction targeting the package root is replaced by one
    /// instruction per immediate child of its (directory) source. Returns the
    /// subset of `sources` the instructions draw from: the container of each
    /// archive source, and each filesystem source that prefixes an
    /// instruction's source.
    pub fn set_copy_instructions(
        &mut self,
        sources: &[String],
        instructions: &[CopyInstruction],
    ) -> Result<Vec<String>> {
        let mut expanded = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let destination = normalize_relative(&instruction.destination);
            if !destination.is_empty() {
                expanded.push(CopyInstruction::new(instruction.source.clone(), destination));
                continue;
            }

            if !self.resolver.is_directory(&instruction.source) {
                return Err(Error::InvalidInstruction(format!(
                    "{} is renamed to the package root but is not a directory",
                    instruction.source
                )));
            }
            for child in self.resolver.children(&instruction.source)? {
                let name = SourceKind::classify(&child).name();
                expanded.push(CopyInstruction::new(child, name));
            }
        }

        let mut referenced: Vec<String> = Vec::new();
        for instruction in &expanded {
            match SourceKind::classify(&instruction.source) {
                SourceKind::Archive(path) => {
                    push_unique(&mut referenced, path.container.to_string_lossy().into_owned())
                }
                SourceKind::Filesystem(_) => {
                    for known in sources {
                        if instruction.source.starts_with(known.as_str()) {
                            push_unique(&mut referenced, known.clone());
                        }
                    }
                }
                SourceKind::Virtual(_) => {}
            }

            let folder = match parent(&instruction.destination) {
                Some(dir) => self.ensure_folder(dir),
                None => None,
            };
            let name = file_name(&instruction.destination).to_string();
            self.add_path_named(folder, &instruction.source, Some(&name));
        }

        Ok(referenced)
    }

    /// The minimal list of copy instructions that reproduces the tree
    ///
    /// Works on a clone; the live tree is not modified.
    pub fn copy_instructions(&mut self) -> Vec<CopyInstruction> {
        compress::compress(self.tree.clone(), &mut self.resolver)
    }

    /// Container paths of every archive the tree draws from
    pub fn archive_containers(&self) -> Vec<String> {
        let mut containers = Vec::new();
        self.tree.walk(|_, node| {
            for source in node.sources() {
                if let Some(path) = ArchivePath::parse(source) {
                    push_unique(&mut containers, path.container.to_string_lossy().into_owned());
                }
            }
        });
        containers
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
