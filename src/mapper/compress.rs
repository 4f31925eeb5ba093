// src/mapper/compress.rs

//! Reduction of a destination tree to a minimal set of copy instructions
//!
//! Runs on a throwaway clone of the tree; every step here is destructive.

use super::source::{SourceResolver, is_virtual};
use super::tree::{NodeId, SourceTree};
use tracing::debug;

/// A resolved placement of one source into the package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CopyInstruction {
    /// Filesystem path, archive source or (never emitted) virtual folder
    pub source: String,
    /// `/`-separated destination path inside the package
    pub destination: String,
}

impl CopyInstruction {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Compress a whole tree and flatten it into instructions
pub(crate) fn compress(mut tree: SourceTree, resolver: &mut SourceResolver) -> Vec<CopyInstruction> {
    let roots = tree.roots().to_vec();
    for &root in roots.iter().rev() {
        let node = tree.get(root);
        if node.is_directory() && node.children().is_empty() {
            tree.detach(root);
        } else {
            process_tree(&mut tree, resolver, root);
        }
    }

    let mut instructions = Vec::new();
    tree.walk(|id, node| {
        for source in node.sources() {
            instructions.push(CopyInstruction::new(source.clone(), tree.full_path(id)));
        }
    });
    instructions
}

/// Minimise one subtree, children before parent
///
/// A leaf keeps every real source. For an inner node, each directory-level
/// source whose immediate children are all represented by childless child
/// nodes is kept as the single instruction and those per-child entries are
/// removed; any other directory-level source is dropped, leaving the explicit
/// children to stand for it.
fn process_tree(tree: &mut SourceTree, resolver: &mut SourceResolver, id: NodeId) {
    let children = tree.get(id).children().to_vec();
    if children.is_empty() {
        let virtual_sources: Vec<String> = tree
            .get(id)
            .sources()
            .iter()
            .filter(|s| is_virtual(s))
            .cloned()
            .collect();
        for source in virtual_sources {
            tree.remove_source(id, &source);
        }
        return;
    }

    for child in children {
        process_tree(tree, resolver, child);
    }

    let sources = tree.get(id).sources().to_vec();
    for source in sources.iter().rev() {
        if is_virtual(source) {
            tree.remove_source(id, source);
            continue;
        }

        let sub_paths = match resolver.children(source) {
            Ok(paths) => paths,
            Err(e) => {
                debug!("Dropping unreadable source {}: {}", source, e);
                tree.remove_source(id, source);
                continue;
            }
        };

        let shadowed = sub_paths.iter().all(|sub| {
            tree.get(id).children().iter().any(|&c| {
                let child = tree.get(c);
                child.children().is_empty() && child.sources().contains(sub)
            })
        });

        if !shadowed {
            tree.remove_source(id, source);
            continue;
        }

        for sub in &sub_paths {
            let owner = tree
                .get(id)
                .children()
                .iter()
                .rev()
                .copied()
                .find(|&c| tree.get(c).sources().contains(sub));
            if let Some(child) = owner {
                if tree.get(child).sources().len() > 1 {
                    tree.remove_source(child, sub);
                } else {
                    tree.detach(child);
                }
            }
        }
    }
}
