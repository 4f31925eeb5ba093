// src/mapper/tree.rs

//! Arena-allocated destination tree
//!
//! Nodes are stored in a contiguous Vec and referenced by [`NodeId`]. The
//! tree is a forest: top-level nodes have no parent and are listed in
//! `roots`. Removing a node detaches it from its parent; the slot stays in
//! the arena so outstanding ids never dangle.
//!
//! Cloning a [`SourceTree`] is a plain structural copy of the arena, which is
//! what makes the destructive compression pass safe to run on a throwaway
//! copy while the caller keeps the live tree.

use crate::error::{Error, Result};
use std::cmp::Ordering;

/// Handle to a node in a [`SourceTree`]
///
/// Ids are only meaningful for the tree (or clones of the tree) that issued
/// them. Using a foreign id panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the raw index value
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the destination tree
#[derive(Debug, Clone)]
pub struct SourceNode {
    name: String,
    /// Lower-cased name, unique among siblings
    key: String,
    is_directory: bool,
    sources: Vec<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    expanded: bool,
}

impl SourceNode {
    /// Display name of the node
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased name used for sibling lookup
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Origins merged at this destination, in the order they were added
    #[inline]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node has been expanded (its children's contents enumerated)
    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
}

/// Display order of two nodes: directories before files, then by name
/// ignoring case
pub fn compare_nodes(a: &SourceNode, b: &SourceNode) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.key.cmp(&b.key))
        .then_with(|| a.name.cmp(&b.name))
}

/// Forest of destination nodes
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    nodes: Vec<SourceNode>,
    roots: Vec<NodeId>,
}

impl SourceTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level nodes in insertion order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of `parent`, or the top-level nodes when `parent` is `None`
    pub fn children_of(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => &self.get(id).children,
            None => &self.roots,
        }
    }

    /// Returns true if no node is attached
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Get a node by id
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this tree.
    #[inline]
    pub fn get(&self, id: NodeId) -> &SourceNode {
        &self.nodes[id.0]
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut SourceNode {
        &mut self.nodes[id.0]
    }

    /// Find the child of `parent` whose name matches `name` ignoring case
    pub fn find_child(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        let key = name.to_lowercase();
        self.children_of(parent)
            .iter()
            .copied()
            .find(|&id| self.get(id).key == key)
    }

    /// Attach a new node below `parent` (or at the top level)
    ///
    /// The caller is responsible for checking that no sibling already uses
    /// the name; [`find_child`](Self::find_child) first.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        is_directory: bool,
        source: &str,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SourceNode {
            name: name.to_string(),
            key: name.to_lowercase(),
            is_directory,
            sources: vec![source.to_string()],
            parent,
            children: Vec::new(),
            expanded: false,
        });

        match parent {
            Some(p) => self.get_mut(p).children.push(id),
            None => self.roots.push(id),
        }

        id
    }

    /// Append a source to a node; returns false if it was already present
    pub fn add_source(&mut self, id: NodeId, source: &str) -> bool {
        let node = self.get_mut(id);
        if node.sources.iter().any(|s| s == source) {
            return false;
        }
        node.sources.push(source.to_string());
        true
    }

    /// Remove a source from a node; returns false if it was not present
    pub fn remove_source(&mut self, id: NodeId, source: &str) -> bool {
        let node = self.get_mut(id);
        match node.sources.iter().position(|s| s == source) {
            Some(pos) => {
                node.sources.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Detach a node (and with it, its subtree) from the tree
    pub fn detach(&mut self, id: NodeId) {
        match self.get(id).parent {
            Some(p) => self.get_mut(p).children.retain(|&c| c != id),
            None => self.roots.retain(|&c| c != id),
        }
    }

    /// Rename a node, refusing names already used by a sibling
    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::InvalidPath(format!("invalid node name '{}'", name)));
        }

        let parent = self.get(id).parent;
        if let Some(existing) = self.find_child(parent, name)
            && existing != id
        {
            return Err(Error::InvalidPath(format!(
                "a sibling named '{}' already exists",
                self.get(existing).name
            )));
        }

        let node = self.get_mut(id);
        node.name = name.to_string();
        node.key = name.to_lowercase();
        Ok(())
    }

    pub(crate) fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        self.get_mut(id).expanded = expanded;
    }

    /// Destination path of a node, `/`-separated from the package root
    pub fn full_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get(node_id);
            segments.push(node.name.as_str());
            current = node.parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Children of `parent` in display order
    pub fn sorted_children(&self, parent: Option<NodeId>) -> Vec<NodeId> {
        let mut children = self.children_of(parent).to_vec();
        children.sort_by(|&a, &b| compare_nodes(self.get(a), self.get(b)));
        children
    }

    /// Walk every attached node depth-first in insertion order
    pub fn walk<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeId, &SourceNode),
    {
        for &root in &self.roots {
            self.walk_recursive(root, &mut visitor);
        }
    }

    fn walk_recursive<F>(&self, id: NodeId, visitor: &mut F)
    where
        F: FnMut(NodeId, &SourceNode),
    {
        let node = self.get(id);
        visitor(id, node);
        for &child in &node.children {
            self.walk_recursive(child, visitor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find_child_ignores_case() {
        let mut tree = SourceTree::new();
        let meshes = tree.insert(None, "Meshes", true, "/src/Meshes");
        let armor = tree.insert(Some(meshes), "Armor.NIF", false, "/src/Meshes/Armor.NIF");

        assert_eq!(tree.find_child(None, "meshes"), Some(meshes));
        assert_eq!(tree.find_child(Some(meshes), "armor.nif"), Some(armor));
        assert_eq!(tree.find_child(Some(meshes), "other.nif"), None);
        assert_eq!(tree.full_path(armor), "Meshes/Armor.NIF");
    }

    #[test]
    fn test_add_source_deduplicates() {
        let mut tree = SourceTree::new();
        let id = tree.insert(None, "a.esp", false, "/one/a.esp");
        assert!(tree.add_source(id, "/two/a.esp"));
        assert!(!tree.add_source(id, "/one/a.esp"));
        assert_eq!(tree.get(id).sources(), ["/one/a.esp", "/two/a.esp"]);

        assert!(tree.remove_source(id, "/one/a.esp"));
        assert!(!tree.remove_source(id, "/one/a.esp"));
        assert_eq!(tree.get(id).sources(), ["/two/a.esp"]);
    }

    #[test]
    fn test_detach_removes_subtree_from_walk() {
        let mut tree = SourceTree::new();
        let dir = tree.insert(None, "textures", true, "/src/textures");
        tree.insert(Some(dir), "a.dds", false, "/src/textures/a.dds");
        let other = tree.insert(None, "b.esp", false, "/src/b.esp");

        tree.detach(dir);

        let mut seen = Vec::new();
        tree.walk(|id, _| seen.push(id));
        assert_eq!(seen, vec![other]);
        assert_eq!(tree.roots(), [other]);
    }

    #[test]
    fn test_rename_rejects_sibling_collision() {
        let mut tree = SourceTree::new();
        let a = tree.insert(None, "a.esp", false, "/a.esp");
        tree.insert(None, "b.esp", false, "/b.esp");

        assert!(tree.rename(a, "B.ESP").is_err());
        assert!(tree.rename(a, "bad/name").is_err());
        tree.rename(a, "A.esp").unwrap();
        assert_eq!(tree.get(a).name(), "A.esp");
        assert_eq!(tree.find_child(None, "a.ESP"), Some(a));
    }

    #[test]
    fn test_sorted_children_directories_first() {
        let mut tree = SourceTree::new();
        let zeta = tree.insert(None, "zeta.esp", false, "/zeta.esp");
        let alpha_file = tree.insert(None, "Alpha.esp", false, "/Alpha.esp");
        let textures = tree.insert(None, "textures", true, "/textures");
        let meshes = tree.insert(None, "Meshes", true, "/Meshes");

        assert_eq!(
            tree.sorted_children(None),
            vec![meshes, textures, alpha_file, zeta]
        );
    }

    #[test]
    fn test_clone_is_isolated() {
        let mut tree = SourceTree::new();
        let dir = tree.insert(None, "meshes", true, "/meshes");
        let file = tree.insert(Some(dir), "a.nif", false, "/meshes/a.nif");

        let mut copy = tree.clone();
        copy.detach(file);
        copy.remove_source(dir, "/meshes");

        assert_eq!(tree.get(dir).children(), [file]);
        assert_eq!(tree.get(dir).sources(), ["/meshes"]);
        assert!(copy.get(dir).children().is_empty());
    }
}
