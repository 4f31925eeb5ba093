// src/mapper/find.rs

//! Pattern lookup in the destination tree
//!
//! Patterns are `/`- or `\`-separated. Every segment but the last names a
//! directory exactly (ignoring case); the last segment is a file-name
//! pattern where `*` matches any run of characters and everything else
//! matches literally, ignoring case.

use super::SourceMapper;
use super::tree::NodeId;
use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A node matched by [`SourceMapper::find_files`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    /// Destination path of the match
    pub destination: String,
    /// First source merged at that destination
    pub source: String,
}

impl SourceMapper {
    /// Find every node matching `pattern`
    ///
    /// Directories along the matched path are listed on demand; nothing
    /// outside the path is enumerated.
    pub fn find_files(&mut self, pattern: &str) -> Result<Vec<FoundFile>> {
        let mut segments: Vec<&str> = pattern
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect();
        let file_pattern = compile(segments.pop().unwrap_or("*"))?;
        let directories: Vec<String> = segments.iter().map(|s| s.to_lowercase()).collect();

        let mut found = Vec::new();
        self.find_below(None, &directories, &file_pattern, &mut found);
        Ok(found)
    }

    fn find_below(
        &mut self,
        parent: Option<NodeId>,
        directories: &[String],
        file_pattern: &Pattern,
        found: &mut Vec<FoundFile>,
    ) {
        let children = self.tree.children_of(parent).to_vec();

        let Some((next, rest)) = directories.split_first() else {
            for child in children {
                let node = self.tree.get(child);
                if !file_pattern.matches_with(node.name(), MATCH_OPTIONS) {
                    continue;
                }
                if let Some(source) = node.sources().first() {
                    found.push(FoundFile {
                        destination: self.tree.full_path(child),
                        source: source.clone(),
                    });
                }
            }
            return;
        };

        let directory = children.into_iter().find(|&c| {
            let node = self.tree.get(c);
            node.is_directory() && node.key() == next.as_str()
        });
        if let Some(directory) = directory {
            self.populate(directory);
            self.find_below(Some(directory), rest, file_pattern, found);
        }
    }
}

/// Turn a file-name pattern into a glob where only `*` is special
fn compile(segment: &str) -> Result<Pattern> {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == '*' {
            escaped.push('*');
        } else {
            escaped.push_str(&Pattern::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    Pattern::new(&escaped).map_err(|e| Error::InvalidPath(format!("pattern '{}': {}", segment, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mapper_with_fomod() -> (TempDir, SourceMapper) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("pack");
        fs::create_dir_all(root.join("fomod")).unwrap();
        fs::write(root.join("fomod/Script.cs"), b"s").unwrap();
        fs::write(root.join("fomod/info.xml"), b"i").unwrap();
        fs::write(root.join("fomod/screenshot.png"), b"p").unwrap();
        fs::write(root.join("readme [v1].txt"), b"r").unwrap();

        let mut mapper = SourceMapper::new();
        mapper.add_path(None, &root.to_string_lossy()).unwrap();
        (temp_dir, mapper)
    }

    #[test]
    fn test_find_with_wildcard_populates_lazily() {
        let (temp_dir, mut mapper) = mapper_with_fomod();

        let found = mapper.find_files("PACK\\fomod\\script.*").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].destination, "pack/fomod/Script.cs");
        assert_eq!(
            found[0].source,
            temp_dir.path().join("pack/fomod/Script.cs").to_string_lossy()
        );
    }

    #[test]
    fn test_find_treats_brackets_literally() {
        let (_temp_dir, mut mapper) = mapper_with_fomod();
        let found = mapper.find_files("pack/readme [v1].txt").unwrap();
        assert_eq!(found.len(), 1);

        assert!(mapper.find_files("pack/readme [v2].txt").unwrap().is_empty());
    }

    #[test]
    fn test_find_multiple_matches_and_misses() {
        let (_temp_dir, mut mapper) = mapper_with_fomod();
        let found = mapper.find_files("pack/fomod/*").unwrap();
        assert_eq!(found.len(), 3);

        assert!(mapper.find_files("other/fomod/*").unwrap().is_empty());
        assert!(mapper.find_files("pack/fomod/*.bmp").unwrap().is_empty());
    }
}
