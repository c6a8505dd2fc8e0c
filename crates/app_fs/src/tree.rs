//! Directory synthesis from flat archive entry lists
//!
//! Archives store a flat list of paths. Directories may be recorded
//! explicitly, only implied by the files under them, or both. `EntryTree`
//! merges all of that into one node per normalized path.

use crate::format::Entry;
use crate::{Result, VfsError};
use std::collections::BTreeMap;

/// Canonical form of an archive entry path: no leading or trailing `/`,
/// no empty or `.` segments.
pub fn normalize_entry_path(raw: &str) -> String {
    raw.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode {
    /// Index into the entry list the tree was built from
    File { entry: usize },
    /// `explicit` is true when the archive holds a marker entry for it
    Directory { explicit: bool },
}

#[derive(Debug, Clone, Default)]
pub struct EntryTree {
    nodes: BTreeMap<String, TreeNode>,
}

impl EntryTree {
    /// Merge a flat entry list into a tree.
    ///
    /// A path used both as a file and as a directory is an `AmbiguousEntry`.
    /// When the same file path appears twice, the later entry wins.
    pub fn from_entries(entries: &[Entry]) -> Result<Self> {
        let mut tree = Self::default();

        for (index, entry) in entries.iter().enumerate() {
            let path = normalize_entry_path(&entry.path);
            if path.is_empty() {
                continue;
            }

            let mut prefix = String::new();
            let segments: Vec<&str> = path.split('/').collect();
            for segment in &segments[..segments.len() - 1] {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);

                match tree.nodes.get(&prefix) {
                    Some(TreeNode::File { .. }) => return Err(VfsError::AmbiguousEntry(prefix)),
                    Some(TreeNode::Directory { .. }) => {}
                    None => {
                        tree.nodes
                            .insert(prefix.clone(), TreeNode::Directory { explicit: false });
                    }
                }
            }

            let existing = tree.nodes.get(&path).copied();
            match (entry.is_directory(), existing) {
                (true, Some(TreeNode::File { .. })) | (false, Some(TreeNode::Directory { .. })) => {
                    return Err(VfsError::AmbiguousEntry(path));
                }
                (true, _) => {
                    tree.nodes.insert(path, TreeNode::Directory { explicit: true });
                }
                (false, previous) => {
                    if previous.is_some() {
                        tracing::debug!("Duplicate archive entry {}, keeping the later one", path);
                    }
                    tree.nodes.insert(path, TreeNode::File { entry: index });
                }
            }
        }

        Ok(tree)
    }

    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        self.nodes.get(&normalize_entry_path(path))
    }

    /// True for the archive root and for every synthesized or explicit directory
    pub fn is_directory(&self, path: &str) -> bool {
        let path = normalize_entry_path(path);
        path.is_empty() || matches!(self.nodes.get(&path), Some(TreeNode::Directory { .. }))
    }

    /// Direct children of `dir` (empty string for the archive root), as full relative paths
    pub fn children(&self, dir: &str) -> Vec<(&str, TreeNode)> {
        let dir = normalize_entry_path(dir);
        let prefix = if dir.is_empty() { String::new() } else { format!("{}/", dir) };

        self.nodes
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path.is_empty() && !path[prefix.len()..].contains('/'))
            .map(|(path, node)| (path.as_str(), *node))
            .collect()
    }

    /// Every file leaf with the index of the entry it came from
    pub fn files(&self) -> impl Iterator<Item = (&str, usize)> {
        self.nodes.iter().filter_map(|(path, node)| match node {
            TreeNode::File { entry } => Some((path.as_str(), *entry)),
            TreeNode::Directory { .. } => None,
        })
    }
}
