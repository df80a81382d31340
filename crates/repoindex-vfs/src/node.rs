//! VFS node types.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::repo::RepoId;

/// Children of a directory, ordered by name
pub type Children = BTreeMap<String, VfsNode>;

/// A node of the snapshot tree.
///
/// Repository data is never duplicated: `Repository` and `Symlink` nodes
/// carry a [`RepoId`] into the snapshot's repository table.
#[derive(Debug, Clone, PartialEq)]
pub enum VfsNode {
    Directory(Children),
    /// The canonical entry of a repository under `/repos`
    Repository(RepoId),
    /// A reference to `target` (an absolute VFS path) backed by `repo`
    Symlink { target: String, repo: RepoId },
    ConfigValue(String),
}

impl VfsNode {
    pub fn empty_dir() -> Self {
        VfsNode::Directory(Children::new())
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, VfsNode::Directory(_))
    }

    pub fn children(&self) -> Option<&Children> {
        match self {
            VfsNode::Directory(children) => Some(children),
            _ => None,
        }
    }

    /// Repository behind a `Repository` or `Symlink` node
    pub fn repo_id(&self) -> Option<RepoId> {
        match self {
            VfsNode::Repository(id) | VfsNode::Symlink { repo: id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            VfsNode::Directory(_) => EntryKind::Directory,
            VfsNode::Repository(_) => EntryKind::Repository,
            VfsNode::Symlink { .. } => EntryKind::Symlink,
            VfsNode::ConfigValue(_) => EntryKind::ConfigValue,
        }
    }

    /// Turn this node into a directory (discarding a non-directory value)
    /// and return its children.
    pub(crate) fn make_dir(&mut self) -> &mut Children {
        if !self.is_dir() {
            *self = VfsNode::empty_dir();
        }
        match self {
            VfsNode::Directory(children) => children,
            _ => unreachable!("node was just converted to a directory"),
        }
    }
}

/// What a listed entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    Directory,
    Repository,
    Symlink,
    ConfigValue,
    /// A regular file inside a repository's real directory
    File,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryKind::Directory => "dir",
            EntryKind::Repository => "repo",
            EntryKind::Symlink => "link",
            EntryKind::ConfigValue => "value",
            EntryKind::File => "file",
        };
        f.write_str(s)
    }
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VfsEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_dir_converts_leaf() {
        let mut node = VfsNode::ConfigValue("x".into());
        node.make_dir().insert("a".into(), VfsNode::empty_dir());
        assert!(node.is_dir());
        assert_eq!(node.children().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_make_dir_keeps_existing_children() {
        let mut node = VfsNode::empty_dir();
        node.make_dir().insert("a".into(), VfsNode::empty_dir());
        node.make_dir().insert("b".into(), VfsNode::empty_dir());
        assert_eq!(node.children().map(|c| c.len()), Some(2));
    }
}
