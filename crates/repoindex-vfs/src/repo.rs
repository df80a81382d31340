//! Repository descriptors and the flat repository table.
//!
//! Every repository is stored exactly once in a [`RepoTable`]; the VFS and
//! the link-tree code refer to it through a [`RepoId`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use repoindex_config::path::normalize_or_original;

/// A repository as handed over by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Display name, usually the directory name
    pub name: String,
    /// Classification attributes; any of them may be unknown
    #[serde(default)]
    pub attributes: RepoAttributes,
}

impl Repository {
    /// Descriptor with no attribute metadata
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            attributes: RepoAttributes::default(),
        }
    }

    /// Descriptor named after the last path component
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(path, name)
    }

    pub fn with_attributes(mut self, attributes: RepoAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Name of the directory containing the repository
    pub fn parent_dir_name(&self) -> Option<String> {
        self.path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Attributes used for classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoAttributes {
    /// Primary language
    pub language: Option<String>,
    /// Working tree has uncommitted changes
    pub dirty: Option<bool>,
    /// SPDX license identifier
    pub license: Option<String>,
    /// Remote hosting metadata
    pub remote: Option<RemoteInfo>,
    /// Presence markers (`readme`, `ci`, ...) surfaced as `has:` tags
    pub features: Vec<String>,
    /// Package registries the project is published to (`pypi`, `crates`, ...)
    pub registries: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Remote hosting metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteInfo {
    /// Host name, e.g. `github.com`
    pub host: String,
    /// Owning user or organisation
    pub owner: Option<String>,
    pub fork: bool,
    pub archived: bool,
    pub private: bool,
    pub stars: Option<u64>,
}

/// Index into a [`RepoTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId(usize);

/// A repository plus the unique name it carries inside the VFS
#[derive(Debug, Clone)]
pub struct RepoEntry {
    pub repo: Repository,
    /// Canonical path, the table key
    pub key: PathBuf,
    /// Name under `/repos`, unique within the table
    pub vfs_name: String,
}

/// Flat arena of repositories keyed by canonical path.
#[derive(Debug, Clone, Default)]
pub struct RepoTable {
    entries: Vec<RepoEntry>,
    by_path: HashMap<PathBuf, RepoId>,
    by_name: HashMap<String, RepoId>,
}

impl RepoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a repository, returning its id.
    ///
    /// A path already in the table returns the existing id. A name already
    /// taken by another path gets the first free `-N` suffix.
    pub fn insert(&mut self, repo: Repository) -> RepoId {
        let key = normalize_or_original(&repo.path);
        if let Some(id) = self.by_path.get(&key) {
            return *id;
        }

        let vfs_name = self.unique_name(&repo.name);
        let id = RepoId(self.entries.len());
        self.by_path.insert(key.clone(), id);
        self.by_name.insert(vfs_name.clone(), id);
        self.entries.push(RepoEntry {
            repo,
            key,
            vfs_name,
        });
        id
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.by_name.contains_key(name) {
            return name.to_string();
        }
        (1..)
            .map(|i| format!("{}-{}", name, i))
            .find(|candidate| !self.by_name.contains_key(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn get(&self, id: RepoId) -> Option<&RepoEntry> {
        self.entries.get(id.0)
    }

    /// Look up by (canonicalized) repository path
    pub fn find_by_path(&self, path: &Path) -> Option<RepoId> {
        self.by_path.get(&normalize_or_original(path)).copied()
    }

    /// Look up by VFS name
    pub fn find_by_name(&self, name: &str) -> Option<RepoId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RepoId, &RepoEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (RepoId(i), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
