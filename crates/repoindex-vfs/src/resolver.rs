//! Path resolution and navigation over a [`Vfs`] snapshot.
//!
//! Paths are `/`-separated. Walking enters symlinks by restarting from their
//! target. Walking through a `Repository` node leaves the VFS: the rest of
//! the path is resolved against the repository's real directory, and the
//! resolver stays in that "real" mode until navigation leaves the
//! repository root, at which point it returns to `/repos`.

use std::fs;
use std::path::{Path, PathBuf};

use repoindex_config::log_vfs_debug;
use repoindex_config::path::{is_within_directory, normalize_lexically};

use crate::builder::Vfs;
use crate::node::{EntryKind, VfsEntry, VfsNode};
use crate::repo::RepoId;
use crate::{Result, VfsError, REPOS_ROOT};

/// Symlink chains longer than this are treated as unresolvable
const MAX_LINK_DEPTH: usize = 16;

/// Where a path (or the working directory) points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A node of the snapshot, by canonical VFS path
    Vfs(String),
    /// A directory or file inside a repository's on-disk contents
    Real { repo: RepoId, path: PathBuf },
}

enum Walked<'v> {
    Node { node: &'v VfsNode, path: Vec<String> },
    Real { repo: RepoId, path: PathBuf },
}

/// Split a normalized absolute path into segments
fn segments_of(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_segments(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

pub struct PathResolver<'v> {
    vfs: &'v Vfs,
    cwd: Location,
}

impl<'v> PathResolver<'v> {
    /// Resolver positioned at `/`
    pub fn new(vfs: &'v Vfs) -> Self {
        Self {
            vfs,
            cwd: Location::Vfs("/".to_string()),
        }
    }

    pub fn vfs(&self) -> &'v Vfs {
        self.vfs
    }

    pub fn location(&self) -> &Location {
        &self.cwd
    }

    /// Working directory as a VFS path. Inside a repository this is
    /// `/repos/<name>/<relative path>`.
    pub fn pwd(&self) -> String {
        match &self.cwd {
            Location::Vfs(path) => path.clone(),
            Location::Real { repo, path } => self.real_to_vfs(*repo, path),
        }
    }

    fn real_to_vfs(&self, repo: RepoId, path: &Path) -> String {
        let Some(entry) = self.vfs.repos().get(repo) else {
            return format!("/{}", REPOS_ROOT);
        };
        let mut vfs_path = format!("/{}/{}", REPOS_ROOT, entry.vfs_name);
        if let Ok(rel) = path.strip_prefix(&entry.key) {
            for component in rel.components() {
                vfs_path.push('/');
                vfs_path.push_str(&component.as_os_str().to_string_lossy());
            }
        }
        vfs_path
    }

    /// Normalize `raw` into an absolute VFS path.
    ///
    /// Relative paths are taken from the working directory; `.` and `..` are
    /// applied lexically (`..` at the root stays at the root).
    pub fn resolve(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains('\0') {
            return Err(VfsError::InvalidPath(raw.to_string()));
        }

        let mut segments = if raw.starts_with('/') {
            Vec::new()
        } else {
            segments_of(&self.pwd())
        };
        for part in raw.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }
        Ok(join_segments(&segments))
    }

    /// The node at `raw`, following symlinks on the way but not a final one.
    ///
    /// Paths that continue past a repository into its real contents have no
    /// VFS node and are reported as not found.
    pub fn get_node(&self, raw: &str) -> Result<&'v VfsNode> {
        let path = self.resolve(raw)?;
        match self.walk(segments_of(&path), false, 0)? {
            Walked::Node { node, .. } => Ok(node),
            Walked::Real { .. } => Err(VfsError::NotFound(path)),
        }
    }

    /// Fully resolve `raw`, following every symlink. A repository itself
    /// resolves to its real root directory.
    pub fn locate(&self, raw: &str) -> Result<Location> {
        let path = self.resolve(raw)?;
        match self.walk(segments_of(&path), true, 0)? {
            Walked::Node {
                node: VfsNode::Repository(id),
                ..
            } => self.real_location(*id, PathBuf::new(), &path),
            Walked::Node { path, .. } => Ok(Location::Vfs(join_segments(&path))),
            Walked::Real { repo, path: real } => Ok(Location::Real { repo, path: real }),
        }
    }

    fn walk(&self, segments: Vec<String>, follow_last: bool, depth: usize) -> Result<Walked<'v>> {
        let mut node = self.vfs.root();
        let mut canonical: Vec<String> = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let children = node
                .children()
                .ok_or_else(|| VfsError::NotADirectory(join_segments(&canonical)))?;
            let child = children
                .get(segment)
                .ok_or_else(|| VfsError::NotFound(join_segments(&segments)))?;
            let rest = &segments[i + 1..];

            match child {
                VfsNode::Symlink { target, .. } if follow_last || !rest.is_empty() => {
                    if depth >= MAX_LINK_DEPTH {
                        return Err(VfsError::InvalidPath(format!(
                            "too many levels of symbolic links: {}",
                            join_segments(&segments)
                        )));
                    }
                    let mut redirected = segments_of(target);
                    redirected.extend(rest.iter().cloned());
                    return self.walk(redirected, follow_last, depth + 1);
                }
                VfsNode::Repository(id) if !rest.is_empty() => {
                    let relative: PathBuf = rest.iter().collect();
                    let location = self.real_location(*id, relative, &join_segments(&segments))?;
                    return match location {
                        Location::Real { repo, path } => Ok(Walked::Real { repo, path }),
                        Location::Vfs(_) => Err(VfsError::NotFound(join_segments(&segments))),
                    };
                }
                _ => {
                    node = child;
                    canonical.push(segment.clone());
                }
            }
        }

        Ok(Walked::Node {
            node,
            path: canonical,
        })
    }

    /// Real location `relative` below a repository root, which must exist and
    /// stay inside the root.
    fn real_location(&self, repo: RepoId, relative: PathBuf, shown: &str) -> Result<Location> {
        let root = self
            .vfs
            .real_path(repo)
            .ok_or_else(|| VfsError::NotFound(shown.to_string()))?;
        let path = normalize_lexically(root.join(relative));
        if !path.exists() {
            return Err(VfsError::NotFound(shown.to_string()));
        }
        if !is_within_directory(&path, root) {
            return Err(VfsError::InvalidPath(format!(
                "{} leaves repository {}",
                shown,
                root.display()
            )));
        }
        Ok(Location::Real { repo, path })
    }

    /// Where `raw` points from the current position. In real mode, relative
    /// paths are resolved on disk; leaving the repository root lands on
    /// `/repos`.
    fn target(&self, raw: &str) -> Result<Location> {
        if let Location::Real { repo, path } = &self.cwd {
            if !raw.trim().starts_with('/') {
                let root = self
                    .vfs
                    .real_path(*repo)
                    .ok_or_else(|| VfsError::NotFound(raw.to_string()))?;
                let joined = normalize_lexically(path.join(raw.trim()));
                if !is_within_directory(&joined, root) {
                    log_vfs_debug!("Left repository root", root = %root.display());
                    return Ok(Location::Vfs(format!("/{}", REPOS_ROOT)));
                }
                if !joined.exists() {
                    return Err(VfsError::NotFound(self.real_to_vfs(*repo, &joined)));
                }
                return Ok(Location::Real {
                    repo: *repo,
                    path: joined,
                });
            }
        }
        self.locate(raw)
    }

    /// Change the working directory.
    pub fn cd(&mut self, raw: &str) -> Result<&Location> {
        let target = self.target(raw)?;
        match &target {
            Location::Vfs(path) => {
                let node = self.get_node(path)?;
                if !node.is_dir() {
                    return Err(VfsError::NotADirectory(path.clone()));
                }
            }
            Location::Real { repo, path } => {
                if !path.is_dir() {
                    return Err(VfsError::NotADirectory(self.real_to_vfs(*repo, path)));
                }
            }
        }
        self.cwd = target;
        Ok(&self.cwd)
    }

    /// List a directory: VFS children, or real directory entries inside a
    /// repository. Entries are sorted by name.
    pub fn list(&self, raw: &str) -> Result<Vec<VfsEntry>> {
        match self.target(raw)? {
            Location::Vfs(path) => {
                let node = self.get_node(&path)?;
                let children = node
                    .children()
                    .ok_or_else(|| VfsError::NotADirectory(path.clone()))?;
                Ok(children
                    .iter()
                    .map(|(name, child)| VfsEntry {
                        name: name.clone(),
                        kind: child.kind(),
                    })
                    .collect())
            }
            Location::Real { repo, path } => {
                if !path.is_dir() {
                    return Err(VfsError::NotADirectory(self.real_to_vfs(repo, &path)));
                }
                let mut entries = Vec::new();
                for entry in fs::read_dir(&path)? {
                    let entry = entry?;
                    let file_type = entry.file_type()?;
                    let kind = if file_type.is_symlink() {
                        EntryKind::Symlink
                    } else if file_type.is_dir() {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    };
                    entries.push(VfsEntry {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        kind,
                    });
                }
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(entries)
            }
        }
    }
}
