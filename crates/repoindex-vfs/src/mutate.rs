//! Shell-style tag mutation under `/by-tag`.
//!
//! `cp`, `mv` and `rm` translate VFS paths back into tags and edit the
//! explicit tag store. The snapshot itself is never modified; callers save
//! the store and rebuild to see the result.
//!
//! Path → tag conversion is the inverse of the `by-tag` layout only for
//! keys it recognises: a first segment found in [`KNOWN_TAG_KEYS`] (or the
//! configured extra keys) yields `key:rest/of/path`, anything else is read
//! back as a bare `a/b/c` hierarchy.

use repoindex_config::log_vfs_info;

use crate::node::VfsNode;
use crate::repo::RepoId;
use crate::resolver::PathResolver;
use crate::store::TagStore;
use crate::tag::is_protected_tag;
use crate::{Result, VfsError, BY_TAG_ROOT, REPOS_BUCKET};

/// Classification keys recognised when reading a `/by-tag` path as a tag
pub const KNOWN_TAG_KEYS: &[&str] = &[
    "repo",
    "dir",
    "lang",
    "topic",
    "status",
    "license",
    "org",
    "owner",
    "type",
    "has",
    "ci",
    "visibility",
    "fork",
    "archived",
    "stars",
    "project",
    "stage",
];

pub struct TagMutator<'r, 'v> {
    resolver: &'r PathResolver<'v>,
    store: &'r mut dyn TagStore,
    extra_keys: Vec<String>,
}

impl<'r, 'v> TagMutator<'r, 'v> {
    pub fn new(resolver: &'r PathResolver<'v>, store: &'r mut dyn TagStore) -> Self {
        Self {
            resolver,
            store,
            extra_keys: Vec::new(),
        }
    }

    /// Recognise additional tag keys in `/by-tag` paths
    pub fn with_extra_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    fn is_known_key(&self, key: &str) -> bool {
        KNOWN_TAG_KEYS.contains(&key) || self.extra_keys.iter().any(|k| k == key)
    }

    /// Segments below `/by-tag` of an absolute VFS path. Errors when the
    /// path is outside `/by-tag`.
    fn tag_segments(&self, path: &str) -> Result<Vec<String>> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        if segments.next() != Some(BY_TAG_ROOT) {
            return Err(VfsError::NotMutable(path.to_string()));
        }
        Ok(segments.map(str::to_string).collect())
    }

    /// Tag for the directory `segments` name. Only a trailing bucket is
    /// dropped; a bucket anywhere else is a reserved name.
    fn segments_to_tag(&self, segments: &[String], shown: &str) -> Result<String> {
        let segments = match segments.split_last() {
            Some((last, parent)) if last == REPOS_BUCKET => parent,
            _ => segments,
        };
        if segments.iter().any(|s| s == REPOS_BUCKET) {
            return Err(VfsError::InvalidPath(format!(
                "{}: '{}' is reserved for repository entries",
                shown, REPOS_BUCKET
            )));
        }
        let Some((first, rest)) = segments.split_first() else {
            return Err(VfsError::InvalidPath(format!("{} names no tag", shown)));
        };
        if self.is_known_key(first) && !rest.is_empty() {
            Ok(format!("{}:{}", first, rest.join("/")))
        } else {
            Ok(segments.join("/"))
        }
    }

    /// The tag a `/by-tag` directory path stands for.
    pub fn path_to_tag(&self, raw: &str) -> Result<String> {
        let path = self.resolver.resolve(raw)?;
        let segments = self.tag_segments(&path)?;
        self.segments_to_tag(&segments, &path)
    }

    /// Repository referenced by the node at `raw`
    fn repo_at(&self, raw: &str) -> Result<RepoId> {
        let node = self.resolver.get_node(raw)?;
        node.repo_id()
            .ok_or_else(|| VfsError::InvalidPath(format!("{} is not a repository", raw)))
    }

    /// The tag implied by a repository entry inside `/by-tag`, i.e. by its
    /// parent directory.
    fn entry_tag(&self, raw: &str) -> Result<(RepoId, String)> {
        let path = self.resolver.resolve(raw)?;
        let mut segments = self.tag_segments(&path)?;
        let repo = match self.resolver.get_node(&path)? {
            VfsNode::Symlink { repo, .. } => *repo,
            _ => {
                return Err(VfsError::InvalidPath(format!(
                    "{} is not a repository entry",
                    path
                )))
            }
        };
        segments.pop();
        let tag = self.segments_to_tag(&segments, &path)?;
        Ok((repo, tag))
    }

    /// Tag named by a destination path. A trailing segment equal to the
    /// repository's name is dropped unless it is an existing directory.
    fn destination_tag(&self, raw: &str, repo: RepoId) -> Result<String> {
        let path = self.resolver.resolve(raw)?;
        let mut segments = self.tag_segments(&path)?;
        let repo_name = self
            .resolver
            .vfs()
            .repos()
            .get(repo)
            .map(|e| e.vfs_name.as_str());
        let is_dir = self
            .resolver
            .get_node(&path)
            .map(VfsNode::is_dir)
            .unwrap_or(false);
        if !is_dir && segments.last().map(String::as_str) == repo_name {
            segments.pop();
        }
        self.segments_to_tag(&segments, &path)
    }

    fn explicit(&self, repo: RepoId) -> Result<(std::path::PathBuf, Vec<String>)> {
        let path = self
            .resolver
            .vfs()
            .real_path(repo)
            .ok_or_else(|| VfsError::NotFound(format!("repository #{:?}", repo)))?
            .to_path_buf();
        let tags = self.store.get(&path);
        Ok((path, tags))
    }

    fn ensure_unprotected(tag: &str) -> Result<()> {
        if is_protected_tag(tag) {
            return Err(VfsError::ProtectedTag(tag.to_string()));
        }
        Ok(())
    }

    /// Assign the tag named by `dst` to the repository at `src`.
    /// Assigning a tag the repository already has is a no-op.
    pub fn cp(&mut self, src: &str, dst: &str) -> Result<String> {
        let repo = self.repo_at(src)?;
        let tag = self.destination_tag(dst, repo)?;
        Self::ensure_unprotected(&tag)?;

        let (path, mut tags) = self.explicit(repo)?;
        if !tags.contains(&tag) {
            tags.push(tag.clone());
            self.store.set(&path, tags);
            log_vfs_info!("Tag assigned", tag = %tag, repo = %path.display());
        }
        Ok(tag)
    }

    /// Replace the tag implied by `src` with the one named by `dst`.
    /// Returns `(removed, added)`.
    pub fn mv(&mut self, src: &str, dst: &str) -> Result<(String, String)> {
        let (repo, old_tag) = self.entry_tag(src)?;
        let new_tag = self.destination_tag(dst, repo)?;
        Self::ensure_unprotected(&old_tag)?;
        Self::ensure_unprotected(&new_tag)?;

        let (path, mut tags) = self.explicit(repo)?;
        if !tags.contains(&old_tag) {
            return Err(VfsError::NotAssigned { tag: old_tag, repo: path });
        }
        tags.retain(|t| *t != old_tag);
        if !tags.contains(&new_tag) {
            tags.push(new_tag.clone());
        }
        self.store.set(&path, tags);
        log_vfs_info!("Tag moved", from = %old_tag, to = %new_tag, repo = %path.display());
        Ok((old_tag, new_tag))
    }

    /// Remove the tag implied by a repository entry under `/by-tag`.
    pub fn rm(&mut self, raw: &str) -> Result<String> {
        let (repo, tag) = self.entry_tag(raw)?;
        Self::ensure_unprotected(&tag)?;

        let (path, mut tags) = self.explicit(repo)?;
        if !tags.contains(&tag) {
            return Err(VfsError::NotAssigned { tag, repo: path });
        }
        tags.retain(|t| *t != tag);
        self.store.set(&path, tags);
        log_vfs_info!("Tag removed", tag = %tag, repo = %path.display());
        Ok(tag)
    }

    /// Validate a new `/by-tag` directory and return its tag. Nothing is
    /// written: a tag directory only exists once a repository carries it.
    pub fn mkdir(&self, raw: &str) -> Result<String> {
        let tag = self.path_to_tag(raw)?;
        Self::ensure_unprotected(&tag)?;
        Ok(tag)
    }
}
