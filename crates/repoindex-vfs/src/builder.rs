//! Snapshot builder.
//!
//! Builds the whole tree from the repository list, the explicit tag store
//! and the implicit tag deriver. Nothing is patched incrementally: every
//! VFS-touching operation starts from a fresh [`Vfs`].
//!
//! Under `/by-tag` a directory may hold repository entries and sub-tag
//! directories side by side. When a repository name clashes with a sub-tag
//! directory at the same node, the repository entry lives in a
//! [`REPOS_BUCKET`] directory of that node instead. This applies both ways:
//! an entry inserted first is moved into the bucket when the directory
//! arrives later.

use std::collections::HashMap;
use std::path::Path;

use repoindex_config::log_vfs_debug;

use crate::implicit::ImplicitTags;
use crate::node::{Children, VfsNode};
use crate::repo::{RepoId, RepoTable, Repository};
use crate::store::TagStore;
use crate::tag::parse_hierarchical_levels;
use crate::{
    BY_LANGUAGE_ROOT, BY_STATUS_ROOT, BY_TAG_ROOT, CONFIG_ROOT, REPOS_BUCKET, REPOS_ROOT,
};

/// Directory used for repositories without a known language
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Everything a build needs, passed explicitly.
pub struct VfsContext<'a> {
    pub repos: &'a [Repository],
    pub store: &'a dyn TagStore,
    pub implicit: &'a dyn ImplicitTags,
}

/// Effective tags of a repository: explicit ones first, then implicit ones
/// not already present.
pub fn effective_tags(
    repo: &Repository,
    store: &dyn TagStore,
    implicit: &dyn ImplicitTags,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in store.get(&repo.path).into_iter().chain(implicit.derive(repo)) {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub struct VfsBuilder<'a> {
    ctx: VfsContext<'a>,
    config_values: Vec<(String, String)>,
}

impl<'a> VfsBuilder<'a> {
    pub fn new(ctx: VfsContext<'a>) -> Self {
        Self {
            ctx,
            config_values: Vec::new(),
        }
    }

    /// Expose `(key, value)` pairs under `/config`
    pub fn with_config_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config_values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Build a fresh snapshot. Deterministic for fixed inputs.
    pub fn build(&self) -> Vfs {
        let mut table = RepoTable::new();
        let mut tags = HashMap::new();
        let mut repos_dir = Children::new();
        let mut by_language = Children::new();
        let mut by_status = Children::new();
        let mut by_tag = Children::new();
        let mut tag_links = 0usize;

        for repo in self.ctx.repos {
            let id = table.insert(repo.clone());
            if tags.contains_key(&id) {
                continue;
            }
            let Some(entry) = table.get(id) else { continue };
            let name = entry.vfs_name.clone();
            let link = VfsNode::Symlink {
                target: format!("/{}/{}", REPOS_ROOT, name),
                repo: id,
            };

            repos_dir.insert(name.clone(), VfsNode::Repository(id));

            let language = repo
                .attributes
                .language
                .as_deref()
                .map(segment_name)
                .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
            by_language
                .entry(language)
                .or_insert_with(VfsNode::empty_dir)
                .make_dir()
                .insert(name.clone(), link.clone());

            if let Some(dirty) = repo.attributes.dirty {
                let status = if dirty { "dirty" } else { "clean" };
                by_status
                    .entry(status.to_string())
                    .or_insert_with(VfsNode::empty_dir)
                    .make_dir()
                    .insert(name.clone(), link.clone());
            }

            let effective = effective_tags(repo, self.ctx.store, self.ctx.implicit);
            for tag in &effective {
                let levels = parse_hierarchical_levels(tag);
                if levels.is_empty() || levels.iter().any(|l| !is_valid_level(l)) {
                    log_vfs_debug!("Skipping unplaceable tag", tag = %tag, repo = %name);
                    continue;
                }
                insert_tag_link(&mut by_tag, &levels, &name, link.clone());
                tag_links += 1;
            }
            tags.insert(id, effective);
        }

        let mut root = Children::new();
        root.insert(REPOS_ROOT.to_string(), VfsNode::Directory(repos_dir));
        root.insert(BY_LANGUAGE_ROOT.to_string(), VfsNode::Directory(by_language));
        root.insert(BY_STATUS_ROOT.to_string(), VfsNode::Directory(by_status));
        root.insert(BY_TAG_ROOT.to_string(), VfsNode::Directory(by_tag));
        if !self.config_values.is_empty() {
            let config = self
                .config_values
                .iter()
                .map(|(k, v)| (segment_name(k), VfsNode::ConfigValue(v.clone())))
                .collect();
            root.insert(CONFIG_ROOT.to_string(), VfsNode::Directory(config));
        }

        log_vfs_debug!("Snapshot built", repos = table.len(), tag_links = tag_links);

        Vfs {
            root: VfsNode::Directory(root),
            repos: table,
            tags,
        }
    }
}

/// Insert `link` as `name` below the `levels` path of `by_tag`.
fn insert_tag_link(by_tag: &mut Children, levels: &[String], name: &str, link: VfsNode) {
    let mut dir = by_tag;
    for level in levels {
        dir = descend(dir, level);
    }

    if dir.get(name).is_some_and(VfsNode::is_dir) {
        bucket(dir).insert(name.to_string(), link);
    } else {
        dir.insert(name.to_string(), link);
    }
}

/// Step into the `level` sub-directory, creating it on demand. A repository
/// entry occupying that name moves into the bucket first.
fn descend<'m>(dir: &'m mut Children, level: &str) -> &'m mut Children {
    if dir.get(level).is_some_and(|node| !node.is_dir()) {
        if let Some(displaced) = dir.remove(level) {
            bucket(dir).insert(level.to_string(), displaced);
        }
    }
    dir.entry(level.to_string())
        .or_insert_with(VfsNode::empty_dir)
        .make_dir()
}

fn bucket(dir: &mut Children) -> &mut Children {
    dir.entry(REPOS_BUCKET.to_string())
        .or_insert_with(VfsNode::empty_dir)
        .make_dir()
}

fn is_valid_level(level: &str) -> bool {
    !level.is_empty() && level != "." && level != ".."
}

/// A single VFS path segment: `/` cannot appear inside a name
fn segment_name(raw: &str) -> String {
    raw.replace('/', "_")
}

/// An immutable VFS snapshot.
#[derive(Debug, Clone)]
pub struct Vfs {
    root: VfsNode,
    repos: RepoTable,
    tags: HashMap<RepoId, Vec<String>>,
}

impl Vfs {
    pub fn root(&self) -> &VfsNode {
        &self.root
    }

    pub fn repos(&self) -> &RepoTable {
        &self.repos
    }

    /// Real on-disk path backing a repository
    pub fn real_path(&self, id: RepoId) -> Option<&Path> {
        self.repos.get(id).map(|entry| entry.key.as_path())
    }

    /// Effective (explicit ∪ implicit) tags computed during the build
    pub fn effective_tags(&self, id: RepoId) -> &[String] {
        self.tags.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Walk `segments` from the root without following symlinks
    pub fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> Option<&VfsNode> {
        segments.iter().try_fold(&self.root, |node, segment| {
            node.children()?.get(segment.as_ref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implicit::DefaultImplicitTags;
    use crate::repo::RepoAttributes;
    use crate::store::MemoryTagStore;

    fn build(repos: &[Repository], store: &MemoryTagStore) -> Vfs {
        VfsBuilder::new(VfsContext {
            repos,
            store,
            implicit: &DefaultImplicitTags,
        })
        .build()
    }

    fn backing(vfs: &Vfs, path: &[&str]) -> Option<RepoId> {
        vfs.lookup(path).and_then(VfsNode::repo_id)
    }

    #[test]
    fn test_tags_create_hierarchical_links() {
        let repos = [Repository::new("/nonexistent/src/p1", "p1")];
        let store = MemoryTagStore::new().with("/nonexistent/src/p1", &["topic:ml", "work/active"]);
        let vfs = build(&repos, &store);

        let a = backing(&vfs, &["by-tag", "topic", "ml", "p1"]);
        let b = backing(&vfs, &["by-tag", "work", "active", "p1"]);
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(backing(&vfs, &["repos", "p1"]), a);
        assert_eq!(
            vfs.real_path(a.unwrap()),
            Some(Path::new("/nonexistent/src/p1"))
        );
    }

    #[test]
    fn test_repo_without_metadata_is_kept() {
        let repos = [Repository::new("/nonexistent/work/bare", "bare")];
        let vfs = build(&repos, &MemoryTagStore::new());

        assert!(vfs.lookup(&["repos", "bare"]).is_some());
        assert!(vfs.lookup(&["by-tag", "repo", "bare", "bare"]).is_some());
        assert!(vfs.lookup(&["by-tag", "dir", "work", "bare"]).is_some());
        assert!(vfs.lookup(&["by-language", "Unknown", "bare"]).is_some());
        assert_eq!(
            vfs.lookup(&["by-status"]).and_then(VfsNode::children).map(|c| c.len()),
            Some(0)
        );
    }

    #[test]
    fn test_language_and_status_roots() {
        let attrs = RepoAttributes {
            language: Some("Python".into()),
            dirty: Some(false),
            ..Default::default()
        };
        let repos = [Repository::new("/nonexistent/p1", "p1").with_attributes(attrs)];
        let vfs = build(&repos, &MemoryTagStore::new());

        match vfs.lookup(&["by-language", "Python", "p1"]) {
            Some(VfsNode::Symlink { target, .. }) => assert_eq!(target, "/repos/p1"),
            other => panic!("expected symlink, got {:?}", other),
        }
        assert!(vfs.lookup(&["by-status", "clean", "p1"]).is_some());
    }

    #[test]
    fn test_leaf_and_subtag_coexist() {
        // `p1` sits directly at work/, `p2` needs work/ to also hold active/
        let repos = [
            Repository::new("/nonexistent/p1", "p1"),
            Repository::new("/nonexistent/p2", "p2"),
        ];
        let store = MemoryTagStore::new()
            .with("/nonexistent/p1", &["work"])
            .with("/nonexistent/p2", &["work/active"]);
        let vfs = build(&repos, &store);

        assert!(vfs.lookup(&["by-tag", "work", "p1"]).is_some());
        assert!(vfs.lookup(&["by-tag", "work", "active", "p2"]).is_some());
    }

    #[test]
    fn test_name_clash_moves_entry_into_bucket() {
        // Repository named `active` at work/, then a sub-tag directory work/active/
        let repos = [
            Repository::new("/nonexistent/active", "active"),
            Repository::new("/nonexistent/p2", "p2"),
        ];
        let store = MemoryTagStore::new()
            .with("/nonexistent/active", &["work"])
            .with("/nonexistent/p2", &["work/active"]);
        let vfs = build(&repos, &store);

        assert!(vfs.lookup(&["by-tag", "work", "active"]).is_some_and(VfsNode::is_dir));
        assert!(vfs.lookup(&["by-tag", "work", "active", "p2"]).is_some());
        assert!(matches!(
            vfs.lookup(&["by-tag", "work", "_repos", "active"]),
            Some(VfsNode::Symlink { .. })
        ));
    }

    #[test]
    fn test_name_clash_when_directory_comes_first() {
        let repos = [
            Repository::new("/nonexistent/p2", "p2"),
            Repository::new("/nonexistent/active", "active"),
        ];
        let store = MemoryTagStore::new()
            .with("/nonexistent/p2", &["work/active"])
            .with("/nonexistent/active", &["work"]);
        let vfs = build(&repos, &store);

        assert!(vfs.lookup(&["by-tag", "work", "active", "p2"]).is_some());
        assert!(vfs.lookup(&["by-tag", "work", "_repos", "active"]).is_some());
    }

    #[test]
    fn test_build_is_deterministic() {
        let repos = [
            Repository::new("/nonexistent/b", "b"),
            Repository::new("/nonexistent/a", "a"),
        ];
        let store = MemoryTagStore::new()
            .with("/nonexistent/a", &["topic:x"])
            .with("/nonexistent/b", &["topic:x/y"]);
        let first = build(&repos, &store);
        let second = build(&repos, &store);
        assert_eq!(first.root(), second.root());
    }

    #[test]
    fn test_config_values_root() {
        let repos: [Repository; 0] = [];
        let store = MemoryTagStore::new();
        let vfs = VfsBuilder::new(VfsContext {
            repos: &repos,
            store: &store,
            implicit: &DefaultImplicitTags,
        })
        .with_config_values([("tree.root", "/srv/tree")])
        .build();

        assert_eq!(
            vfs.lookup(&["config", "tree.root"]),
            Some(&VfsNode::ConfigValue("/srv/tree".into()))
        );
    }
}
