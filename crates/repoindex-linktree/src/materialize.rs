//! Materializing a classification onto disk as symlinks.
//!
//! Repositories are processed strictly in input order. Every destination
//! decided during a run is claimed in memory before the next one is
//! considered, so the first repository in order always gets the unsuffixed
//! name, and a dry run reaches exactly the same decisions as a real run.
//!
//! Directories win over links: every directory any repository in the batch
//! needs is planned before the first link is placed, and a link whose name
//! matches a planned directory goes through the collision strategy. The
//! outcome is the same whichever repository comes first.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::Datelike;

use repoindex_config::path::normalize_or_original;
use repoindex_config::{log_tree_debug, log_tree_info, log_tree_warn};
use repoindex_vfs::builder::{effective_tags, UNKNOWN_LANGUAGE};
use repoindex_vfs::tag::parse_hierarchical_levels;
use repoindex_vfs::{ImplicitTags, Repository, TagStore};

use crate::manifest::TreeManifest;
use crate::sanitize::sanitize_segment;
use crate::{
    CollisionStrategy, LinkAction, LinkDetail, LinkFailure, LinkTreeError, OrganizeBy, Result,
    TreeOptions, TreeResult,
};

/// Directory for repositories whose year or owner is not known
pub const UNKNOWN_SEGMENT: &str = "unknown";

/// State of a candidate destination
#[derive(Debug, PartialEq, Eq)]
enum Slot {
    Free,
    /// Already a link to this repository
    Same,
    /// A symlink whose target is gone
    Broken,
    /// Claimed by another repository, or occupied on disk
    Taken,
}

/// Per-run bookkeeping
#[derive(Default)]
struct Run {
    /// destination -> canonical source
    claimed: HashMap<PathBuf, PathBuf>,
    /// Directories created (or, in a dry run, that would be created)
    dirs: HashSet<PathBuf>,
    /// Every directory some repository in the batch is linked from
    planned: HashSet<PathBuf>,
    result: TreeResult,
}

pub struct LinkTreeMaterializer<'a> {
    store: &'a dyn TagStore,
    implicit: &'a dyn ImplicitTags,
}

impl<'a> LinkTreeMaterializer<'a> {
    pub fn new(store: &'a dyn TagStore, implicit: &'a dyn ImplicitTags) -> Self {
        Self { store, implicit }
    }

    /// Directories (relative to the tree root, as segments) a repository is
    /// linked from, truncated to `max_depth` and de-duplicated.
    pub fn target_dirs(
        &self,
        repo: &Repository,
        organize_by: OrganizeBy,
        max_depth: usize,
    ) -> Vec<Vec<String>> {
        let attrs = &repo.attributes;
        let raw: Vec<Vec<String>> = match organize_by {
            OrganizeBy::Tag => effective_tags(repo, self.store, self.implicit)
                .iter()
                .map(|tag| parse_hierarchical_levels(tag))
                .filter(|levels| !levels.is_empty())
                .collect(),
            OrganizeBy::Language => vec![vec![attrs
                .language
                .clone()
                .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())]],
            OrganizeBy::CreatedYear => vec![vec![year_segment(attrs.created)]],
            OrganizeBy::ModifiedYear => vec![vec![year_segment(attrs.modified)]],
            OrganizeBy::Owner => vec![vec![attrs
                .remote
                .as_ref()
                .and_then(|r| r.owner.clone())
                .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string())]],
        };

        let mut dirs: Vec<Vec<String>> = Vec::with_capacity(raw.len());
        for levels in raw {
            let dir: Vec<String> = levels
                .iter()
                .take(max_depth)
                .map(|l| sanitize_segment(l))
                .collect();
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Materialize `repos` under `opts.root`.
    ///
    /// Per-link failures are collected in the result and never stop the
    /// batch. Failing to create the tree root or to write the manifest is
    /// fatal. The manifest is only written by a real run without errors.
    pub fn create_tree(&self, repos: &[Repository], opts: &TreeOptions) -> Result<TreeResult> {
        let mut run = Run::default();

        if fs::symlink_metadata(&opts.root).is_err() {
            if !opts.dry_run {
                fs::create_dir_all(&opts.root)?;
            }
            run.dirs.insert(opts.root.clone());
            run.result.dirs_created += 1;
        }

        let mut plan = Vec::with_capacity(repos.len());
        for repo in repos {
            let source = normalize_or_original(&repo.path);
            if !source.exists() {
                plan.push((repo, source, None));
                continue;
            }
            let dirs = self.target_dirs(repo, opts.organize_by, opts.max_depth);
            for dir in &dirs {
                let mut current = opts.root.clone();
                for segment in dir {
                    current.push(segment);
                    run.planned.insert(current.clone());
                }
            }
            plan.push((repo, source, Some(dirs)));
        }

        for (repo, source, dirs) in plan {
            let Some(dirs) = dirs else {
                let err = LinkTreeError::SourceMissing(repo.path.clone());
                log_tree_warn!("Skipping repository", repo = %repo.name, error = %err);
                run.result.errors.push(LinkFailure {
                    repo: repo.path.clone(),
                    destination: opts.root.clone(),
                    message: err.to_string(),
                });
                continue;
            };

            let name = sanitize_segment(&repo.name);
            for dir in dirs {
                if let Err(err) = self.place(&mut run, repo, &source, &dir, &name, opts) {
                    let destination = dir
                        .iter()
                        .fold(opts.root.clone(), |path, seg| path.join(seg))
                        .join(&name);
                    log_tree_warn!("Link failed", dest = %destination.display(), error = %err);
                    run.result.errors.push(LinkFailure {
                        repo: repo.path.clone(),
                        destination,
                        message: err.to_string(),
                    });
                }
            }
        }

        let result = run.result;
        if !opts.dry_run && result.is_success() {
            TreeManifest::new(opts.organize_by, repos.len()).save(&opts.root)?;
        }

        log_tree_info!(
            "Tree materialized",
            root = %opts.root.display(),
            created = result.links_created,
            updated = result.links_updated,
            skipped = result.links_skipped,
            errors = result.errors.len(),
            dry_run = opts.dry_run
        );
        Ok(result)
    }

    fn place(
        &self,
        run: &mut Run,
        repo: &Repository,
        source: &Path,
        dir: &[String],
        name: &str,
        opts: &TreeOptions,
    ) -> Result<()> {
        let parent = ensure_dir(run, &opts.root, dir, opts.dry_run)?;
        let dest = parent.join(name);

        let (dest, slot, renamed) = match inspect(run, &dest, source)? {
            Slot::Taken => match opts.collision {
                CollisionStrategy::Skip => {
                    log_tree_debug!("Destination taken, skipping", dest = %dest.display(), repo = %repo.name);
                    run.result.links_skipped += 1;
                    record(run, repo, source, dest, LinkAction::Skipped);
                    return Ok(());
                }
                CollisionStrategy::Rename => {
                    let (candidate, slot) =
                        find_free_name(run, &parent, name, source, opts.max_rename_attempts)
                            .ok_or_else(|| LinkTreeError::CollisionExhausted {
                                dest: dest.clone(),
                                attempts: opts.max_rename_attempts,
                            })??;
                    (candidate, slot, true)
                }
            },
            slot => (dest, slot, false),
        };

        run.claimed.insert(dest.clone(), source.to_path_buf());
        let action = match slot {
            Slot::Same => LinkAction::Unchanged,
            Slot::Broken => {
                if !opts.dry_run {
                    fs::remove_file(&dest)?;
                    make_link(source, &dest)?;
                }
                run.result.links_updated += 1;
                LinkAction::Updated
            }
            Slot::Free => {
                if !opts.dry_run {
                    make_link(source, &dest)?;
                }
                run.result.links_created += 1;
                if renamed {
                    LinkAction::Renamed
                } else {
                    LinkAction::Created
                }
            }
            Slot::Taken => unreachable!("taken destinations are resolved above"),
        };
        log_tree_debug!("Link placed", dest = %dest.display(), repo = %repo.name, action = ?action);
        record(run, repo, source, dest, action);
        Ok(())
    }
}

fn record(run: &mut Run, repo: &Repository, source: &Path, destination: PathBuf, action: LinkAction) {
    run.result.details.push(LinkDetail {
        repo: repo.name.clone(),
        source: source.to_path_buf(),
        destination,
        action,
    });
}

fn year_segment(date: Option<chrono::DateTime<chrono::Utc>>) -> String {
    date.map(|d| format!("{:04}", d.year()))
        .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string())
}

/// Create (or, in a dry run, pretend to create) `root/dir`. A path
/// component that is a link or a file is never descended into.
fn ensure_dir(run: &mut Run, root: &Path, dir: &[String], dry_run: bool) -> Result<PathBuf> {
    let mut current = root.to_path_buf();
    for segment in dir {
        current.push(segment);
        if run.claimed.contains_key(&current) {
            return Err(LinkTreeError::DestinationOccupied(current));
        }
        if run.dirs.contains(&current) {
            continue;
        }
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(LinkTreeError::DestinationOccupied(current)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !dry_run {
                    fs::create_dir(&current)?;
                }
                run.dirs.insert(current.clone());
                run.result.dirs_created += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(current)
}

/// Classify `dest` against this run's claims and the disk
fn inspect(run: &Run, dest: &Path, source: &Path) -> Result<Slot> {
    if let Some(owner) = run.claimed.get(dest) {
        return Ok(if owner == source { Slot::Same } else { Slot::Taken });
    }
    if run.dirs.contains(dest) || run.planned.contains(dest) {
        return Ok(Slot::Taken);
    }
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let mut target = fs::read_link(dest)?;
            if target.is_relative() {
                if let Some(parent) = dest.parent() {
                    target = parent.join(target);
                }
            }
            if normalize_or_original(&target) == source {
                Ok(Slot::Same)
            } else if !dest.exists() {
                Ok(Slot::Broken)
            } else {
                Ok(Slot::Taken)
            }
        }
        Ok(_) => Ok(Slot::Taken),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Slot::Free),
        Err(e) => Err(e.into()),
    }
}

/// Bounded search for `name-1`, `name-2`, ... that is free, already ours,
/// or a broken link. `None` when every attempt is taken.
fn find_free_name(
    run: &Run,
    parent: &Path,
    name: &str,
    source: &Path,
    max_attempts: usize,
) -> Option<Result<(PathBuf, Slot)>> {
    for attempt in 1..=max_attempts {
        let candidate = parent.join(format!("{}-{}", name, attempt));
        match inspect(run, &candidate, source) {
            Ok(Slot::Taken) => continue,
            Ok(slot) => return Some(Ok((candidate, slot))),
            Err(e) => return Some(Err(e)),
        }
    }
    None
}

#[cfg(unix)]
fn make_link(source: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn make_link(source: &Path, dest: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(source, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use repoindex_vfs::{DefaultImplicitTags, MemoryTagStore, RemoteInfo, RepoAttributes};
    use tempfile::TempDir;

    fn python_repo(path: &Path) -> Repository {
        std::fs::create_dir_all(path).unwrap();
        Repository::from_path(path).with_attributes(RepoAttributes {
            language: Some("Python".into()),
            ..Default::default()
        })
    }

    fn language_opts(root: &Path) -> TreeOptions {
        TreeOptions {
            organize_by: OrganizeBy::Language,
            ..TreeOptions::new(root)
        }
    }

    #[test]
    fn test_target_dirs_by_tag_truncates_and_dedups() {
        let store = MemoryTagStore::new().with("/src/p1", &["topic:ml/nlp", "topic:ml/cv"]);
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);
        let repo = Repository::from_path("/src/p1");

        let dirs = materializer.target_dirs(&repo, OrganizeBy::Tag, 2);
        assert_eq!(
            dirs,
            vec![
                vec!["topic".to_string(), "ml".to_string()],
                vec!["repo".to_string(), "p1".to_string()],
                vec!["dir".to_string(), "src".to_string()],
            ]
        );
        assert_eq!(materializer.target_dirs(&repo, OrganizeBy::Tag, 0), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_target_dirs_years_and_owner() {
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);
        let repo = Repository::from_path("/src/p1").with_attributes(RepoAttributes {
            created: Some(Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap()),
            remote: Some(RemoteInfo {
                host: "github.com".into(),
                owner: Some("octo".into()),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(materializer.target_dirs(&repo, OrganizeBy::CreatedYear, 2), vec![vec!["2021"]]);
        assert_eq!(materializer.target_dirs(&repo, OrganizeBy::ModifiedYear, 2), vec![vec!["unknown"]]);
        assert_eq!(materializer.target_dirs(&repo, OrganizeBy::Owner, 2), vec![vec!["octo"]]);
        assert_eq!(materializer.target_dirs(&repo, OrganizeBy::Language, 2), vec![vec!["Unknown"]]);
    }

    #[test]
    fn test_collision_rename() {
        let temp = TempDir::new().unwrap();
        let a = python_repo(&temp.path().join("a/utils"));
        let b = python_repo(&temp.path().join("b/utils"));
        let root = temp.path().join("tree");
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);

        let result = materializer
            .create_tree(&[a.clone(), b.clone()], &language_opts(&root))
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.links_created, 2);
        assert_eq!(result.details[1].action, LinkAction::Renamed);

        let first = std::fs::read_link(root.join("Python/utils")).unwrap();
        let second = std::fs::read_link(root.join("Python/utils-1")).unwrap();
        assert_eq!(first, a.path.canonicalize().unwrap());
        assert_eq!(second, b.path.canonicalize().unwrap());
        assert!(root.join(crate::MANIFEST_FILE).exists());
    }

    #[test]
    fn test_collision_skip() {
        let temp = TempDir::new().unwrap();
        let a = python_repo(&temp.path().join("a/utils"));
        let b = python_repo(&temp.path().join("b/utils"));
        let root = temp.path().join("tree");
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);

        let opts = TreeOptions {
            collision: CollisionStrategy::Skip,
            ..language_opts(&root)
        };
        let result = materializer.create_tree(&[a, b], &opts).unwrap();
        assert_eq!(result.links_created, 1);
        assert_eq!(result.links_skipped, 1);
        assert!(result.errors.is_empty());
        assert!(root.join("Python/utils").exists());
        assert!(!root.join("Python/utils-1").exists());
    }

    #[test]
    fn test_rename_attempts_are_bounded() {
        let temp = TempDir::new().unwrap();
        let repos: Vec<_> = (0..4)
            .map(|i| python_repo(&temp.path().join(format!("{}/utils", i))))
            .collect();
        let root = temp.path().join("tree");
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);

        let opts = TreeOptions {
            max_rename_attempts: 2,
            ..language_opts(&root)
        };
        let result = materializer.create_tree(&repos, &opts).unwrap();
        assert_eq!(result.links_created, 3);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("after 2 attempts"));
        // A failed batch leaves no manifest
        assert!(!root.join(crate::MANIFEST_FILE).exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let a = python_repo(&temp.path().join("a/utils"));
        let b = python_repo(&temp.path().join("b/utils"));
        let root = temp.path().join("tree");
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);

        let opts = TreeOptions {
            dry_run: true,
            ..language_opts(&root)
        };
        let result = materializer.create_tree(&[a, b], &opts).unwrap();
        assert_eq!(result.links_created, 2);
        assert_eq!(result.dirs_created, 2);
        assert_eq!(result.details[1].destination, root.join("Python/utils-1"));
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_source_recorded() {
        let temp = TempDir::new().unwrap();
        let good = python_repo(&temp.path().join("good"));
        let missing = Repository::from_path(temp.path().join("gone"));
        let root = temp.path().join("tree");
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);

        let result = materializer
            .create_tree(&[missing, good], &language_opts(&root))
            .unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.links_created, 1);
        assert!(root.join("Python/good").exists());
    }

    #[test]
    fn test_broken_link_is_replaced() {
        let temp = TempDir::new().unwrap();
        let a = python_repo(&temp.path().join("a/utils"));
        let root = temp.path().join("tree");
        std::fs::create_dir_all(root.join("Python")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("vanished"), root.join("Python/utils")).unwrap();

        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);
        let result = materializer.create_tree(&[a.clone()], &language_opts(&root)).unwrap();

        assert_eq!(result.links_updated, 1);
        assert_eq!(result.links_created, 0);
        assert_eq!(
            std::fs::read_link(root.join("Python/utils")).unwrap(),
            a.path.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_regular_file_at_destination_collides() {
        let temp = TempDir::new().unwrap();
        let a = python_repo(&temp.path().join("a/utils"));
        let root = temp.path().join("tree");
        std::fs::create_dir_all(root.join("Python")).unwrap();
        std::fs::write(root.join("Python/utils"), "not a link").unwrap();

        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);
        let result = materializer.create_tree(&[a], &language_opts(&root)).unwrap();

        assert_eq!(result.links_created, 1);
        assert!(root.join("Python/utils-1").exists());
        assert_eq!(std::fs::read_to_string(root.join("Python/utils")).unwrap(), "not a link");
    }

    /// `active` is tagged `work`, `p2` is tagged `work/active`: the link
    /// `work/active` and the directory `work/active/` compete for one path.
    fn link_vs_directory(order: &[usize]) {
        let temp = TempDir::new().unwrap();
        let active = temp.path().join("src/active");
        let p2 = temp.path().join("src/p2");
        std::fs::create_dir_all(&active).unwrap();
        std::fs::create_dir_all(&p2).unwrap();
        let store = MemoryTagStore::new()
            .with(active.canonicalize().unwrap(), &["work"])
            .with(p2.canonicalize().unwrap(), &["work/active"]);
        let repos = [Repository::from_path(&active), Repository::from_path(&p2)];
        let ordered: Vec<_> = order.iter().map(|&i| repos[i].clone()).collect();

        let root = temp.path().join("tree");
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);
        let result = materializer
            .create_tree(&ordered, &TreeOptions::new(&root))
            .unwrap();

        assert!(result.is_success(), "order {:?}: {:?}", order, result.errors);
        let dir = root.join("work/active");
        assert!(std::fs::symlink_metadata(&dir).unwrap().is_dir());
        assert_eq!(
            std::fs::read_link(dir.join("p2")).unwrap(),
            p2.canonicalize().unwrap()
        );
        assert_eq!(
            std::fs::read_link(root.join("work/active-1")).unwrap(),
            active.canonicalize().unwrap()
        );
        assert!(root.join(crate::MANIFEST_FILE).exists());
    }

    #[test]
    fn test_directory_wins_over_link_when_link_comes_first() {
        link_vs_directory(&[0, 1]);
    }

    #[test]
    fn test_directory_wins_over_link_when_directory_comes_first() {
        link_vs_directory(&[1, 0]);
    }

    #[test]
    fn test_max_depth_zero_links_at_root() {
        let temp = TempDir::new().unwrap();
        let a = python_repo(&temp.path().join("a/utils"));
        let root = temp.path().join("tree");
        let store = MemoryTagStore::new();
        let materializer = LinkTreeMaterializer::new(&store, &DefaultImplicitTags);

        let opts = TreeOptions {
            max_depth: 0,
            ..language_opts(&root)
        };
        let result = materializer.create_tree(&[a], &opts).unwrap();
        assert_eq!(result.links_created, 1);
        assert!(root.join("utils").exists());
    }
}
