//! VFS browsing and tag-editing commands.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use repoindex_config::log_cli_info;
use repoindex_vfs::tag::{filter_tags, match_hierarchical};
use repoindex_vfs::{EntryKind, PathResolver, RepoId, TagMutator, TagStore, Vfs, VfsNode};

use crate::session::Session;

/// `ls [PATH]`
pub fn cmd_ls(session: &Session, path: Option<&str>, json: bool) -> Result<()> {
    let vfs = session.build_vfs();
    let resolver = PathResolver::new(&vfs);
    let path = path.unwrap_or("/");

    if let Ok(VfsNode::ConfigValue(value)) = resolver.get_node(path) {
        println!("{}", value);
        return Ok(());
    }

    let entries = resolver.list(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in entries {
        let suffix = match entry.kind {
            EntryKind::Directory | EntryKind::Repository => "/",
            EntryKind::Symlink => "@",
            EntryKind::ConfigValue | EntryKind::File => "",
        };
        println!("{}{}", entry.name, suffix);
    }
    Ok(())
}

/// Which tag edit to run
pub enum Edit<'a> {
    Cp { src: &'a str, dst: &'a str },
    Mv { src: &'a str, dst: &'a str },
    Rm { path: &'a str },
}

/// `cp` / `mv` / `rm`: edit explicit tags, then save the store
pub fn cmd_edit(session: &mut Session, edit: Edit<'_>) -> Result<()> {
    let vfs = session.build_vfs();
    let resolver = PathResolver::new(&vfs);
    let extra_keys = session.config.vfs.extra_tag_keys.clone();
    let message = {
        let mut mutator =
            TagMutator::new(&resolver, &mut session.store).with_extra_keys(extra_keys);
        match edit {
            Edit::Cp { src, dst } => {
                let tag = mutator.cp(src, dst)?;
                format!("Tagged {} with '{}'", src, tag)
            }
            Edit::Mv { src, dst } => {
                let (old, new) = mutator.mv(src, dst)?;
                format!("Retagged {}: '{}' -> '{}'", src, old, new)
            }
            Edit::Rm { path } => {
                let tag = mutator.rm(path)?;
                format!("Removed tag '{}'", tag)
            }
        }
    };

    session
        .store
        .save()
        .with_context(|| format!("Failed to save tag store {}", session.store.path().display()))?;
    log_cli_info!("Tag store updated", path = %session.store.path().display());
    println!("{}", message);
    Ok(())
}

/// `mkdir PATH`: report the tag the directory stands for
pub fn cmd_mkdir(session: &mut Session, path: &str) -> Result<()> {
    let vfs = session.build_vfs();
    let resolver = PathResolver::new(&vfs);
    let extra_keys = session.config.vfs.extra_tag_keys.clone();
    let mutator = TagMutator::new(&resolver, &mut session.store).with_extra_keys(extra_keys);

    let tag = mutator.mkdir(path)?;
    println!("{} is tag '{}'; it appears once a repository carries it", path, tag);
    Ok(())
}

/// Find a repository by VFS name, VFS path or filesystem path
fn find_repo(vfs: &Vfs, query: &str) -> Result<RepoId> {
    if let Some(id) = vfs.repos().find_by_name(query) {
        return Ok(id);
    }
    if query.starts_with('/') {
        if let Some(id) = PathResolver::new(vfs)
            .get_node(query)
            .ok()
            .and_then(VfsNode::repo_id)
        {
            return Ok(id);
        }
    }
    vfs.repos()
        .find_by_path(Path::new(query))
        .ok_or_else(|| anyhow!("Unknown repository: {}", query))
}

/// `tags REPO`: effective tags, optionally narrowed
pub fn cmd_tags(
    session: &Session,
    repo: &str,
    filter: Option<&str>,
    matching: Option<&str>,
) -> Result<()> {
    let vfs = session.build_vfs();
    let id = find_repo(&vfs, repo)?;

    let mut tags: Vec<String> = vfs.effective_tags(id).to_vec();
    if let Some(pattern) = filter {
        tags = filter_tags(&tags, pattern);
    }
    if let Some(pattern) = matching {
        tags.retain(|tag| match_hierarchical(tag, pattern));
    }
    for tag in tags {
        println!("{}", tag);
    }
    Ok(())
}
