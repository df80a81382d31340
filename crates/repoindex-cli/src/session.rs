//! Per-invocation state: configuration, discovered repositories and the
//! explicit tag store. Every command builds a fresh VFS from it.

use std::path::PathBuf;

use anyhow::{Context, Result};

use repoindex_config::path::expand_home;
use repoindex_config::{log_cli_debug, Config};
use repoindex_vfs::{DefaultImplicitTags, JsonTagStore, Repository, Vfs, VfsBuilder, VfsContext};

use crate::discovery;

pub struct Session {
    pub config: Config,
    pub repos: Vec<Repository>,
    pub store: JsonTagStore,
}

impl Session {
    /// Load config, open the tag store and discover repositories.
    pub fn load() -> Result<Self> {
        let config = repoindex_config::config()
            .context("Failed to load configuration")?
            .clone();

        let tags_file = expand_home(&config.store.tags_file);
        let store = JsonTagStore::open(&tags_file)
            .with_context(|| format!("Failed to open tag store {}", tags_file.display()))?;

        let roots = discovery_roots(&config)?;
        log_cli_debug!("Discovering repositories", roots = ?roots);
        let repos = discovery::discover(&roots, config.discovery.max_depth);

        Ok(Self {
            config,
            repos,
            store,
        })
    }

    /// A fresh snapshot of the current repositories and tags
    pub fn build_vfs(&self) -> Vfs {
        VfsBuilder::new(VfsContext {
            repos: &self.repos,
            store: &self.store,
            implicit: &DefaultImplicitTags,
        })
        .with_config_values(self.config_values())
        .build()
    }

    /// Values exposed under `/config`
    fn config_values(&self) -> Vec<(String, String)> {
        let tree = &self.config.tree;
        vec![
            (
                "tags_file".to_string(),
                self.store.path().display().to_string(),
            ),
            (
                "tree_root".to_string(),
                expand_home(&tree.root).display().to_string(),
            ),
            ("organize_by".to_string(), tree.organize_by.clone()),
            ("collision".to_string(), tree.collision.clone()),
            ("max_depth".to_string(), tree.max_depth.to_string()),
            (
                "discovery_max_depth".to_string(),
                self.config.discovery.max_depth.to_string(),
            ),
        ]
    }
}

/// Configured roots with `~` expanded, or the working directory when none
/// are configured.
fn discovery_roots(config: &Config) -> Result<Vec<PathBuf>> {
    if config.discovery.roots.is_empty() {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        return Ok(vec![cwd]);
    }
    Ok(config.discovery.roots.iter().map(expand_home).collect())
}
