//! # repoindex-config
//!
//! Configuration management for repoindex.
//!
//! Loads configuration from:
//! 1. `~/.repoindex/config.toml` (global)
//! 2. `.repoindex/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod path;
pub mod testing;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Process-wide config, loaded on first use
static CONFIG: OnceCell<Config> = OnceCell::new();

/// Get the global config, loading it on first call.
///
/// A load failure is returned to the caller and nothing is cached, so a
/// broken config file never degrades into the defaults.
pub fn config() -> Result<&'static Config, ConfigError> {
    CONFIG.get_or_try_init(Config::load)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub store: StoreConfig,
    pub tree: TreeConfig,
    pub vfs: VfsConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                crate::log_config_debug!("Loading global config", path = %global_path.display());
                config = Self::load_file(&global_path)?;
            }
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            crate::log_config_debug!("Loading project config", path = %project_path.display());
            let project_config = Self::load_file(&project_path)?;
            config.merge(project_config);
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse a single config file without layering or env overrides.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.repoindex/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".repoindex/config.toml"))
    }

    /// Project config path, relative to the working directory
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".repoindex/config.toml")
    }

    /// Merge another config (project overrides).
    ///
    /// Only values that differ from the defaults replace what is already loaded.
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if !other.discovery.roots.is_empty() {
            self.discovery.roots = other.discovery.roots;
        }
        if other.discovery.max_depth != defaults.discovery.max_depth {
            self.discovery.max_depth = other.discovery.max_depth;
        }
        if other.store.tags_file != defaults.store.tags_file {
            self.store.tags_file = other.store.tags_file;
        }
        if other.tree.root != defaults.tree.root {
            self.tree.root = other.tree.root;
        }
        if other.tree.organize_by != defaults.tree.organize_by {
            self.tree.organize_by = other.tree.organize_by;
        }
        if other.tree.max_depth != defaults.tree.max_depth {
            self.tree.max_depth = other.tree.max_depth;
        }
        if other.tree.collision != defaults.tree.collision {
            self.tree.collision = other.tree.collision;
        }
        if other.tree.max_rename_attempts != defaults.tree.max_rename_attempts {
            self.tree.max_rename_attempts = other.tree.max_rename_attempts;
        }
        if !other.vfs.extra_tag_keys.is_empty() {
            self.vfs.extra_tag_keys = other.vfs.extra_tag_keys;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("REPOINDEX_TAGS_FILE") {
            self.store.tags_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("REPOINDEX_TREE_ROOT") {
            self.tree.root = PathBuf::from(path);
        }
        if let Ok(roots) = std::env::var("REPOINDEX_ROOTS") {
            self.discovery.roots = std::env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
    }

    /// Generate TOML for this config
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }
}

/// Repository discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directories scanned for repositories
    pub roots: Vec<PathBuf>,
    /// How deep below each root a repository may sit
    pub max_depth: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: 3,
        }
    }
}

/// Explicit tag-assignment store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding `repository path -> [tags]`
    pub tags_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tags_file: PathBuf::from("~/.repoindex/tags.json"),
        }
    }
}

/// Materialized link tree defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Default destination root
    pub root: PathBuf,
    /// tag, language, created-year, modified-year or owner
    pub organize_by: String,
    /// Maximum number of directory levels below the root
    pub max_depth: usize,
    /// rename or skip
    pub collision: String,
    /// Upper bound on `-N` suffixes tried by the rename strategy
    pub max_rename_attempts: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/repos-tree"),
            organize_by: "tag".to_string(),
            max_depth: 2,
            collision: "rename".to_string(),
            max_rename_attempts: 100,
        }
    }
}

/// Virtual filesystem settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Tag keys recognised in `/by-tag` paths in addition to the built-in ones
    pub extra_tag_keys: Vec<String>,
}
