//! # repoindex-linktree
//!
//! Projects a set of repositories onto a real directory of symlinks,
//! grouped by one classification, and keeps that tree honest afterwards.
//!
//! - [`LinkTreeMaterializer`] creates the links, resolving name collisions
//!   deterministically in input order
//! - [`refresh`] / [`status`] scan an existing tree for broken links
//! - [`TreeManifest`] records how a tree was produced

pub mod manifest;
pub mod materialize;
pub mod refresh;
pub mod sanitize;

pub use manifest::{Provenance, TreeManifest, MANIFEST_FILE};
pub use materialize::LinkTreeMaterializer;
pub use refresh::{refresh, status, RefreshReport};
pub use sanitize::sanitize_segment;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use repoindex_config::TreeConfig;

/// Errors that can occur while materializing or scanning a tree
#[derive(Error, Debug)]
pub enum LinkTreeError {
    #[error("No free name for {dest} after {attempts} attempts")]
    CollisionExhausted { dest: PathBuf, attempts: usize },

    #[error("Destination exists and is not a symlink: {0}")]
    DestinationOccupied(PathBuf),

    #[error("Repository path does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Corrupt tree manifest: {0}")]
    ManifestCorrupt(String),

    #[error("Unknown {kind} '{value}'")]
    UnknownOption { kind: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkTreeError>;

/// Classification used to group links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrganizeBy {
    Tag,
    Language,
    CreatedYear,
    ModifiedYear,
    Owner,
}

impl OrganizeBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizeBy::Tag => "tag",
            OrganizeBy::Language => "language",
            OrganizeBy::CreatedYear => "created-year",
            OrganizeBy::ModifiedYear => "modified-year",
            OrganizeBy::Owner => "owner",
        }
    }
}

impl fmt::Display for OrganizeBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizeBy {
    type Err = LinkTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tag" => Ok(OrganizeBy::Tag),
            "language" => Ok(OrganizeBy::Language),
            "created-year" => Ok(OrganizeBy::CreatedYear),
            "modified-year" => Ok(OrganizeBy::ModifiedYear),
            "owner" => Ok(OrganizeBy::Owner),
            _ => Err(LinkTreeError::UnknownOption {
                kind: "classification",
                value: s.to_string(),
            }),
        }
    }
}

/// What to do when a destination name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionStrategy {
    /// Try `name-1`, `name-2`, ... up to a bound
    Rename,
    /// Drop the link
    Skip,
}

impl FromStr for CollisionStrategy {
    type Err = LinkTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rename" => Ok(CollisionStrategy::Rename),
            "skip" => Ok(CollisionStrategy::Skip),
            _ => Err(LinkTreeError::UnknownOption {
                kind: "collision strategy",
                value: s.to_string(),
            }),
        }
    }
}

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_MAX_RENAME_ATTEMPTS: usize = 100;

/// Parameters of one materialization run
#[derive(Debug, Clone, PartialEq)]
pub struct TreeOptions {
    pub root: PathBuf,
    pub organize_by: OrganizeBy,
    /// Directory levels kept below the root; 0 puts every link at the root
    pub max_depth: usize,
    pub collision: CollisionStrategy,
    pub dry_run: bool,
    pub max_rename_attempts: usize,
}

impl TreeOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            organize_by: OrganizeBy::Tag,
            max_depth: DEFAULT_MAX_DEPTH,
            collision: CollisionStrategy::Rename,
            dry_run: false,
            max_rename_attempts: DEFAULT_MAX_RENAME_ATTEMPTS,
        }
    }

    /// Options from the `[tree]` config section. The root is taken as is;
    /// callers expand `~` first.
    pub fn from_config(config: &TreeConfig) -> Result<Self> {
        Ok(Self {
            root: config.root.clone(),
            organize_by: config.organize_by.parse()?,
            max_depth: config.max_depth,
            collision: config.collision.parse()?,
            dry_run: false,
            max_rename_attempts: config.max_rename_attempts,
        })
    }
}

/// Outcome of a single link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkAction {
    Created,
    /// A broken link at the destination was replaced
    Updated,
    /// Created under a `-N` suffixed name
    Renamed,
    /// Already pointing at this repository
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkDetail {
    pub repo: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub action: LinkAction,
}

/// A link that could not be created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkFailure {
    pub repo: PathBuf,
    pub destination: PathBuf,
    pub message: String,
}

/// Aggregate of a materialization run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeResult {
    pub links_created: usize,
    pub links_updated: usize,
    pub links_skipped: usize,
    pub dirs_created: usize,
    pub errors: Vec<LinkFailure>,
    pub details: Vec<LinkDetail>,
}

impl TreeResult {
    /// A run succeeded when no link failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
