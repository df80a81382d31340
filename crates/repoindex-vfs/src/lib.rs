//! # repoindex-vfs
//!
//! Tag-driven virtual filesystem over a collection of repositories.
//!
//! The VFS is an immutable snapshot rebuilt from scratch on every use:
//!
//! - `/repos/<name>`: one `Repository` node per repository
//! - `/by-language/<language>/<name>`: symlinks into `/repos`
//! - `/by-status/<clean|dirty>/<name>`: symlinks into `/repos`
//! - `/by-tag/<levels..>/<name>`: symlinks into `/repos`, one per tag
//! - `/config/<key>`: configuration values, when supplied
//!
//! Mutations (`cp`, `mv`, `rm` under `/by-tag`) only touch the explicit
//! tag-assignment store; a rebuild makes them visible.

pub mod builder;
pub mod implicit;
pub mod mutate;
pub mod node;
pub mod repo;
pub mod resolver;
pub mod store;
pub mod tag;

pub use builder::{Vfs, VfsBuilder, VfsContext};
pub use implicit::{DefaultImplicitTags, ImplicitTags};
pub use mutate::TagMutator;
pub use node::{EntryKind, VfsEntry, VfsNode};
pub use repo::{RemoteInfo, RepoAttributes, RepoId, RepoTable, Repository};
pub use resolver::{Location, PathResolver};
pub use store::{JsonTagStore, MemoryTagStore, TagStore};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during VFS operations
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("No such path: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Tag '{0}' is derived automatically and cannot be assigned or removed")]
    ProtectedTag(String),

    #[error("Only paths under /by-tag can be modified: {0}")]
    NotMutable(String),

    #[error("Tag '{tag}' is not explicitly assigned to {repo}")]
    NotAssigned { tag: String, repo: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VfsError {
    /// Whether this is a resolution failure (path missing or wrong node type)
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            VfsError::NotFound(_) | VfsError::NotADirectory(_) | VfsError::InvalidPath(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;

/// Roots of the snapshot
pub const REPOS_ROOT: &str = "repos";
pub const BY_LANGUAGE_ROOT: &str = "by-language";
pub const BY_STATUS_ROOT: &str = "by-status";
pub const BY_TAG_ROOT: &str = "by-tag";
pub const CONFIG_ROOT: &str = "config";

/// Directory under a `by-tag` node that holds repository entries whose
/// names clash with a sub-tag directory at the same node.
pub const REPOS_BUCKET: &str = "_repos";
