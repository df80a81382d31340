//! Tree manifest: a small JSON record at the root of a materialized tree.
//!
//! Written once after a successful run using the write-rename pattern. A
//! missing or unreadable manifest never blocks scanning; it only makes the
//! tree's provenance unknown.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use repoindex_config::log_tree_warn;

use crate::{LinkTreeError, OrganizeBy, Result};

/// Fixed file name of the manifest inside a tree root
pub const MANIFEST_FILE: &str = ".repoindex-tree.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeManifest {
    /// RFC 3339 timestamp of the run
    pub created_at: DateTime<Utc>,
    pub organize_by: OrganizeBy,
    pub repos_count: usize,
    /// Version of the tool that produced the tree
    pub repoindex_version: String,
}

impl TreeManifest {
    pub fn new(organize_by: OrganizeBy, repos_count: usize) -> Self {
        Self {
            created_at: Utc::now(),
            organize_by,
            repos_count,
            repoindex_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Manifest location for a tree root
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(MANIFEST_FILE)
    }

    /// Read the manifest of a tree. `Ok(None)` when there is none.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(root);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| LinkTreeError::ManifestCorrupt(format!("{}: {}", path.display(), e)))
    }

    /// Write the manifest into `root` atomically.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::path_in(root);
        let tmp_path = path.with_extension("json.tmp");

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(&file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        drop(writer);
        file.sync_all()?;

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

/// What is known about how a tree was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provenance", rename_all = "kebab-case")]
pub enum Provenance {
    Known(TreeManifest),
    /// No manifest, or one that could not be read
    Unknown,
}

impl Provenance {
    /// Provenance of the tree at `root`. Read failures degrade to `Unknown`.
    pub fn of(root: &Path) -> Self {
        match TreeManifest::load(root) {
            Ok(Some(manifest)) => Provenance::Known(manifest),
            Ok(None) => Provenance::Unknown,
            Err(e) => {
                log_tree_warn!("Ignoring unreadable tree manifest", root = %root.display(), error = %e);
                Provenance::Unknown
            }
        }
    }

    pub fn manifest(&self) -> Option<&TreeManifest> {
        match self {
            Provenance::Known(manifest) => Some(manifest),
            Provenance::Unknown => None,
        }
    }
}
