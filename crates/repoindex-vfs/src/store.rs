//! Explicit tag-assignment stores.
//!
//! The store maps a repository path to the tags a user assigned by hand.
//! Concurrent writers are last-write-wins; there is no merge on save.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use repoindex_config::path::normalize_or_original;
use repoindex_config::{log_store_debug, log_store_warn};

use crate::Result;

/// get/set/save over `repository path -> [tag]`
pub trait TagStore {
    /// Explicit tags of a repository, empty when none are assigned
    fn get(&self, path: &Path) -> Vec<String>;

    /// Replace a repository's explicit tags; an empty list removes the entry
    fn set(&mut self, path: &Path, tags: Vec<String>);

    /// Persist pending changes
    fn save(&self) -> Result<()>;
}

/// In-memory store, used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryTagStore {
    tags: HashMap<PathBuf, Vec<String>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper to seed assignments
    pub fn with(mut self, path: impl AsRef<Path>, tags: &[&str]) -> Self {
        self.set(
            path.as_ref(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }
}

impl TagStore for MemoryTagStore {
    fn get(&self, path: &Path) -> Vec<String> {
        self.tags
            .get(&normalize_or_original(path))
            .cloned()
            .unwrap_or_default()
    }

    fn set(&mut self, path: &Path, tags: Vec<String>) {
        let key = normalize_or_original(path);
        if tags.is_empty() {
            self.tags.remove(&key);
        } else {
            self.tags.insert(key, tags);
        }
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }
}

/// JSON-file backed store.
///
/// The file is a single object mapping repository paths to tag arrays.
/// Saves go through a temp file and an atomic rename.
#[derive(Debug, Clone)]
pub struct JsonTagStore {
    path: PathBuf,
    tags: BTreeMap<PathBuf, Vec<String>>,
}

impl JsonTagStore {
    /// Open a store file, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tags = match File::open(&path) {
            Ok(file) => {
                let raw: BTreeMap<PathBuf, Vec<String>> =
                    serde_json::from_reader(BufReader::new(file))?;
                // Re-key so lookups match canonicalized repository paths
                raw.into_iter()
                    .map(|(k, v)| (normalize_or_original(&k), v))
                    .collect()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log_store_debug!("Tag store not found, starting empty", path = %path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, tags })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every repository with explicit tags
    pub fn assignments(&self) -> impl Iterator<Item = (&PathBuf, &Vec<String>)> {
        self.tags.iter()
    }
}

impl TagStore for JsonTagStore {
    fn get(&self, path: &Path) -> Vec<String> {
        self.tags
            .get(&normalize_or_original(path))
            .cloned()
            .unwrap_or_default()
    }

    fn set(&mut self, path: &Path, tags: Vec<String>) {
        let key = normalize_or_original(path);
        if tags.is_empty() {
            self.tags.remove(&key);
        } else {
            self.tags.insert(key, tags);
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(&file);
        serde_json::to_writer_pretty(&mut writer, &self.tags)?;
        drop(writer);
        file.sync_all()?;

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            log_store_warn!("Failed to replace tag store", path = %self.path.display(), error = %e);
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        log_store_debug!("Tag store saved", path = %self.path.display(), repos = self.tags.len());
        Ok(())
    }
}
