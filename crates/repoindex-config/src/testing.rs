//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - A temporary directory of fake repositories
//! - A destination root for materialized link trees
//! - An isolated tag store file
//!
//! # Usage
//!
//! ```ignore
//! use repoindex_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     let repo = env.create_repo("p1", &["README.md"]).unwrap();
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Canonical root of the temporary directory
    pub root: PathBuf,
    /// Directory holding fake repositories
    pub repos_root: PathBuf,
    /// Destination root for link trees (not created)
    pub tree_root: PathBuf,
    /// Tag store file (not created)
    pub tags_file: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        // Canonical so that paths compare equal to canonicalized repository paths
        let root = temp_dir.path().canonicalize()?;

        let repos_root = root.join("repos");
        std::fs::create_dir_all(&repos_root)?;

        Ok(Self {
            _temp_dir: temp_dir,
            tree_root: root.join("tree"),
            tags_file: root.join(format!("tags-{}.json", test_id)),
            repos_root,
            root,
            test_id,
        })
    }

    /// Create a fake git repository under `repos_root`.
    ///
    /// `name` may contain `/` to nest the repository. Each entry in `files`
    /// is created empty; entries ending in `/` become directories.
    pub fn create_repo(&self, name: &str, files: &[&str]) -> anyhow::Result<PathBuf> {
        let path = self.repos_root.join(name);
        std::fs::create_dir_all(path.join(".git"))?;
        for file in files {
            self.create_in(&path, file)?;
        }
        Ok(path)
    }

    /// Create a file (or directory when `relative` ends in `/`) below `base`
    pub fn create_in(&self, base: &Path, relative: &str) -> anyhow::Result<PathBuf> {
        let path = base.join(relative);
        if relative.ends_with('/') {
            std::fs::create_dir_all(&path)?;
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, b"")?;
        }
        Ok(path)
    }

    /// Write a project config file at `<root>/.repoindex/config.toml`
    pub fn write_project_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let dir = self.root.join(".repoindex");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("config.toml");
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.repos_root.exists());
        assert!(!env.tree_root.exists());
        assert!(!env.tags_file.exists());
    }

    #[test]
    fn test_environment_has_unique_tags_file() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.tags_file, env2.tags_file);
    }

    #[test]
    fn test_create_repo() {
        let env = TestEnvironment::new().unwrap();
        let repo = env
            .create_repo("work/p1", &["src/main.rs", "docs/"])
            .unwrap();
        assert!(repo.join(".git").is_dir());
        assert!(repo.join("src/main.rs").is_file());
        assert!(repo.join("docs").is_dir());
    }
}
