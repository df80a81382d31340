//! Scanning a materialized tree for stale links.
//!
//! Works from the links on disk alone. The manifest only contributes
//! provenance to the report, so a tree without one (or with a corrupt one)
//! is still scanned and pruned.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use repoindex_config::{log_tree_debug, log_tree_info, log_tree_warn};

use crate::manifest::Provenance;
use crate::Result;

/// Outcome of a refresh or status scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub total_links: usize,
    pub valid_links: usize,
    pub broken_links: usize,
    pub removed_links: usize,
    pub broken_paths: Vec<PathBuf>,
    /// Links that were broken but could not be removed
    pub prune_failures: Vec<PathBuf>,
    pub provenance: Provenance,
}

/// Walk every symlink under `tree` and classify it as valid (target
/// exists) or broken. With `prune` and without `dry_run`, broken links are
/// unlinked one at a time; a failed unlink is reported, not fatal.
pub fn refresh(tree: &Path, prune: bool, dry_run: bool) -> Result<RefreshReport> {
    fs::metadata(tree)?;

    let mut report = RefreshReport {
        total_links: 0,
        valid_links: 0,
        broken_links: 0,
        removed_links: 0,
        broken_paths: Vec::new(),
        prune_failures: Vec::new(),
        provenance: Provenance::of(tree),
    };

    // Links are never followed, so a link into a repository is not descended
    for entry in WalkDir::new(tree).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log_tree_warn!("Skipping unreadable entry", error = %e);
                continue;
            }
        };
        if !entry.path_is_symlink() {
            continue;
        }

        report.total_links += 1;
        // exists() follows the link
        if entry.path().exists() {
            report.valid_links += 1;
            continue;
        }

        let path = entry.into_path();
        log_tree_debug!("Broken link", path = %path.display());
        report.broken_links += 1;

        if prune && !dry_run {
            match fs::remove_file(&path) {
                Ok(()) => report.removed_links += 1,
                Err(e) => {
                    log_tree_warn!("Failed to remove broken link", path = %path.display(), error = %e);
                    report.prune_failures.push(path.clone());
                }
            }
        }
        report.broken_paths.push(path);
    }

    log_tree_info!(
        "Tree scanned",
        tree = %tree.display(),
        total = report.total_links,
        broken = report.broken_links,
        removed = report.removed_links
    );
    Ok(report)
}

/// Read-only scan: `refresh` without pruning, as a dry run
pub fn status(tree: &Path) -> Result<RefreshReport> {
    refresh(tree, false, true)
}
