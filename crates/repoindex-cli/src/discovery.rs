//! Repository discovery.
//!
//! Walks the configured roots for directories containing `.git` and
//! derives the attributes the VFS and link trees classify by. Everything
//! here is read from the working tree; nothing talks to git or a network.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use repoindex_config::path::normalize_or_original;
use repoindex_config::{log_cli_debug, log_cli_info};
use repoindex_vfs::{RemoteInfo, RepoAttributes, Repository};

/// Marker files checked in order; the first hit decides the language
const LANGUAGE_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "Rust"),
    ("go.mod", "Go"),
    ("tsconfig.json", "TypeScript"),
    ("package.json", "JavaScript"),
    ("pyproject.toml", "Python"),
    ("setup.py", "Python"),
    ("requirements.txt", "Python"),
    ("pom.xml", "Java"),
    ("build.gradle", "Java"),
    ("build.gradle.kts", "Kotlin"),
    ("Gemfile", "Ruby"),
    ("mix.exs", "Elixir"),
    ("composer.json", "PHP"),
    ("CMakeLists.txt", "C++"),
    ("Makefile", "C"),
];

/// Working-tree files compared against the index before giving up
const STATUS_SCAN_LIMIT: usize = 5_000;

/// Find repositories below `roots`, at most `max_depth` levels down.
/// Repositories are not descended into. Results are sorted by path.
pub fn discover(roots: &[PathBuf], max_depth: usize) -> Vec<Repository> {
    let mut repos = Vec::new();
    for root in roots {
        let mut walker = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log_cli_debug!("Skipping unreadable path", error = %e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.') {
                walker.skip_current_dir();
                continue;
            }
            if entry.path().join(".git").exists() {
                repos.push(describe(entry.path()));
                walker.skip_current_dir();
            }
        }
    }
    repos.sort_by(|a, b| a.path.cmp(&b.path));
    repos.dedup_by(|a, b| a.path == b.path);
    log_cli_info!("Discovery finished", roots = roots.len(), repos = repos.len());
    repos
}

/// Descriptor for the repository at `path`
pub fn describe(path: &Path) -> Repository {
    let path = normalize_or_original(path);
    let metadata = fs::metadata(&path).ok();
    let attributes = RepoAttributes {
        language: detect_language(&path),
        dirty: detect_dirty(&path),
        license: detect_license(&path),
        remote: read_origin(&path),
        features: detect_features(&path),
        registries: Vec::new(),
        created: metadata
            .as_ref()
            .and_then(|m| m.created().ok())
            .map(DateTime::<Utc>::from),
        modified: metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from),
    };
    Repository::from_path(path).with_attributes(attributes)
}

/// Dirty when a working-tree file is newer than `.git/index`. `None` when
/// there is no index or the tree is too large to scan cheaply.
fn detect_dirty(path: &Path) -> Option<bool> {
    let indexed = fs::metadata(path.join(".git/index"))
        .and_then(|m| m.modified())
        .ok()?;
    let walker = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");

    let mut scanned = 0;
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        scanned += 1;
        if scanned > STATUS_SCAN_LIMIT {
            log_cli_debug!("Status scan limit reached", repo = %path.display());
            return None;
        }
        let newer = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .is_some_and(|modified| modified > indexed);
        if newer {
            return Some(true);
        }
    }
    Some(false)
}

fn detect_language(path: &Path) -> Option<String> {
    LANGUAGE_MARKERS
        .iter()
        .find(|(marker, _)| path.join(marker).exists())
        .map(|(_, language)| language.to_string())
}

fn find_file(path: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(path).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_uppercase().starts_with(prefix))
                .unwrap_or(false)
        })
}

fn detect_features(path: &Path) -> Vec<String> {
    let mut features = Vec::new();
    if find_file(path, "README").is_some() {
        features.push("readme".to_string());
    }
    if path.join(".github/workflows").is_dir()
        || path.join(".gitlab-ci.yml").exists()
        || path.join(".circleci").is_dir()
    {
        features.push("ci".to_string());
    }
    if path.join("tests").is_dir() || path.join("test").is_dir() {
        features.push("tests".to_string());
    }
    if path.join("Dockerfile").exists() {
        features.push("docker".to_string());
    }
    features
}

/// SPDX id guessed from the first lines of a LICENSE file
fn detect_license(path: &Path) -> Option<String> {
    let file = find_file(path, "LICENSE").or_else(|| find_file(path, "COPYING"))?;
    let text = fs::read_to_string(file).ok()?;
    let head: String = text.lines().take(5).collect::<Vec<_>>().join(" ").to_uppercase();

    let id = if head.contains("MIT LICENSE") || head.starts_with("MIT") {
        "MIT"
    } else if head.contains("APACHE LICENSE") {
        "Apache-2.0"
    } else if head.contains("GNU LESSER GENERAL PUBLIC LICENSE") {
        "LGPL-3.0"
    } else if head.contains("GNU AFFERO GENERAL PUBLIC LICENSE") {
        "AGPL-3.0"
    } else if head.contains("GNU GENERAL PUBLIC LICENSE") {
        if head.contains("VERSION 2") {
            "GPL-2.0"
        } else {
            "GPL-3.0"
        }
    } else if head.contains("MOZILLA PUBLIC LICENSE") {
        "MPL-2.0"
    } else if head.contains("BSD") {
        "BSD-3-Clause"
    } else if head.contains("UNLICENSE") || head.contains("PUBLIC DOMAIN") {
        "Unlicense"
    } else {
        return None;
    };
    Some(id.to_string())
}

/// Host and owner of the `origin` remote, from `.git/config`
fn read_origin(path: &Path) -> Option<RemoteInfo> {
    let config = fs::read_to_string(path.join(".git/config")).ok()?;
    let mut in_origin = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
            continue;
        }
        if !in_origin {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "url" {
                return parse_remote_url(value.trim());
            }
        }
    }
    None
}

/// `https://host/owner/name(.git)`, `ssh://git@host/owner/name` or
/// `git@host:owner/name`
fn parse_remote_url(url: &str) -> Option<RemoteInfo> {
    let rest = if let Some((_, rest)) = url.split_once("://") {
        rest.to_string()
    } else {
        // scp-like syntax
        url.replacen(':', "/", 1)
    };
    let rest = rest.rsplit_once('@').map(|(_, r)| r).unwrap_or(&rest);
    let mut parts = rest.split('/').filter(|s| !s.is_empty());
    let host = parts.next()?;
    let host = host.split(':').next().unwrap_or(host).to_lowercase();
    let owner = parts.next().map(str::to_string);
    Some(RemoteInfo {
        host,
        owner,
        ..Default::default()
    })
}
