//! Path normalization utilities.
//!
//! Repository paths are used as keys in the tag store and in the VFS
//! repository table, so every path entering those structures goes through
//! these functions to ensure one repository never shows up under two keys.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading `~` (and `~user` forms) are returned unchanged.
pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Normalize path, falling back to the original if canonicalization fails.
///
/// This is useful when the path might not exist and that's acceptable.
pub fn normalize_or_original(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Normalize a path where the target may not exist yet.
///
/// Canonicalizes the nearest existing ancestor and appends the remaining
/// components. Useful for output directories that will be created.
pub fn normalize_nonexistent(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = expand_home(path);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        let name = existing
            .file_name()
            .with_context(|| format!("Path has no existing ancestor: {}", absolute.display()))?;
        missing.push(name.to_os_string());
        existing = existing
            .parent()
            .with_context(|| format!("Path has no existing ancestor: {}", absolute.display()))?;
    }

    let mut resolved = existing
        .canonicalize()
        .with_context(|| format!("Failed to resolve directory: {}", existing.display()))?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Lexically normalize a path: drop `.` components and apply `..` without
/// touching the filesystem.
pub fn normalize_lexically(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check if a path is within a directory (containment check for `..` escapes).
///
/// Both paths are canonicalized when they exist; otherwise the lexical
/// normal form is compared.
pub fn is_within_directory(path: impl AsRef<Path>, dir: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let dir = dir.as_ref();

    let resolve = |p: &Path| p.canonicalize().unwrap_or_else(|_| normalize_lexically(p));
    resolve(path).starts_with(resolve(dir))
}
