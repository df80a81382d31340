//! Derived (implicit) tags.
//!
//! Implicit tags are recomputed on every build and never persisted. They
//! live in the namespaces listed in [`crate::tag::IMPLICIT_PREFIXES`] and
//! [`crate::tag::IMPLICIT_EXACT`], which explicit assignment may not touch.

use repoindex_config::log_vfs_debug;

use crate::repo::Repository;

/// Turns repository attributes into tags.
pub trait ImplicitTags {
    fn derive(&self, repo: &Repository) -> Vec<String>;
}

impl<F> ImplicitTags for F
where
    F: Fn(&Repository) -> Vec<String>,
{
    fn derive(&self, repo: &Repository) -> Vec<String> {
        self(repo)
    }
}

/// The stock deriver.
///
/// Path-derived tags (`repo:`, `dir:`) are always produced, so a repository
/// without any attribute metadata still classifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImplicitTags;

impl ImplicitTags for DefaultImplicitTags {
    fn derive(&self, repo: &Repository) -> Vec<String> {
        let mut tags = vec![format!("repo:{}", repo.name)];
        if let Some(parent) = repo.parent_dir_name() {
            tags.push(format!("dir:{}", parent));
        }

        let attrs = &repo.attributes;
        if let Some(dirty) = attrs.dirty {
            tags.push(if dirty { "status:dirty" } else { "status:clean" }.to_string());
        }
        if let Some(license) = &attrs.license {
            tags.push(format!("license:{}", license));
        }
        for feature in &attrs.features {
            tags.push(format!("has:{}", feature));
        }
        if let Some(remote) = &attrs.remote {
            if let Some(host_tag) = host_tag(&remote.host) {
                tags.push(host_tag.to_string());
            }
            if remote.fork {
                tags.push("type:fork".to_string());
            }
            if remote.archived {
                tags.push("type:archived".to_string());
            }
        }
        for registry in &attrs.registries {
            match registry_tag(registry) {
                Some(tag) => tags.push(tag.to_string()),
                None => log_vfs_debug!("Ignoring unknown registry", registry = %registry, repo = %repo.name),
            }
        }
        tags
    }
}

/// Registries with a reserved tag; others would collide with explicit tags
fn registry_tag(registry: &str) -> Option<&'static str> {
    match registry.to_lowercase().as_str() {
        "pypi" => Some("pypi"),
        "crates" | "crates.io" => Some("crates"),
        "npm" => Some("npm"),
        _ => None,
    }
}

fn host_tag(host: &str) -> Option<&'static str> {
    match host.to_lowercase().as_str() {
        "github.com" => Some("github"),
        "gitlab.com" => Some("gitlab"),
        "bitbucket.org" => Some("bitbucket"),
        _ => None,
    }
}
