//! Integration tests for repoindex-config
//!
//! These tests verify the config loading pipeline with real file system operations.

use std::path::PathBuf;
use tempfile::tempdir;

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let dir = temp.path().join(".repoindex");
    std::fs::create_dir_all(&dir).unwrap();

    let config_content = r#"
[discovery]
roots = ["/src/work", "/src/oss"]
max_depth = 2

[store]
tags_file = "/custom/tags.json"

[tree]
root = "/custom/tree"
organize_by = "language"
max_depth = 1
collision = "skip"

[vfs]
extra_tag_keys = ["team"]
"#;
    std::fs::write(dir.join("config.toml"), config_content).unwrap();

    let config = repoindex_config::Config::load_file(&dir.join("config.toml")).unwrap();

    assert_eq!(
        config.discovery.roots,
        vec![PathBuf::from("/src/work"), PathBuf::from("/src/oss")]
    );
    assert_eq!(config.discovery.max_depth, 2);
    assert_eq!(config.store.tags_file, PathBuf::from("/custom/tags.json"));
    assert_eq!(config.tree.root, PathBuf::from("/custom/tree"));
    assert_eq!(config.tree.organize_by, "language");
    assert_eq!(config.tree.max_depth, 1);
    assert_eq!(config.tree.collision, "skip");
    // Unspecified values keep their defaults
    assert_eq!(config.tree.max_rename_attempts, 100);
    assert_eq!(config.vfs.extra_tag_keys, vec!["team".to_string()]);
}

/// Test config hierarchy: project config overrides global
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();

    let global_dir = temp.path().join("global/.repoindex");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        r#"
[discovery]
roots = ["/src"]

[tree]
organize_by = "owner"
max_depth = 4
"#,
    )
    .unwrap();

    let project_dir = temp.path().join("project/.repoindex");
    std::fs::create_dir_all(&project_dir).unwrap();
    std::fs::write(
        project_dir.join("config.toml"),
        r#"
[tree]
organize_by = "created-year"
"#,
    )
    .unwrap();

    let mut config =
        repoindex_config::Config::load_file(&global_dir.join("config.toml")).unwrap();
    let project = repoindex_config::Config::load_file(&project_dir.join("config.toml")).unwrap();
    config.merge(project);

    assert_eq!(config.tree.organize_by, "created-year");
    assert_eq!(config.tree.max_depth, 4);
    assert_eq!(config.discovery.roots, vec![PathBuf::from("/src")]);
}

/// Malformed TOML surfaces as a parse error rather than silently defaulting
#[test]
fn test_invalid_toml_is_an_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[tree\nroot = ").unwrap();

    let err = repoindex_config::Config::load_file(&path).unwrap_err();
    assert!(matches!(err, repoindex_config::ConfigError::Toml(_)));
}
