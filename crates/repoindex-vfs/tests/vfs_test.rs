//! End-to-end tests: real repositories on disk, a JSON tag store, and
//! rebuilds after mutation.

use repoindex_config::testing::TestEnvironment;
use repoindex_vfs::{
    DefaultImplicitTags, EntryKind, JsonTagStore, Location, PathResolver, RepoAttributes,
    Repository, TagMutator, TagStore, Vfs, VfsBuilder, VfsContext, VfsError, VfsNode,
};

fn build(repos: &[Repository], store: &dyn TagStore) -> Vfs {
    VfsBuilder::new(VfsContext {
        repos,
        store,
        implicit: &DefaultImplicitTags,
    })
    .build()
}

#[test]
fn test_tagged_repo_appears_under_every_tag() {
    let env = TestEnvironment::new().unwrap();
    let p1 = env.create_repo("p1", &["README.md"]).unwrap();
    let repos = vec![Repository::from_path(&p1)];

    let mut store = JsonTagStore::open(&env.tags_file).unwrap();
    store.set(&p1, vec!["topic:ml".into(), "work/active".into()]);

    let vfs = build(&repos, &store);
    let resolver = PathResolver::new(&vfs);

    let a = resolver.locate("/by-tag/topic/ml/p1").unwrap();
    let b = resolver.locate("/by-tag/work/active/p1").unwrap();
    let c = resolver.locate("/repos/p1").unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
    match c {
        Location::Real { path, .. } => assert_eq!(path, p1),
        other => panic!("expected real location, got {:?}", other),
    }
}

#[test]
fn test_mutation_visible_after_rebuild() {
    let env = TestEnvironment::new().unwrap();
    let p1 = env.create_repo("p1", &[]).unwrap();
    let p2 = env.create_repo("p2", &[]).unwrap();
    let repos = vec![Repository::from_path(&p1), Repository::from_path(&p2)];

    let mut store = JsonTagStore::open(&env.tags_file).unwrap();
    let vfs = build(&repos, &store);
    {
        let resolver = PathResolver::new(&vfs);
        let mut mutator = TagMutator::new(&resolver, &mut store);
        mutator.cp("/repos/p1", "/by-tag/topic/ml").unwrap();
        mutator.cp("/repos/p2", "/by-tag/topic/ml").unwrap();
    }
    store.save().unwrap();

    // The old snapshot is untouched
    assert!(vfs.lookup(&["by-tag", "topic"]).is_none());

    let store = JsonTagStore::open(&env.tags_file).unwrap();
    let vfs = build(&repos, &store);
    let resolver = PathResolver::new(&vfs);
    let names: Vec<_> = resolver
        .list("/by-tag/topic/ml")
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.kind))
        .collect();
    assert_eq!(
        names,
        vec![
            ("p1".to_string(), EntryKind::Symlink),
            ("p2".to_string(), EntryKind::Symlink)
        ]
    );
}

#[test]
fn test_mv_then_rm_round_trip() {
    let env = TestEnvironment::new().unwrap();
    let p1 = env.create_repo("p1", &[]).unwrap();
    let repos = vec![Repository::from_path(&p1)];

    let mut store = JsonTagStore::open(&env.tags_file).unwrap();
    store.set(&p1, vec!["topic:ml".into()]);

    let vfs = build(&repos, &store);
    {
        let resolver = PathResolver::new(&vfs);
        let mut mutator = TagMutator::new(&resolver, &mut store);
        mutator.mv("/by-tag/topic/ml/p1", "/by-tag/topic/ai").unwrap();
    }

    let vfs = build(&repos, &store);
    assert!(vfs.lookup(&["by-tag", "topic", "ml"]).is_none());
    assert!(matches!(
        vfs.lookup(&["by-tag", "topic", "ai", "p1"]),
        Some(VfsNode::Symlink { .. })
    ));

    {
        let resolver = PathResolver::new(&vfs);
        let mut mutator = TagMutator::new(&resolver, &mut store);
        mutator.rm("/by-tag/topic/ai/p1").unwrap();
        let err = mutator.rm("/by-tag/topic/ai/p1").unwrap_err();
        assert!(matches!(err, VfsError::NotAssigned { .. }));
    }
    assert!(store.get(&p1).is_empty());
}

#[test]
fn test_navigation_into_repository_contents() {
    let env = TestEnvironment::new().unwrap();
    let p1 = env.create_repo("p1", &["src/lib.rs", "Cargo.toml"]).unwrap();
    let repos = vec![Repository::from_path(&p1).with_attributes(RepoAttributes {
        language: Some("Rust".into()),
        dirty: Some(false),
        ..Default::default()
    })];

    let store = JsonTagStore::open(&env.tags_file).unwrap();
    let vfs = build(&repos, &store);
    let mut resolver = PathResolver::new(&vfs);

    resolver.cd("/by-status/clean/p1").unwrap();
    assert_eq!(resolver.pwd(), "/repos/p1");
    resolver.cd("src").unwrap();
    assert_eq!(resolver.pwd(), "/repos/p1/src");

    let entries = resolver.list(".").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "lib.rs");
    assert_eq!(entries[0].kind, EntryKind::File);

    resolver.cd("/by-language/Rust").unwrap();
    assert_eq!(resolver.pwd(), "/by-language/Rust");
}
