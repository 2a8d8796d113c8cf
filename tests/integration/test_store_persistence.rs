//! Test: EmbeddingStore persistence across store instances
//!
//! Every test works in its own temp dir and reopens the index through a
//! second store to make sure state comes from disk, not from the cache.

use crate::common::{TestProvider, function, open_store, unit};
use coderag::storage::{INDEX_FILE_NAME, repository_key};
use coderag::{EmbeddingFilters, EmbeddingProvider, EmbeddingStore, EmbeddingType, StoreError};
use std::collections::BTreeMap;
use std::fs;

#[test]
fn test_round_trip_through_a_second_store() {
    let provider = TestProvider::new(3);
    let (mut store, temp_dir) = open_store(&provider);

    let records = vec![
        function("parse", "src/parse.rs", unit(3, 0)).with_lines(3, 18),
        function("render", "src/render.rs", unit(3, 1)).with_summary("Render a page"),
        function("serve", "src/serve.rs", unit(3, 2)).with_tags(["http"]),
    ];
    store.save_embeddings(records.clone()).unwrap();

    let reopened = EmbeddingStore::new(temp_dir.path(), "test-repo", provider.descriptor());
    let loaded: BTreeMap<String, String> = reopened
        .load_embeddings()
        .unwrap()
        .into_iter()
        .map(|r| (r.id, r.content))
        .collect();
    let expected: BTreeMap<String, String> =
        records.into_iter().map(|r| (r.id, r.content)).collect();

    assert_eq!(loaded, expected);
    assert_eq!(reopened.count().unwrap(), 3);
}

#[test]
fn test_merge_by_id_keeps_latest_content() {
    let provider = TestProvider::new(3);
    let (mut store, temp_dir) = open_store(&provider);

    store
        .save_embeddings(vec![function("e1", "a.rs", unit(3, 0)).with_content("A")])
        .unwrap();
    store
        .save_embeddings(vec![function("e1", "a.rs", unit(3, 0)).with_content("B")])
        .unwrap();

    let reopened = EmbeddingStore::new(temp_dir.path(), "test-repo", provider.descriptor());
    let records = reopened.load_embeddings().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, "B");
}

#[test]
fn test_empty_save_creates_no_index() {
    let provider = TestProvider::new(3);
    let (mut store, _temp_dir) = open_store(&provider);

    store.save_embeddings(Vec::new()).unwrap();

    assert!(!store.index_path().exists());
    assert!(!store.exists().unwrap());
    assert!(store.load_index().unwrap().is_none());
}

#[test]
fn test_filters_compose_with_and() {
    let provider = TestProvider::new(3);
    let (mut store, _temp_dir) = open_store(&provider);

    store
        .save_embeddings(vec![
            function("ts_fn", "web/a.ts", unit(3, 0)).with_language("typescript"),
            function("rs_fn", "src/a.rs", unit(3, 0)).with_language("rust"),
            coderag::CodeEmbedding::new("ts_class", EmbeddingType::Class, "web/b.ts", unit(3, 1))
                .with_language("typescript"),
        ])
        .unwrap();

    let filters = EmbeddingFilters::new()
        .language("typescript")
        .embedding_type(EmbeddingType::Function);
    let matched = store.load_embeddings_with_filters(&filters).unwrap();

    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, "ts_fn");
}

#[test]
fn test_filters_deserialize_ignoring_unknown_keys() {
    let filters: EmbeddingFilters = serde_json::from_str(
        r#"{"language": "rust", "type": "function", "filePattern": "^src/", "owner": "nobody"}"#,
    )
    .unwrap();

    assert_eq!(filters.language.as_deref(), Some("rust"));
    assert_eq!(filters.embedding_type, Some(EmbeddingType::Function));
    assert_eq!(filters.file_pattern.as_deref(), Some("^src/"));
}

#[test]
fn test_invalid_file_pattern_is_an_error() {
    let provider = TestProvider::new(3);
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![function("a", "src/a.rs", unit(3, 0))])
        .unwrap();

    let result = store.load_embeddings_with_filters(&EmbeddingFilters::new().file_pattern("(src"));
    assert!(matches!(result, Err(StoreError::InvalidFilter { .. })));
}

#[test]
fn test_clear_bypasses_stale_cache() {
    let provider = TestProvider::new(3);
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![function("a", "a.rs", unit(3, 0))])
        .unwrap();

    // Populate the cache before clearing
    assert_eq!(store.load_embeddings().unwrap().len(), 1);

    store.clear().unwrap();

    assert!(!store.exists().unwrap());
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.load_embeddings().unwrap().is_empty());
    assert!(store.get_stats().unwrap().is_none());

    // The store keeps working after a clear
    store.initialize().unwrap();
    store
        .save_embeddings(vec![function("b", "b.rs", unit(3, 1))])
        .unwrap();
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_invalidate_changed_files_drops_every_record_of_a_source() {
    let provider = TestProvider::new(3);
    let (mut store, temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("a1", "src/a.rs", unit(3, 0)),
            function("a2", "src/a.rs", unit(3, 1)),
            function("b1", "src/b.rs", unit(3, 2)),
        ])
        .unwrap();

    let removed = store
        .invalidate_changed_files(&["src/a.rs", "src/missing.rs"])
        .unwrap();
    assert_eq!(removed, 2);

    let reopened = EmbeddingStore::new(temp_dir.path(), "test-repo", provider.descriptor());
    let ids: Vec<String> = reopened
        .load_embeddings()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["b1"]);
}

#[test]
fn test_persisted_document_layout() {
    let provider = TestProvider::new(3);
    let (mut store, temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("a", "src/a.rs", unit(3, 0))
                .with_summary("Parse input")
                .with_language("rust"),
        ])
        .unwrap();

    let expected_path = temp_dir
        .path()
        .join(repository_key("test-repo"))
        .join(INDEX_FILE_NAME);
    assert_eq!(store.index_path(), expected_path);

    let document: serde_json::Value =
        serde_json::from_slice(&fs::read(&expected_path).unwrap()).unwrap();
    assert_eq!(document["version"], 1);
    assert_eq!(document["metadata"]["providerName"], "test-provider");
    assert_eq!(document["metadata"]["dimensions"], 3);
    assert_eq!(document["metadata"]["embeddingCount"], 1);

    let record = &document["embeddings"][0];
    assert_eq!(record["type"], "function");
    assert_eq!(record["contentSummary"], "Parse input");
    assert_eq!(record["metadata"]["language"], "rust");

    // Atomic rewrite leaves only the index file behind
    let entries = fs::read_dir(expected_path.parent().unwrap()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn test_corrupted_index_degrades_to_empty() {
    let provider = TestProvider::new(3);
    let (mut store, temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![function("a", "a.rs", unit(3, 0))])
        .unwrap();

    fs::write(store.index_path(), b"\x00\x01 definitely not json").unwrap();

    let reopened = EmbeddingStore::new(temp_dir.path(), "test-repo", provider.descriptor());
    assert_eq!(reopened.count().unwrap(), 0);
    assert!(reopened.load_embeddings().unwrap().is_empty());

    // A new save replaces the damaged file
    let mut reopened = reopened;
    reopened
        .save_embeddings(vec![function("b", "b.rs", unit(3, 1))])
        .unwrap();
    assert_eq!(reopened.count().unwrap(), 1);
}

#[test]
fn test_repositories_are_isolated() {
    let provider = TestProvider::new(3);
    let (mut store_a, temp_dir) = open_store(&provider);
    let mut store_b = EmbeddingStore::new(temp_dir.path(), "other-repo", provider.descriptor());
    store_b.initialize().unwrap();

    store_a
        .save_embeddings(vec![function("a", "a.rs", unit(3, 0))])
        .unwrap();
    store_b
        .save_embeddings(vec![
            function("b1", "b.rs", unit(3, 1)),
            function("b2", "b.rs", unit(3, 2)),
        ])
        .unwrap();

    assert_eq!(store_a.count().unwrap(), 1);
    assert_eq!(store_b.count().unwrap(), 2);
    assert_ne!(store_a.index_path(), store_b.index_path());
}

#[test]
fn test_compatibility_against_existing_index() {
    let large = TestProvider::new(1536).named("remote-large");
    let (mut store, _temp_dir) = open_store(&large);
    store
        .save_embeddings(vec![function("a", "a.rs", unit(1536, 0))])
        .unwrap();
    let metadata = store.load_index().unwrap().unwrap();

    let small = TestProvider::new(768).named("remote-small");
    let hard = store.check_compatibility(&small, &metadata);
    assert!(!hard.compatible);
    assert!(hard.requires_rebuild);
    assert_eq!(hard.existing_dimensions, 1536);
    assert_eq!(hard.existing_provider, "remote-large");

    let same_size = TestProvider::new(1536).named("other-vendor");
    let soft = store.check_compatibility(&same_size, &metadata);
    assert!(!soft.compatible);
    assert!(!soft.requires_rebuild);
    assert!(soft.reason.is_some());

    let same = store.check_compatibility(&large, &metadata);
    assert!(same.compatible);
    assert!(!same.requires_rebuild);
}

#[test]
fn test_mismatched_dimensions_are_rejected_on_save() {
    let provider = TestProvider::new(3);
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![function("a", "a.rs", unit(3, 0))])
        .unwrap();

    let result = store.save_embeddings(vec![function("b", "b.rs", vec![1.0, 0.0])]);
    assert!(matches!(
        result,
        Err(StoreError::DimensionMismatch {
            expected: 3,
            actual: 2,
            ..
        })
    ));
    assert_eq!(store.count().unwrap(), 1);
}
