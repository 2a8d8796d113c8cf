//! Test: settings files feeding the store and the search engine

use crate::common::{TestProvider, function};
use coderag::{EmbeddingStore, Settings, SimilaritySearchEngine};
use std::fs;
use tempfile::TempDir;

const QUERY: &str = "load settings";

#[tokio::test]
async fn test_settings_drive_store_and_search() {
    let temp_dir = TempDir::new().unwrap();
    let index_root = temp_dir.path().join("indexes");
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[storage]
root_dir = '{}'
repository_id = "acme/service"

[search]
default_k = 2
min_similarity = 0.5
enable_ranking = true

[ranking]
similarity_weight = 0.2
recency_weight = 0.0
tag_weight = 0.8
complexity_weight = 0.0
"#,
            index_root.display()
        ),
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert_eq!(settings.storage_root(), index_root);
    assert_eq!(settings.repository_id(), "acme/service");

    let provider = TestProvider::new(2).with(QUERY, vec![1.0, 0.0]);
    let mut store = EmbeddingStore::new(
        settings.storage_root(),
        &settings.repository_id(),
        coderag::EmbeddingProvider::descriptor(&provider),
    );
    store.initialize().unwrap();
    store
        .save_embeddings(vec![
            function("exact", "src/a.rs", vec![1.0, 0.0]),
            function("tagged", "src/b.rs", vec![0.8, 0.6]).with_tags(["config"]),
            function("unrelated", "src/c.rs", vec![0.0, 1.0]).with_tags(["config"]),
        ])
        .unwrap();
    assert!(store.index_path().starts_with(&index_root));

    let engine = SimilaritySearchEngine::new(&store, &provider).with_ranking_config(settings.ranking);
    let mut options = settings.search_options();
    options.boost_tags = vec!["config".to_string()];

    let response = engine.search(QUERY, &options).await.unwrap();

    // The threshold drops the orthogonal record, then the tag boost
    // outweighs the similarity gap between the remaining two.
    let ids: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.embedding.id.as_str())
        .collect();
    assert_eq!(ids, vec!["tagged", "exact"]);
    assert_eq!(response.stats.total_embeddings, 3);
}

#[test]
fn test_init_then_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();

    let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.search.default_k, 10);
    assert_eq!(settings.provider.model, "AllMiniLML6V2");

    let mut edited = fs::read_to_string(&path).unwrap();
    edited = edited.replace("default_k = 10", "default_k = 3");
    fs::write(&path, edited).unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.search.default_k, 3);
}

#[test]
fn test_negative_weight_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(&config_path, "[ranking]\nrecency_weight = -0.5\n").unwrap();

    let err = Settings::load_from(&config_path).unwrap_err();
    assert!(err.to_string().contains("recency_weight"));
}
