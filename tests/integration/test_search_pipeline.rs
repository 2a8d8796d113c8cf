//! Test: SimilaritySearchEngine over a persisted store

use crate::common::{TestProvider, function, open_store, unit};
use coderag::semantic::thresholds;
use coderag::types::ProviderDescriptor;
use coderag::{
    DiverseSearchOptions, EmbeddingFilters, OfflineProvider, ProviderError, RankingConfig,
    SearchError, SearchOptions, SimilaritySearchEngine,
};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;

const QUERY: &str = "where is the config parsed";

fn query_provider() -> TestProvider {
    TestProvider::new(3).with(QUERY, vec![1.0, 0.0, 0.0])
}

#[tokio::test]
async fn test_similarity_ordering() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("z_axis", "src/z.rs", vec![0.0, 0.0, 1.0]),
            function("mostly_y", "src/y.rs", vec![0.1, 0.9, 0.0]),
            function("mostly_x", "src/x.rs", vec![0.9, 0.1, 0.0]),
        ])
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    let response = engine.search(QUERY, &SearchOptions::default()).await.unwrap();

    let ids: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.embedding.id.as_str())
        .collect();
    assert_eq!(ids, vec!["mostly_x", "mostly_y", "z_axis"]);
    assert!(response.results[0].similarity > thresholds::VERY_SIMILAR);
    assert_eq!(response.results[2].similarity, 0.0);
    assert!(response.stats.search_time_ms >= 0.0);
}

#[tokio::test]
async fn test_threshold_is_a_subset() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(
            (0..20)
                .map(|i| {
                    let angle = i as f32 * 0.08;
                    function(
                        &format!("f{i:02}"),
                        &format!("src/{i}.rs"),
                        vec![angle.cos(), angle.sin(), 0.0],
                    )
                })
                .collect(),
        )
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    let loose = engine
        .search(QUERY, &SearchOptions::new(50).with_min_similarity(0.0))
        .await
        .unwrap();
    let strict = engine
        .search(QUERY, &SearchOptions::new(50).with_min_similarity(0.99))
        .await
        .unwrap();

    assert!(strict.results.len() < loose.results.len());
    for result in &strict.results {
        assert!(result.similarity >= 0.99);
        assert!(
            loose
                .results
                .iter()
                .any(|r| r.embedding.id == result.embedding.id)
        );
    }
    // Both runs scored the same candidates
    assert_eq!(strict.stats.total_embeddings, loose.stats.total_embeddings);
}

#[tokio::test]
async fn test_search_reflects_mutations() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("stale", "src/changed.rs", vec![1.0, 0.0, 0.0]),
            function("kept", "src/stable.rs", vec![0.5, 0.5, 0.0]),
        ])
        .unwrap();

    {
        let engine = SimilaritySearchEngine::new(&store, &provider);
        let before = engine.search(QUERY, &SearchOptions::default()).await.unwrap();
        assert_eq!(before.results[0].embedding.id, "stale");
    }

    store.invalidate_changed_files(&["src/changed.rs"]).unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    let after = engine.search(QUERY, &SearchOptions::default()).await.unwrap();
    assert_eq!(after.results.len(), 1);
    assert_eq!(after.results[0].embedding.id, "kept");
}

#[tokio::test]
async fn test_search_with_file_pattern_filter() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("api", "src/api/routes.rs", vec![1.0, 0.0, 0.0]),
            function("db", "src/db/pool.rs", vec![1.0, 0.0, 0.0]),
            function("test", "tests/api.rs", vec![1.0, 0.0, 0.0]),
        ])
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    let options = SearchOptions::default().with_filters(EmbeddingFilters::new().file_pattern(r"^src/api/"));
    let response = engine.search(QUERY, &options).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].embedding.id, "api");
}

#[tokio::test]
async fn test_diversity_cap() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("a1", "src/a.rs", vec![1.0, 0.0, 0.0]),
            function("a2", "src/a.rs", vec![0.9, 0.1, 0.0]),
            function("b1", "src/b.rs", vec![0.2, 0.8, 0.0]),
            function("b2", "src/b.rs", vec![0.1, 0.9, 0.0]),
        ])
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    let response = engine
        .search_diverse(QUERY, &DiverseSearchOptions::new(10, 1))
        .await
        .unwrap();

    let mut per_file: HashMap<&str, usize> = HashMap::new();
    for result in &response.results {
        *per_file.entry(result.embedding.source.as_str()).or_default() += 1;
    }
    assert_eq!(response.results.len(), 2);
    assert!(per_file.values().all(|&count| count <= 1));
    assert_eq!(response.stats.total_embeddings, 4);
}

#[test]
fn test_self_exclusion_for_every_record() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("a", "a.rs", vec![1.0, 0.0, 0.0]),
            function("b", "b.rs", vec![1.0, 0.0, 0.0]),
            function("c", "c.rs", vec![0.0, 1.0, 0.0]),
            function("d", "d.rs", vec![0.0, 0.0, 0.0]),
        ])
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    for target in store.load_embeddings().unwrap() {
        let results = engine.find_similar_to_embedding(&target, 10).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.embedding.id != target.id));
    }
}

#[test]
fn test_tag_semantics() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("both", "a.rs", unit(3, 0)).with_tags(["a", "b"]),
            function("only_a", "b.rs", unit(3, 0)).with_tags(["a"]),
            function("only_b", "c.rs", unit(3, 0)).with_tags(["b"]),
            function("none", "d.rs", unit(3, 0)),
        ])
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);

    let all: Vec<String> = engine
        .find_by_tags(&["a", "b"], true)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(all, vec!["both"]);

    let any: Vec<String> = engine
        .find_by_tags(&["a"], false)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(any, vec!["both", "only_a"]);
}

#[test]
fn test_coverage_aggregation() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    let january = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let june = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    store
        .save_embeddings(vec![
            function("old", "a.rs", unit(3, 0))
                .with_language("rust")
                .with_last_modified(january),
            function("new", "b.py", unit(3, 1))
                .with_language("python")
                .with_last_modified(june),
        ])
        .unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider);
    let coverage = engine.get_coverage_stats().unwrap();

    assert_eq!(coverage.total_embeddings, 2);
    assert_eq!(coverage.oldest_embedding, Some(january));
    assert_eq!(coverage.newest_embedding, Some(june));
    assert_eq!(coverage.by_language.get("python"), Some(&1));

    let json = serde_json::to_value(&coverage).unwrap();
    assert_eq!(json["byType"]["function"], 2);
}

#[tokio::test]
async fn test_ranking_with_custom_weights() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("closest", "a.rs", vec![1.0, 0.0, 0.0]).with_complexity(50.0),
            function("simple", "b.rs", vec![0.95, 0.05, 0.0]).with_complexity(0.0),
        ])
        .unwrap();

    // Complexity dominates similarity with these weights
    let ranking = RankingConfig {
        similarity_weight: 0.1,
        recency_weight: 0.0,
        tag_weight: 0.0,
        complexity_weight: 0.9,
        recency_half_life_days: 30.0,
    };
    ranking.validate().unwrap();

    let engine = SimilaritySearchEngine::new(&store, &provider).with_ranking_config(ranking);
    let response = engine
        .search(QUERY, &SearchOptions::default().with_ranking(Vec::new()))
        .await
        .unwrap();

    assert_eq!(response.results[0].embedding.id, "simple");
    let relevance: Vec<f32> = response
        .results
        .iter()
        .map(|r| r.relevance_score.unwrap())
        .collect();
    assert!(relevance[0] >= relevance[1]);
}

#[tokio::test]
async fn test_provider_failure_propagates() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![function("a", "a.rs", unit(3, 0))])
        .unwrap();

    let failing = TestProvider::new(3).failing();
    let engine = SimilaritySearchEngine::new(&store, &failing);
    let err = engine.search(QUERY, &SearchOptions::default()).await.unwrap_err();

    assert!(matches!(err, SearchError::Provider(ProviderError::Request(_))));
    assert_eq!(err.status_code(), "PROVIDER_ERROR");
}

#[tokio::test]
async fn test_offline_provider_serves_lookups_but_not_queries() {
    let provider = query_provider();
    let (mut store, _temp_dir) = open_store(&provider);
    store
        .save_embeddings(vec![
            function("a", "src/a.rs", unit(3, 0)).with_complexity(2.0),
            function("b", "src/b.rs", unit(3, 1)).with_complexity(8.0),
        ])
        .unwrap();

    let offline = OfflineProvider::new(ProviderDescriptor::new("test-provider", "test-model", 3));
    let engine = SimilaritySearchEngine::new(&store, &offline);

    assert_eq!(engine.find_by_file("src/b.rs").unwrap().len(), 1);
    assert_eq!(engine.find_by_complexity(0.0, 5.0).unwrap().len(), 1);

    let err = engine.search(QUERY, &SearchOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::Provider(ProviderError::Unavailable { .. })
    ));
}
