//! Brute-force similarity search over an `EmbeddingStore`
//!
//! Every query scores all candidates. The engine only reads from the store;
//! the provider is called once per text query to vectorize it.

use crate::error::{ProviderError, SearchError, SearchResult};
use crate::semantic::{
    CoverageStats, DiverseSearchOptions, RankedEmbedding, RankingConfig, SearchOptions,
    SearchResponse, SearchStats,
};
use crate::storage::{EmbeddingFilters, EmbeddingStore};
use crate::types::CodeEmbedding;
use crate::vector::{EmbeddingProvider, cosine_similarity_with_norm, magnitude};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Ranks stored records by relevance to a query
#[derive(Debug)]
pub struct SimilaritySearchEngine<'a, P> {
    store: &'a EmbeddingStore,
    provider: &'a P,
    ranking: RankingConfig,
}

/// Outcome of scoring one candidate set
struct Scored {
    results: Vec<RankedEmbedding>,
    total: usize,
    average_similarity: f32,
}

impl<'a, P: EmbeddingProvider> SimilaritySearchEngine<'a, P> {
    pub fn new(store: &'a EmbeddingStore, provider: &'a P) -> Self {
        Self {
            store,
            provider,
            ranking: RankingConfig::default(),
        }
    }

    pub fn with_ranking_config(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn ranking_config(&self) -> &RankingConfig {
        &self.ranking
    }

    /// Vectorize `query` and return the best matching records.
    ///
    /// Provider failures propagate unchanged. A query vector whose length
    /// differs from the index dimensions is rejected.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> SearchResult<SearchResponse> {
        let started = Instant::now();

        let query_vector = self.provider.generate_embedding(query).await?;
        self.check_query_vector(&query_vector)?;

        let candidates = self.load_candidates(options.filters.as_ref())?;
        let scored = self.score(&query_vector, candidates, options, Some(options.k));

        let stats = SearchStats {
            total_embeddings: scored.total,
            search_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            average_similarity: scored.average_similarity,
        };

        tracing::debug!(
            query,
            candidates = stats.total_embeddings,
            returned = scored.results.len(),
            elapsed_ms = stats.search_time_ms,
            "semantic search finished"
        );

        Ok(SearchResponse {
            results: scored.results,
            stats,
        })
    }

    /// Records most similar to `target`, never including `target` itself
    pub fn find_similar_to_embedding(
        &self,
        target: &CodeEmbedding,
        k: usize,
    ) -> SearchResult<Vec<RankedEmbedding>> {
        self.check_query_vector(&target.embedding)?;

        let candidates: Vec<CodeEmbedding> = self
            .store
            .load_embeddings()?
            .into_iter()
            .filter(|candidate| candidate.id != target.id)
            .collect();

        let options = SearchOptions::new(k);
        Ok(self
            .score(&target.embedding, candidates, &options, Some(k))
            .results)
    }

    /// Records whose `source` equals `path` exactly
    pub fn find_by_file(&self, path: &str) -> SearchResult<Vec<CodeEmbedding>> {
        Ok(self
            .store
            .load_embeddings()?
            .into_iter()
            .filter(|record| record.source == path)
            .collect())
    }

    /// Records carrying all of `tags` (`match_all`) or any of them.
    ///
    /// An empty tag list matches every record with `match_all` and none
    /// without it.
    pub fn find_by_tags<S: AsRef<str>>(
        &self,
        tags: &[S],
        match_all: bool,
    ) -> SearchResult<Vec<CodeEmbedding>> {
        let has = |record: &CodeEmbedding, tag: &S| record.metadata.tags.contains(tag.as_ref());

        Ok(self
            .store
            .load_embeddings()?
            .into_iter()
            .filter(|record| {
                if match_all {
                    tags.iter().all(|tag| has(record, tag))
                } else {
                    tags.iter().any(|tag| has(record, tag))
                }
            })
            .collect())
    }

    /// Records with `min <= complexity <= max`
    pub fn find_by_complexity(&self, min: f64, max: f64) -> SearchResult<Vec<CodeEmbedding>> {
        Ok(self
            .store
            .load_embeddings()?
            .into_iter()
            .filter(|record| (min..=max).contains(&record.metadata.complexity))
            .collect())
    }

    /// Search, then pick results in rank order with at most
    /// `max_per_file` results per source file.
    pub async fn search_diverse(
        &self,
        query: &str,
        options: &DiverseSearchOptions,
    ) -> SearchResult<SearchResponse> {
        let started = Instant::now();
        let search = &options.search;

        let query_vector = self.provider.generate_embedding(query).await?;
        self.check_query_vector(&query_vector)?;

        let candidates = self.load_candidates(search.filters.as_ref())?;
        let scored = self.score(&query_vector, candidates, search, None);
        let results = select_diverse(scored.results, search.k, options.max_per_file);

        let stats = SearchStats {
            total_embeddings: scored.total,
            search_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            average_similarity: scored.average_similarity,
        };

        tracing::debug!(
            query,
            candidates = stats.total_embeddings,
            returned = results.len(),
            max_per_file = options.max_per_file,
            "diverse search finished"
        );

        Ok(SearchResponse { results, stats })
    }

    /// Counts by type and language plus the modification time range
    pub fn get_coverage_stats(&self) -> SearchResult<CoverageStats> {
        let records = self.store.load_embeddings()?;

        let mut by_type = BTreeMap::new();
        let mut by_language = BTreeMap::new();
        for record in &records {
            *by_type.entry(record.embedding_type).or_insert(0) += 1;
            *by_language
                .entry(record.metadata.language.clone())
                .or_insert(0) += 1;
        }

        let modified = records.iter().map(|r| r.metadata.last_modified);
        Ok(CoverageStats {
            total_embeddings: records.len(),
            by_type,
            by_language,
            oldest_embedding: modified.clone().min(),
            newest_embedding: modified.max(),
        })
    }

    fn load_candidates(&self, filters: Option<&EmbeddingFilters>) -> SearchResult<Vec<CodeEmbedding>> {
        let candidates = match filters {
            Some(filters) if !filters.is_empty() => {
                self.store.load_embeddings_with_filters(filters)?
            }
            _ => self.store.load_embeddings()?,
        };
        Ok(candidates)
    }

    fn check_query_vector(&self, query: &[f32]) -> SearchResult<()> {
        // NaN would sort above every real score under total_cmp
        if query.iter().any(|x| !x.is_finite()) {
            return Err(ProviderError::InvalidResponse(
                "query embedding contains non-finite components".to_string(),
            )
            .into());
        }
        if let Some(metadata) = self.store.load_index()? {
            if metadata.dimensions != query.len() {
                return Err(SearchError::DimensionMismatch {
                    expected: metadata.dimensions,
                    actual: query.len(),
                });
            }
        }
        Ok(())
    }

    /// Score, threshold, sort, truncate and optionally rank `candidates`
    fn score(
        &self,
        query: &[f32],
        candidates: Vec<CodeEmbedding>,
        options: &SearchOptions,
        limit: Option<usize>,
    ) -> Scored {
        let query_norm = magnitude(query);

        let mut results: Vec<RankedEmbedding> = candidates
            .into_iter()
            .map(|embedding| RankedEmbedding {
                similarity: cosine_similarity_with_norm(query, query_norm, &embedding.embedding),
                embedding,
                relevance_score: None,
                ranking_factors: None,
            })
            .collect();

        let total = results.len();
        let average_similarity = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.similarity).sum::<f32>() / total as f32
        };

        if let Some(min_similarity) = options.min_similarity {
            results.retain(|r| r.similarity >= min_similarity);
        }

        // Stable: equal scores keep the store's id order
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        if let Some(limit) = limit {
            results.truncate(limit);
        }

        if options.enable_ranking {
            let now = Utc::now();
            for result in &mut results {
                let factors = self.ranking.factors(
                    &result.embedding,
                    result.similarity,
                    &options.boost_tags,
                    now,
                );
                result.relevance_score = Some(self.ranking.relevance(&factors));
                result.ranking_factors = Some(factors);
            }
            results.sort_by(|a, b| b.score().total_cmp(&a.score()));
        }

        Scored {
            results,
            total,
            average_similarity,
        }
    }
}

/// Greedy pass in rank order, skipping results whose file is at its cap
fn select_diverse(
    ranked: Vec<RankedEmbedding>,
    k: usize,
    max_per_file: usize,
) -> Vec<RankedEmbedding> {
    let mut per_file: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(k.min(ranked.len()));

    for result in ranked {
        if selected.len() >= k {
            break;
        }
        let taken = per_file.entry(result.embedding.source.clone()).or_insert(0);
        if *taken >= max_per_file {
            continue;
        }
        *taken += 1;
        selected.push(result);
    }

    selected
}
