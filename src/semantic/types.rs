//! Search options and result types

use crate::semantic::RankingFactors;
use crate::storage::EmbeddingFilters;
use crate::types::{CodeEmbedding, EmbeddingType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of results returned when no `k` is given
pub const DEFAULT_K: usize = 10;

/// Per-file cap used by diverse search when none is given
pub const DEFAULT_MAX_PER_FILE: usize = 2;

/// Options for `SimilaritySearchEngine::search`
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub k: usize,
    /// Candidates scoring below this are dropped; `None` keeps everything
    pub min_similarity: Option<f32>,
    pub filters: Option<EmbeddingFilters>,
    pub enable_ranking: bool,
    /// Tags that raise the tag-match factor when ranking is enabled
    pub boost_tags: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            min_similarity: None,
            filters: None,
            enable_ranking: false,
            boost_tags: Vec::new(),
        }
    }
}

impl SearchOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn with_filters(mut self, filters: EmbeddingFilters) -> Self {
        self.filters = (!filters.is_empty()).then_some(filters);
        self
    }

    pub fn with_ranking(mut self, boost_tags: Vec<String>) -> Self {
        self.enable_ranking = true;
        self.boost_tags = boost_tags;
        self
    }
}

/// Options for `SimilaritySearchEngine::search_diverse`
#[derive(Debug, Clone, PartialEq)]
pub struct DiverseSearchOptions {
    /// Pipeline options; `search.k` is the number of results to select
    pub search: SearchOptions,
    pub max_per_file: usize,
}

impl Default for DiverseSearchOptions {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            max_per_file: DEFAULT_MAX_PER_FILE,
        }
    }
}

impl DiverseSearchOptions {
    pub fn new(k: usize, max_per_file: usize) -> Self {
        Self {
            search: SearchOptions::new(k),
            max_per_file,
        }
    }

    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }
}

/// A stored record paired with its score for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEmbedding {
    pub embedding: CodeEmbedding,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_factors: Option<RankingFactors>,
}

impl RankedEmbedding {
    /// Score results are ordered by: relevance when ranked, else similarity
    pub fn score(&self) -> f32 {
        self.relevance_score.unwrap_or(self.similarity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    /// Candidates scored, before threshold and truncation
    pub total_embeddings: usize,
    pub search_time_ms: f64,
    /// Mean similarity over every scored candidate
    pub average_similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RankedEmbedding>,
    pub stats: SearchStats,
}

/// Aggregate view of what the index covers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub total_embeddings: usize,
    pub by_type: BTreeMap<EmbeddingType, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub oldest_embedding: Option<DateTime<Utc>>,
    pub newest_embedding: Option<DateTime<Utc>>,
}
