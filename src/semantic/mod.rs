//! Similarity search over stored code embeddings
//!
//! `SimilaritySearchEngine` scores every candidate record against a query
//! vector, then applies thresholds, filters, optional relevance ranking and
//! per-file diversity.

mod engine;
mod ranking;
mod types;

pub use engine::SimilaritySearchEngine;
pub use ranking::{RankingConfig, RankingFactors};
pub use types::{
    CoverageStats, DEFAULT_K, DEFAULT_MAX_PER_FILE, DiverseSearchOptions, RankedEmbedding,
    SearchOptions, SearchResponse, SearchStats,
};

/// Similarity threshold recommendations based on testing
pub mod thresholds {
    /// Threshold for very similar code (e.g., same concept, different wording)
    pub const VERY_SIMILAR: f32 = 0.75;

    /// Threshold for similar code (e.g., related concepts)
    pub const SIMILAR: f32 = 0.60;

    /// Threshold for somewhat related code
    pub const RELATED: f32 = 0.40;

    /// Default threshold for semantic search
    pub const DEFAULT: f32 = SIMILAR;
}
