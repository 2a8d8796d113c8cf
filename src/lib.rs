//! Persistent code-embedding index with similarity search.
//!
//! `storage::EmbeddingStore` keeps the vectorized code units of one repository
//! on disk; `semantic::SimilaritySearchEngine` ranks them against a query
//! embedded by any `vector::EmbeddingProvider`.

pub mod config;
pub mod display;
pub mod error;
pub mod semantic;
pub mod storage;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{
    ConfigError, ProviderError, ProviderResult, SearchError, SearchResult, StoreError,
    StoreResult,
};
pub use semantic::{
    CoverageStats, DiverseSearchOptions, RankedEmbedding, RankingConfig, SearchOptions,
    SearchResponse, SimilaritySearchEngine,
};
pub use storage::{CompatibilityCheck, EmbeddingFilters, EmbeddingStore, IndexMetadata, IndexStats};
pub use types::{CodeEmbedding, EmbeddingMetadata, EmbeddingType, ProviderDescriptor};
pub use vector::{EmbeddingProvider, FastEmbedProvider, OfflineProvider, cosine_similarity};
