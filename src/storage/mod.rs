//! Persistent storage of code embeddings, one index per repository.

mod filters;
mod metadata;
mod persistence;
mod store;

pub use filters::{CompiledFilters, EmbeddingFilters, MAX_PATTERN_LEN};
pub use metadata::{CompatibilityCheck, IndexMetadata, IndexStats};
pub use persistence::{
    INDEX_FILE_NAME, INDEX_FORMAT_VERSION, IndexPersistence, RawIndex, repository_key,
};
pub use store::{EmbeddingStore, OptimizeReport};
