//! Embedding providers and vector math.
//!
//! Providers are used generically (`P: EmbeddingProvider`); the trait's async
//! methods return `impl Future` so it is not object safe.

mod embedding;
mod similarity;

#[cfg(test)]
pub use embedding::MockEmbeddingProvider;
pub use embedding::{
    EmbeddingProvider, FastEmbedProvider, OfflineProvider, SUPPORTED_MODELS, model_dimensions,
    model_to_string, parse_embedding_model,
};
pub(crate) use similarity::cosine_similarity_with_norm;
pub use similarity::{cosine_similarity, magnitude};
