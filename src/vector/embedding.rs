//! Embedding providers.
//!
//! The store and the search engine only depend on the `EmbeddingProvider`
//! capability. `FastEmbedProvider` is the local backend shipped with the CLI;
//! remote backends implement the same trait elsewhere.

use crate::error::{ProviderError, ProviderResult};
use crate::types::ProviderDescriptor;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

/// Capability for turning text into vectors.
///
/// Implementations must return vectors of exactly `dimensions()` elements.
/// Neither the store nor the search engine retries or times out calls; that
/// belongs to the provider or its caller.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    fn generate_embedding(
        &self,
        text: &str,
    ) -> impl Future<Output = ProviderResult<Vec<f32>>> + Send;

    /// Generate embeddings for several texts, one vector per input in order
    fn generate_bulk_embeddings(
        &self,
        texts: &[&str],
    ) -> impl Future<Output = ProviderResult<Vec<Vec<f32>>>> + Send;

    /// Length of the produced vectors
    fn dimensions(&self) -> usize;

    fn model(&self) -> &str;

    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Round-trip a tiny request to verify the backend answers
    fn test_connection(&self) -> impl Future<Output = bool> + Send;

    /// Estimated cost in USD for embedding `tokens` tokens
    fn estimate_cost(&self, tokens: usize) -> f64;

    /// `{name, model, dimensions}` identity recorded in index metadata
    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(self.name(), self.model(), self.dimensions())
    }
}

/// Local provider backed by fastembed.
///
/// Models are downloaded on first use into the configured models directory
/// and run in-process, so requests cost nothing.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .field("model", &"<TextEmbedding>")
            .finish()
    }
}

impl FastEmbedProvider {
    pub const NAME: &'static str = "fastembed";

    /// Load `model_name` (e.g. `AllMiniLML6V2`) from `cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the model name is unknown or the model fails to
    /// initialize or download.
    pub fn new(model_name: &str, cache_dir: PathBuf, show_progress: bool) -> ProviderResult<Self> {
        let model = parse_embedding_model(model_name).ok_or_else(|| {
            ProviderError::ModelInit(format!(
                "Unknown embedding model '{model_name}'. Supported: {}",
                SUPPORTED_MODELS.join(", ")
            ))
        })?;

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model.clone())
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_progress),
        )
        .map_err(|e| ProviderError::ModelInit(format!(
            "{e}. Ensure you have internet connection for first-time model download"
        )))?;

        // Dimensions come from a probe embedding rather than a lookup table
        let probe = text_model
            .embed(vec!["test"], None)
            .map_err(|e| ProviderError::ModelInit(e.to_string()))?;
        let dimensions = probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| ProviderError::InvalidResponse("empty probe embedding".to_string()))?;

        tracing::debug!(model = model_name, dimensions, "loaded fastembed model");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: model_to_string(&model).to_string(),
            dimensions,
        })
    }

    fn embed(&self, texts: Vec<String>) -> ProviderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                ProviderError::Request(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts, None)
            .map_err(|e| ProviderError::Request(format!("Failed to generate embeddings: {e}")))?;

        if embeddings.len() != expected {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {expected} embeddings, got {}",
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                bad.len()
            )));
        }

        Ok(embeddings)
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    async fn generate_embedding(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.embed(vec![text.to_string()])?
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn generate_bulk_embeddings(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        self.embed(texts.iter().map(|s| s.to_string()).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn test_connection(&self) -> bool {
        self.embed(vec!["test".to_string()]).is_ok()
    }

    fn estimate_cost(&self, _tokens: usize) -> f64 {
        0.0
    }
}

/// Provider for commands that read an index without embedding new text.
///
/// It reports a fixed identity and refuses every embedding request, so no
/// model has to be loaded to list, filter or compare stored records.
#[derive(Debug, Clone)]
pub struct OfflineProvider {
    descriptor: ProviderDescriptor,
}

impl OfflineProvider {
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }

    fn refuse(&self) -> ProviderError {
        ProviderError::Unavailable {
            name: self.descriptor.name.clone(),
            reason: "the embedding model is not loaded for this command".to_string(),
        }
    }
}

impl EmbeddingProvider for OfflineProvider {
    async fn generate_embedding(&self, _text: &str) -> ProviderResult<Vec<f32>> {
        Err(self.refuse())
    }

    async fn generate_bulk_embeddings(&self, _texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        Err(self.refuse())
    }

    fn dimensions(&self) -> usize {
        self.descriptor.dimensions
    }

    fn model(&self) -> &str {
        &self.descriptor.model
    }

    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn test_connection(&self) -> bool {
        false
    }

    fn estimate_cost(&self, _tokens: usize) -> f64 {
        0.0
    }

    fn descriptor(&self) -> ProviderDescriptor {
        self.descriptor.clone()
    }
}

/// Model names accepted in settings
pub const SUPPORTED_MODELS: &[&str] = &[
    "AllMiniLML6V2",
    "AllMiniLML12V2",
    "BGESmallENV15",
    "BGEBaseENV15",
    "BGELargeENV15",
    "NomicEmbedTextV15",
    "MultilingualE5Small",
    "MultilingualE5Base",
    "MultilingualE5Large",
];

/// Parse a model name from settings into a fastembed model
pub fn parse_embedding_model(name: &str) -> Option<EmbeddingModel> {
    match name {
        "AllMiniLML6V2" => Some(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Some(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Some(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Some(EmbeddingModel::BGEBaseENV15),
        "BGELargeENV15" => Some(EmbeddingModel::BGELargeENV15),
        "NomicEmbedTextV15" => Some(EmbeddingModel::NomicEmbedTextV15),
        "MultilingualE5Small" => Some(EmbeddingModel::MultilingualE5Small),
        "MultilingualE5Base" => Some(EmbeddingModel::MultilingualE5Base),
        "MultilingualE5Large" => Some(EmbeddingModel::MultilingualE5Large),
        _ => None,
    }
}

/// Output dimensions of a supported model, without loading it
pub fn model_dimensions(name: &str) -> Option<usize> {
    match name {
        "AllMiniLML6V2" | "AllMiniLML12V2" | "BGESmallENV15" | "MultilingualE5Small" => Some(384),
        "BGEBaseENV15" | "NomicEmbedTextV15" | "MultilingualE5Base" => Some(768),
        "BGELargeENV15" | "MultilingualE5Large" => Some(1024),
        _ => None,
    }
}

/// Settings name of a fastembed model
pub fn model_to_string(model: &EmbeddingModel) -> &'static str {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2",
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2",
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15",
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15",
        EmbeddingModel::BGELargeENV15 => "BGELargeENV15",
        EmbeddingModel::NomicEmbedTextV15 => "NomicEmbedTextV15",
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small",
        EmbeddingModel::MultilingualE5Base => "MultilingualE5Base",
        EmbeddingModel::MultilingualE5Large => "MultilingualE5Large",
        _ => "Unknown",
    }
}

/// Deterministic provider for unit tests.
///
/// Known texts map to fixed vectors; any other text gets the fallback
/// vector, or an error when the provider is marked failing.
#[cfg(test)]
pub struct MockEmbeddingProvider {
    name: String,
    dimensions: usize,
    responses: std::collections::HashMap<String, Vec<f32>>,
    failing: bool,
}

#[cfg(test)]
impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            name: "mock".to_string(),
            dimensions,
            responses: std::collections::HashMap::new(),
            failing: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_response(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.responses.insert(text.to_string(), vector);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn lookup(&self, text: &str) -> ProviderResult<Vec<f32>> {
        if self.failing {
            return Err(ProviderError::Request("mock provider failure".to_string()));
        }
        Ok(self.responses.get(text).cloned().unwrap_or_else(|| {
            let mut fallback = vec![0.0; self.dimensions];
            if let Some(first) = fallback.first_mut() {
                *first = 1.0;
            }
            fallback
        }))
    }
}

#[cfg(test)]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn generate_embedding(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.lookup(text)
    }

    async fn generate_bulk_embeddings(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.lookup(text)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        !self.failing
    }

    async fn test_connection(&self) -> bool {
        !self.failing
    }

    fn estimate_cost(&self, tokens: usize) -> f64 {
        tokens as f64 * 0.000_000_02
    }
}
