//! Shared fixtures for integration tests
#![allow(dead_code)]

use coderag::{
    CodeEmbedding, EmbeddingProvider, EmbeddingStore, EmbeddingType, ProviderError,
    ProviderResult,
};
use std::collections::HashMap;
use tempfile::TempDir;

/// Deterministic provider: known texts map to fixed vectors, anything else
/// embeds to the first unit vector.
pub struct TestProvider {
    name: String,
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    failing: bool,
}

impl TestProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            name: "test-provider".to_string(),
            dimensions,
            vectors: HashMap::new(),
            failing: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        if self.failing {
            return Err(ProviderError::Request("connection reset".to_string()));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| unit(self.dimensions, 0)))
    }
}

impl EmbeddingProvider for TestProvider {
    async fn generate_embedding(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.embed(text)
    }

    async fn generate_bulk_embeddings(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "test-model"
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

    fn estimate_cost(&self, _tokens: usize) -> f64 {
        0.0
    }
}

/// Vector of `dimensions` zeros with a 1.0 at `axis`
pub fn unit(dimensions: usize, axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0; dimensions];
    vector[axis] = 1.0;
    vector
}

pub fn function(id: &str, source: &str, vector: Vec<f32>) -> CodeEmbedding {
    CodeEmbedding::new(id, EmbeddingType::Function, source, vector)
        .with_content(format!("fn {id}() {{}}"))
}

/// Initialized store for `provider` in a fresh temp dir
pub fn open_store<P: EmbeddingProvider>(provider: &P) -> (EmbeddingStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut store = EmbeddingStore::new(temp_dir.path(), "test-repo", provider.descriptor());
    store.initialize().expect("Failed to initialize store");
    (store, temp_dir)
}
