//! Core record types shared by the store and the search engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of source unit an embedding was produced from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingType {
    Function,
    Class,
    File,
    Documentation,
}

impl EmbeddingType {
    pub const ALL: [EmbeddingType; 4] = [
        EmbeddingType::Function,
        EmbeddingType::Class,
        EmbeddingType::File,
        EmbeddingType::Documentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingType::Function => "function",
            EmbeddingType::Class => "class",
            EmbeddingType::File => "file",
            EmbeddingType::Documentation => "documentation",
        }
    }
}

impl fmt::Display for EmbeddingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "function" => Ok(EmbeddingType::Function),
            "class" => Ok(EmbeddingType::Class),
            "file" => Ok(EmbeddingType::File),
            "documentation" | "doc" | "docs" => Ok(EmbeddingType::Documentation),
            _ => Err("Unknown embedding type (expected function, class, file or documentation)"),
        }
    }
}

/// Descriptive metadata attached to every embedded unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingMetadata {
    #[serde(default)]
    pub symbol_name: String,

    #[serde(default)]
    pub language: String,

    /// Non-negative complexity score assigned by the chunker
    #[serde(default)]
    pub complexity: f64,

    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    #[serde(default)]
    pub exports: BTreeSet<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub last_modified: DateTime<Utc>,
}

/// One vectorized unit of source code.
///
/// Records are immutable from the store's point of view: saving a record
/// whose `id` already exists replaces the previous record entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEmbedding {
    /// Unique within one repository's index
    pub id: String,

    #[serde(rename = "type")]
    pub embedding_type: EmbeddingType,

    /// File path the unit originates from
    pub source: String,

    pub start_line: u32,
    pub end_line: u32,

    /// Text that was embedded
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub content_summary: String,

    pub embedding: Vec<f32>,

    pub metadata: EmbeddingMetadata,

    /// Content fingerprint used by external indexers for change detection
    #[serde(default)]
    pub hash: String,
}

impl CodeEmbedding {
    /// Create a record with empty content and default metadata.
    pub fn new(
        id: impl Into<String>,
        embedding_type: EmbeddingType,
        source: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            embedding_type,
            source: source.into(),
            start_line: 1,
            end_line: 1,
            content: String::new(),
            content_summary: String::new(),
            embedding,
            metadata: EmbeddingMetadata::default(),
            hash: String::new(),
        }
    }

    pub fn with_lines(mut self, start_line: u32, end_line: u32) -> Self {
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.content_summary = summary.into();
        self
    }

    pub fn with_symbol(mut self, symbol_name: impl Into<String>) -> Self {
        self.metadata.symbol_name = symbol_name.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.metadata.language = language.into();
        self
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.metadata.complexity = complexity;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.metadata.last_modified = last_modified;
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    /// Approximate payload size: vector bytes plus stored text.
    pub fn approximate_size_bytes(&self) -> u64 {
        (self.embedding.len() * std::mem::size_of::<f32>()
            + self.content.len()
            + self.content_summary.len()) as u64
    }

    /// Human readable location, e.g. `src/lib.rs:10-24`
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.source, self.start_line, self.end_line)
    }
}

/// Identity of the vectorization backend that produced an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub model: String,
    pub dimensions: usize,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            dimensions,
        }
    }
}
