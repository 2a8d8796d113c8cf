//! Record filters for filtered loads.
//!
//! All provided predicates must hold (AND semantics); an omitted predicate
//! imposes no constraint. `file_pattern` is caller supplied, so it is compiled
//! with bounded program and DFA sizes. The `regex` engine matches in linear
//! time, which rules out catastrophic backtracking.

use crate::error::{StoreError, StoreResult};
use crate::types::{CodeEmbedding, EmbeddingType};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Longest accepted `file_pattern`, in bytes
pub const MAX_PATTERN_LEN: usize = 1024;

/// Upper bound for the compiled regex program
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Upper bound for the lazy DFA cache
const REGEX_DFA_SIZE_LIMIT: usize = 2 << 20;

/// Filters accepted by `EmbeddingStore::load_embeddings_with_filters`.
///
/// Unknown keys are ignored when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingFilters {
    /// Exact match on `metadata.language`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Exact match on the record type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub embedding_type: Option<EmbeddingType>,

    /// Regular expression tested against `source`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_complexity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_complexity: Option<f64>,
}

impl EmbeddingFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn embedding_type(mut self, embedding_type: EmbeddingType) -> Self {
        self.embedding_type = Some(embedding_type);
        self
    }

    pub fn file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = Some(pattern.into());
        self
    }

    pub fn complexity_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_complexity = min;
        self.max_complexity = max;
        self
    }

    /// True when no predicate is set
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.embedding_type.is_none()
            && self.file_pattern.is_none()
            && self.min_complexity.is_none()
            && self.max_complexity.is_none()
    }

    /// Validate the filters and compile the file pattern once.
    pub fn compile(&self) -> StoreResult<CompiledFilters<'_>> {
        let pattern = self
            .file_pattern
            .as_deref()
            .map(compile_file_pattern)
            .transpose()?;

        Ok(CompiledFilters {
            filters: self,
            pattern,
        })
    }
}

/// Filters with the file pattern compiled, ready to test records
#[derive(Debug)]
pub struct CompiledFilters<'a> {
    filters: &'a EmbeddingFilters,
    pattern: Option<Regex>,
}

impl CompiledFilters<'_> {
    pub fn matches(&self, record: &CodeEmbedding) -> bool {
        let f = self.filters;

        if let Some(language) = &f.language {
            if record.metadata.language != *language {
                return false;
            }
        }
        if let Some(embedding_type) = f.embedding_type {
            if record.embedding_type != embedding_type {
                return false;
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&record.source) {
                return false;
            }
        }
        if let Some(min) = f.min_complexity {
            if record.metadata.complexity < min {
                return false;
            }
        }
        if let Some(max) = f.max_complexity {
            if record.metadata.complexity > max {
                return false;
            }
        }

        true
    }
}

fn compile_file_pattern(pattern: &str) -> StoreResult<Regex> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(StoreError::InvalidFilter {
            pattern: pattern.chars().take(64).collect(),
            reason: format!("pattern is longer than {MAX_PATTERN_LEN} bytes"),
        });
    }

    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_DFA_SIZE_LIMIT)
        .build()
        .map_err(|e| StoreError::InvalidFilter {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}
