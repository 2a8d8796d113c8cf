//! Error types for the embedding index and search engine
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the persistent embedding store
#[derive(Error, Debug)]
pub enum StoreError {
    /// File system errors while reading or writing the index
    #[error("Failed to read index '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write index '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize index: {0}")]
    Serialization(String),

    /// Record validation errors
    #[error(
        "Embedding '{id}' has {actual} dimensions but the index expects {expected}. Rebuild the index with a single provider"
    )]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid embedding '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    /// Filter errors
    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },
}

impl StoreError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Read { .. } => "INDEX_READ_ERROR",
            Self::Write { .. } => "INDEX_WRITE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::InvalidFilter { .. } => "INVALID_FILTER",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Read { .. } => vec![
                "Check that the index directory exists and you have read permissions",
                "Run 'coderag clear' to discard the index if it cannot be recovered",
            ],
            Self::Write { .. } => vec![
                "Check disk space and write permissions in the storage directory",
                "The previous index file is left untouched when a write fails",
            ],
            Self::DimensionMismatch { .. } => vec![
                "Run 'coderag check' to compare the index with the configured provider",
                "Run 'coderag clear' and re-index with a single embedding model",
            ],
            Self::InvalidFilter { .. } => vec![
                "File patterns are regular expressions, escape literal dots with '\\.'",
                "Keep patterns short; very large patterns are rejected",
            ],
            _ => vec![],
        }
    }
}

/// Errors raised by an embedding provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Embedding provider '{name}' is not available: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Embedding provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors raised while searching
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(
        "Query embedding has {actual} dimensions but the index expects {expected}. Run 'coderag check'"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

impl SearchError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::Store(e) => e.status_code(),
            Self::Provider(_) => "PROVIDER_ERROR".to_string(),
            Self::DimensionMismatch { .. } => "QUERY_DIMENSION_MISMATCH".to_string(),
        }
    }
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;
