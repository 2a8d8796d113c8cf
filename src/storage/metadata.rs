//! Metadata tracking for a repository's embedding index
//!
//! The metadata records which provider produced the vectors so that a later
//! run can tell whether the stored index is still usable with the configured
//! provider.

use crate::types::ProviderDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside the records of one repository index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    /// Name of the provider that produced the embeddings
    pub provider_name: String,

    /// Model used by that provider
    pub model: String,

    /// Length of every stored vector
    pub dimensions: usize,

    pub embedding_count: usize,

    /// Approximate payload size of all records
    pub total_size_bytes: u64,

    pub created_at: DateTime<Utc>,

    pub last_updated_at: DateTime<Utc>,
}

impl IndexMetadata {
    /// Create metadata for a fresh, empty index
    pub fn new(descriptor: &ProviderDescriptor) -> Self {
        let now = Utc::now();
        Self {
            provider_name: descriptor.name.clone(),
            model: descriptor.model.clone(),
            dimensions: descriptor.dimensions,
            embedding_count: 0,
            total_size_bytes: 0,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Update counts and bump the update timestamp
    pub fn update(&mut self, embedding_count: usize, total_size_bytes: u64) {
        self.embedding_count = embedding_count;
        self.total_size_bytes = total_size_bytes;
        self.last_updated_at = Utc::now();
    }

    /// Provider identity recorded in this index
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(&self.provider_name, &self.model, self.dimensions)
    }

    /// Compare this index against the provider that is about to query it.
    pub fn compatibility_with(&self, provider: &ProviderDescriptor) -> CompatibilityCheck {
        let (compatible, requires_rebuild, reason) = if self.dimensions != provider.dimensions {
            (
                false,
                true,
                Some(format!(
                    "Dimension mismatch: index has {} dimensions, provider '{}' produces {}. The index must be rebuilt",
                    self.dimensions, provider.name, provider.dimensions
                )),
            )
        } else if self.provider_name != provider.name {
            (
                false,
                false,
                Some(format!(
                    "Provider changed from '{}' to '{}'. Search still works but results may be less relevant until the index is rebuilt",
                    self.provider_name, provider.name
                )),
            )
        } else {
            (true, false, None)
        };

        CompatibilityCheck {
            compatible,
            requires_rebuild,
            reason,
            existing_provider: self.provider_name.clone(),
            existing_dimensions: self.dimensions,
        }
    }
}

/// Advisory outcome of comparing an index with a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityCheck {
    pub compatible: bool,

    /// Similarity against mixed dimensionality is undefined, so the caller
    /// must rebuild before searching when this is set
    pub requires_rebuild: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub existing_provider: String,
    pub existing_dimensions: usize,
}

/// Summary of the persisted state of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub embedding_count: usize,
    pub total_size_bytes: u64,
    pub dimensions: usize,
    /// Size of the index file on disk
    pub file_size_bytes: u64,
}
