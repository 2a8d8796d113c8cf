//! Persistent embedding store for one repository.
//!
//! Records live in an arena keyed by id, so merge-by-id and deletion do not
//! scan the record list. The parsed index is cached in memory; every mutating
//! call drops the cache and the next read re-parses the file.

use crate::error::{StoreError, StoreResult};
use crate::storage::{
    CompatibilityCheck, EmbeddingFilters, IndexMetadata, IndexPersistence, IndexStats,
};
use crate::types::{CodeEmbedding, ProviderDescriptor};
use crate::vector::EmbeddingProvider;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parsed state of the persisted index
#[derive(Debug, Clone, Default)]
struct LoadedIndex {
    /// `None` when no index file exists
    metadata: Option<IndexMetadata>,
    records: BTreeMap<String, CodeEmbedding>,
    /// Entries in the file that were shadowed by a later entry with the same id
    duplicates: usize,
    size_bytes: u64,
}

impl LoadedIndex {
    fn total_size_bytes(&self) -> u64 {
        self.records
            .values()
            .map(CodeEmbedding::approximate_size_bytes)
            .sum()
    }
}

/// Outcome of `EmbeddingStore::optimize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeReport {
    pub duplicates_removed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Durable store of `CodeEmbedding` records for one repository identifier
#[derive(Debug)]
pub struct EmbeddingStore {
    repository_id: String,
    descriptor: ProviderDescriptor,
    persistence: IndexPersistence,
    initialized: bool,
    cache: RwLock<Option<Arc<LoadedIndex>>>,
}

impl EmbeddingStore {
    /// Create a store for `repository_id` under `root`.
    ///
    /// `descriptor` identifies the provider whose vectors are saved through this
    /// store; it is recorded in the index metadata on the first save.
    pub fn new(
        root: impl AsRef<Path>,
        repository_id: impl Into<String>,
        descriptor: ProviderDescriptor,
    ) -> Self {
        let repository_id = repository_id.into();
        let persistence = IndexPersistence::new(root.as_ref(), &repository_id);
        Self {
            repository_id,
            descriptor,
            persistence,
            initialized: false,
            cache: RwLock::new(None),
        }
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Location of the index file
    pub fn index_path(&self) -> PathBuf {
        self.persistence.index_path()
    }

    /// Ensure the storage directory exists. Calling it again is a no-op.
    pub fn initialize(&mut self) -> StoreResult<()> {
        if self.initialized {
            return Ok(());
        }
        self.persistence.ensure_dir()?;
        self.initialized = true;
        tracing::debug!(
            repository = %self.repository_id,
            dir = %self.persistence.dir().display(),
            "initialized embedding store"
        );
        Ok(())
    }

    /// Merge `records` into the index by id.
    ///
    /// New ids are inserted and existing ids are replaced entirely. Every
    /// record is validated before anything is written, so a rejected call leaves
    /// the index untouched. An empty input does nothing.
    pub fn save_embeddings(&mut self, records: Vec<CodeEmbedding>) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut index = self.take_index()?;

        // An index without records carries no dimensionality of its own
        let mut metadata = match index.metadata.take() {
            Some(metadata) if !index.records.is_empty() => metadata,
            _ => IndexMetadata::new(&self.descriptor),
        };

        for record in &records {
            validate_record(record, metadata.dimensions)?;
        }

        let incoming = records.len();
        let mut replaced = 0;
        for record in records {
            if index.records.insert(record.id.clone(), record).is_some() {
                replaced += 1;
            }
        }

        metadata.update(index.records.len(), index.total_size_bytes());
        self.persistence.write(&metadata, index.records.values())?;

        tracing::info!(
            repository = %self.repository_id,
            incoming,
            replaced,
            total = index.records.len(),
            "saved embeddings"
        );
        Ok(())
    }

    /// All stored records, as a fresh list
    pub fn load_embeddings(&self) -> StoreResult<Vec<CodeEmbedding>> {
        let index = self.snapshot()?;
        Ok(index.records.values().cloned().collect())
    }

    /// Records matching every provided filter
    pub fn load_embeddings_with_filters(
        &self,
        filters: &EmbeddingFilters,
    ) -> StoreResult<Vec<CodeEmbedding>> {
        let compiled = filters.compile()?;
        let index = self.snapshot()?;
        Ok(index
            .records
            .values()
            .filter(|record| compiled.matches(record))
            .cloned()
            .collect())
    }

    /// Remove records by id and return how many were removed.
    ///
    /// Unknown ids are ignored.
    pub fn delete_embeddings<S: AsRef<str>>(&mut self, ids: &[S]) -> StoreResult<usize> {
        let mut index = self.take_index()?;
        let before = index.records.len();
        for id in ids {
            index.records.remove(id.as_ref());
        }
        let removed = before - index.records.len();

        if removed == 0 {
            self.restore(index);
            return Ok(0);
        }

        self.rewrite(&mut index)?;
        tracing::info!(repository = %self.repository_id, removed, "deleted embeddings");
        Ok(removed)
    }

    /// Remove every record whose `source` equals one of `source_paths`.
    ///
    /// Nothing is re-embedded; callers re-index the files afterwards.
    pub fn invalidate_changed_files<S: AsRef<str>>(
        &mut self,
        source_paths: &[S],
    ) -> StoreResult<usize> {
        let changed: HashSet<&str> = source_paths.iter().map(AsRef::as_ref).collect();

        let mut index = self.take_index()?;
        let before = index.records.len();
        index
            .records
            .retain(|_, record| !changed.contains(record.source.as_str()));
        let removed = before - index.records.len();

        if removed == 0 {
            self.restore(index);
            return Ok(0);
        }

        self.rewrite(&mut index)?;
        tracing::info!(
            repository = %self.repository_id,
            files = changed.len(),
            removed,
            "invalidated embeddings for changed files"
        );
        Ok(removed)
    }

    /// Remove the persisted index and purge the cache.
    pub fn clear(&mut self) -> StoreResult<()> {
        *self.cache.get_mut() = None;
        self.persistence.remove()?;
        self.initialized = false;
        tracing::info!(repository = %self.repository_id, "cleared embedding index");
        Ok(())
    }

    /// True iff the index holds at least one record
    pub fn exists(&self) -> StoreResult<bool> {
        Ok(self.count()? > 0)
    }

    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.snapshot()?.records.len())
    }

    /// Statistics of the persisted index, `None` when it is empty
    pub fn get_stats(&self) -> StoreResult<Option<IndexStats>> {
        let index = self.snapshot()?;
        let Some(metadata) = index.metadata.as_ref() else {
            return Ok(None);
        };
        if index.records.is_empty() {
            return Ok(None);
        }

        Ok(Some(IndexStats {
            embedding_count: index.records.len(),
            total_size_bytes: index.total_size_bytes(),
            dimensions: metadata.dimensions,
            file_size_bytes: index.size_bytes,
        }))
    }

    /// Compact the index file.
    ///
    /// Duplicate ids (last written entry wins) and stale metadata are written
    /// out of the file. Indexes without duplicates are left as they are.
    pub fn optimize(&mut self) -> StoreResult<OptimizeReport> {
        let mut index = self.take_index()?;
        let bytes_before = index.size_bytes;
        let duplicates_removed = index.duplicates;

        let stale_metadata = index
            .metadata
            .as_ref()
            .is_some_and(|m| m.embedding_count != index.records.len());

        if duplicates_removed == 0 && !stale_metadata {
            self.restore(index);
            return Ok(OptimizeReport {
                duplicates_removed,
                bytes_before,
                bytes_after: bytes_before,
            });
        }

        let bytes_after = self.rewrite(&mut index)?;
        tracing::info!(
            repository = %self.repository_id,
            duplicates_removed,
            bytes_before,
            bytes_after,
            "optimized embedding index"
        );
        Ok(OptimizeReport {
            duplicates_removed,
            bytes_before,
            bytes_after,
        })
    }

    /// Compare an existing index with `provider`.
    ///
    /// Mismatches are advisory: a dimension mismatch requires a rebuild, a
    /// provider name mismatch only degrades relevance.
    pub fn check_compatibility<P: EmbeddingProvider>(
        &self,
        provider: &P,
        existing_index: &IndexMetadata,
    ) -> CompatibilityCheck {
        let check = existing_index.compatibility_with(&provider.descriptor());
        if let Some(reason) = &check.reason {
            tracing::warn!(repository = %self.repository_id, "{reason}");
        }
        check
    }

    /// Metadata of the current index, `None` if no index exists
    pub fn load_index(&self) -> StoreResult<Option<IndexMetadata>> {
        let index = self.snapshot()?;
        if index.records.is_empty() {
            return Ok(None);
        }
        Ok(index.metadata.clone())
    }

    /// Cached parsed index, loading it from disk on a miss
    fn snapshot(&self) -> StoreResult<Arc<LoadedIndex>> {
        if let Some(index) = self.cache.read().as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut cache = self.cache.write();
        if let Some(index) = cache.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(self.read_index()?);
        tracing::debug!(
            repository = %self.repository_id,
            records = index.records.len(),
            "loaded embedding index into cache"
        );
        *cache = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Take the current index out of the cache for mutation
    fn take_index(&mut self) -> StoreResult<LoadedIndex> {
        match self.cache.get_mut().take() {
            Some(index) => Ok(Arc::unwrap_or_clone(index)),
            None => self.read_index(),
        }
    }

    /// Put an unchanged index back into the cache
    fn restore(&mut self, index: LoadedIndex) {
        *self.cache.get_mut() = Some(Arc::new(index));
    }

    fn read_index(&self) -> StoreResult<LoadedIndex> {
        let Some(raw) = self.persistence.read()? else {
            return Ok(LoadedIndex::default());
        };

        let mut records = BTreeMap::new();
        let mut duplicates = 0;
        for record in raw.embeddings {
            if records.insert(record.id.clone(), record).is_some() {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            tracing::debug!(
                repository = %self.repository_id,
                duplicates,
                "index file contains duplicate ids, run optimize to compact it"
            );
        }

        Ok(LoadedIndex {
            metadata: Some(raw.metadata),
            records,
            duplicates,
            size_bytes: raw.size_bytes,
        })
    }

    /// Persist `index` with refreshed metadata and return the bytes written
    fn rewrite(&self, index: &mut LoadedIndex) -> StoreResult<u64> {
        let total_size = index.total_size_bytes();
        let metadata = index
            .metadata
            .get_or_insert_with(|| IndexMetadata::new(&self.descriptor));
        metadata.update(index.records.len(), total_size);
        self.persistence.write(metadata, index.records.values())
    }
}

fn validate_record(record: &CodeEmbedding, dimensions: usize) -> StoreResult<()> {
    if record.id.is_empty() {
        return Err(StoreError::InvalidRecord {
            id: record.id.clone(),
            reason: "id must not be empty".to_string(),
        });
    }
    if record.embedding.len() != dimensions {
        return Err(StoreError::DimensionMismatch {
            id: record.id.clone(),
            expected: dimensions,
            actual: record.embedding.len(),
        });
    }
    // serde_json writes non-finite floats as null, which the reader rejects
    if let Some(position) = record.embedding.iter().position(|x| !x.is_finite()) {
        return Err(StoreError::InvalidRecord {
            id: record.id.clone(),
            reason: format!(
                "embedding component {position} is {}",
                record.embedding[position]
            ),
        });
    }
    if record.start_line > record.end_line {
        return Err(StoreError::InvalidRecord {
            id: record.id.clone(),
            reason: format!(
                "start line {} is after end line {}",
                record.start_line, record.end_line
            ),
        });
    }
    let complexity = record.metadata.complexity;
    if !complexity.is_finite() || complexity < 0.0 {
        return Err(StoreError::InvalidRecord {
            id: record.id.clone(),
            reason: format!("complexity must be a non-negative number, got {complexity}"),
        });
    }
    Ok(())
}
