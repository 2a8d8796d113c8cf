//! On-disk layout of a repository index
//!
//! Each repository identifier maps to one directory under the storage root,
//! named after a SHA-256 prefix of the identifier. The directory holds a single
//! JSON document with the index metadata and the full record list. The whole
//! document is the unit of replacement: saves write a temporary file next to
//! the index and rename it into place.

use crate::error::{StoreError, StoreResult};
use crate::storage::IndexMetadata;
use crate::types::CodeEmbedding;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Version of the persisted document format
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// File name of the index document inside a repository directory
pub const INDEX_FILE_NAME: &str = "embeddings.json";

/// Hex characters of the identifier hash used as the directory name
const REPOSITORY_KEY_LEN: usize = 16;

#[derive(Serialize)]
struct IndexDocumentRef<'a> {
    version: u32,
    metadata: &'a IndexMetadata,
    embeddings: Vec<&'a CodeEmbedding>,
}

#[derive(Deserialize)]
struct IndexDocument {
    version: u32,
    metadata: IndexMetadata,
    #[serde(default)]
    embeddings: Vec<CodeEmbedding>,
}

/// Index document as read from disk.
///
/// `embeddings` is in file order and may contain duplicate ids left behind by
/// older writers; the store folds them into its id-keyed arena.
#[derive(Debug)]
pub struct RawIndex {
    pub metadata: IndexMetadata,
    pub embeddings: Vec<CodeEmbedding>,
    pub size_bytes: u64,
}

/// Deterministic, filesystem-safe directory name for a repository identifier
pub fn repository_key(repository_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..REPOSITORY_KEY_LEN].to_string()
}

/// Reads and writes the index document of one repository
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    dir: PathBuf,
}

impl IndexPersistence {
    pub fn new(root: &Path, repository_id: &str) -> Self {
        Self {
            dir: root.join(repository_key(repository_id)),
        }
    }

    /// Directory holding this repository's index
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    /// Create the repository directory if it is missing
    pub fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Write {
            path: self.dir.clone(),
            source: e,
        })
    }

    /// Read the index document.
    ///
    /// Returns `Ok(None)` when no index exists. A document that cannot be parsed,
    /// or that was written by a newer format version, is logged and treated as
    /// absent so that a damaged index never blocks the caller.
    pub fn read(&self) -> StoreResult<Option<RawIndex>> {
        let path = self.index_path();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Read { path, source: e }),
        };

        let document: IndexDocument = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "index file is corrupted, treating it as empty"
                );
                return Ok(None);
            }
        };

        if document.version > INDEX_FORMAT_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = document.version,
                supported = INDEX_FORMAT_VERSION,
                "index file was written by a newer format version, treating it as empty"
            );
            return Ok(None);
        }

        Ok(Some(RawIndex {
            metadata: document.metadata,
            embeddings: document.embeddings,
            size_bytes: bytes.len() as u64,
        }))
    }

    /// Replace the index document atomically and return the bytes written.
    pub fn write<'a>(
        &self,
        metadata: &IndexMetadata,
        embeddings: impl IntoIterator<Item = &'a CodeEmbedding>,
    ) -> StoreResult<u64> {
        self.ensure_dir()?;
        let path = self.index_path();

        let document = IndexDocumentRef {
            version: INDEX_FORMAT_VERSION,
            metadata,
            embeddings: embeddings.into_iter().collect(),
        };
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.clone(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        temp.write_all(&bytes).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            records = document.embeddings.len(),
            "wrote index file"
        );

        Ok(bytes.len() as u64)
    }

    /// Remove the index document and, if it is then empty, its directory.
    pub fn remove(&self) -> StoreResult<()> {
        let path = self.index_path();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Write { path, source: e }),
        }

        // Leftover files (e.g. a foreign temp file) keep the directory alive
        let _ = fs::remove_dir(&self.dir);
        Ok(())
    }
}
