//! The archive index: a persistent nearest-neighbor store over chunks.
//!
//! Holds (chunk, embedding) pairs in insertion order and answers top-k
//! similarity queries by brute-force cosine scan. The index is tagged with
//! the embedding model that produced its vectors; vectors from any other
//! model are rejected, because mixing models silently corrupts similarity
//! results.
//!
//! Persistence is a single JSON snapshot with vectors stored as base64
//! little-endian f32 blobs. Saving writes a temp sibling file and renames it
//! into place, so a crash mid-save never leaves a loadable-but-truncated
//! snapshot; loading either returns a whole index, reports the file absent,
//! or fails with [`IndexError::Corruption`] — never a half-loaded index.

use std::collections::HashSet;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ScoredChunk};

/// Snapshot format version. Bumped on incompatible layout changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Failure in index mutation or persistence.
#[derive(Debug)]
pub enum IndexError {
    /// Vectors from a different embedding model were offered to the index.
    ModelMismatch {
        expected: String,
        found: String,
    },
    /// The snapshot on disk is unreadable or internally inconsistent.
    Corruption(String),
    Io(std::io::Error),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::ModelMismatch { expected, found } => write!(
                f,
                "index holds vectors from model '{}', refusing vectors from '{}'",
                expected, found
            ),
            IndexError::Corruption(e) => write!(f, "index snapshot corrupt: {}", e),
            IndexError::Io(e) => write!(f, "index I/O error: {}", e),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Io(e)
    }
}

#[derive(Debug)]
struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// In-memory nearest-neighbor index with durable snapshots.
#[derive(Debug)]
pub struct ArchiveIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    model: String,
    dims: usize,
    saved_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    chunk: Chunk,
    /// Base64-encoded little-endian f32 vector.
    embedding: String,
}

impl ArchiveIndex {
    /// Create an empty index bound to one embedding model.
    pub fn new(model: &str, dims: usize) -> Self {
        Self {
            model: model.to_string(),
            dims,
            entries: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct source names present in the index, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.chunk.source.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        sources.sort();
        sources
    }

    /// Append chunks and their embeddings, replacing any previous entries
    /// from the same source documents.
    ///
    /// Re-ingesting a file therefore updates it in place while every other
    /// document survives; the index never needs a full rebuild for an
    /// incremental change.
    ///
    /// Fails with [`IndexError::ModelMismatch`] if `model` differs from the
    /// model this index is tagged with, or if any vector has the wrong
    /// dimensionality.
    pub fn upsert(
        &mut self,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        model: &str,
    ) -> Result<(), IndexError> {
        if model != self.model {
            return Err(IndexError::ModelMismatch {
                expected: self.model.clone(),
                found: model.to_string(),
            });
        }
        assert_eq!(
            chunks.len(),
            embeddings.len(),
            "one embedding per chunk is the batch contract"
        );
        for embedding in &embeddings {
            if embedding.len() != self.dims {
                return Err(IndexError::ModelMismatch {
                    expected: format!("{} ({} dims)", self.model, self.dims),
                    found: format!("{} ({} dims)", model, embedding.len()),
                });
            }
        }

        let incoming_sources: HashSet<&str> =
            chunks.iter().map(|c| c.source.as_str()).collect();
        self.entries
            .retain(|e| !incoming_sources.contains(e.chunk.source.as_str()));

        self.entries.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexEntry { chunk, embedding }),
        );

        Ok(())
    }

    /// Return the top-k entries by descending cosine similarity.
    ///
    /// The sort is stable, so equal scores keep insertion order. `k` is
    /// clamped to at least 1; when the index holds fewer than `k` entries,
    /// all of them are returned.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredChunk> {
        let k = k.max(1);

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(vector, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Persist the index atomically: serialize to a temp sibling, then
    /// rename over the target path.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            model: self.model.clone(),
            dims: self.dims,
            saved_at: Utc::now(),
            entries: self
                .entries
                .iter()
                .map(|e| SnapshotEntry {
                    chunk: e.chunk.clone(),
                    embedding: STANDARD.encode(vec_to_blob(&e.embedding)),
                })
                .collect(),
        };

        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| IndexError::Corruption(e.to_string()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive_index.json".to_string());
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load a previously saved index.
    ///
    /// Returns `Ok(None)` when no snapshot exists at `path`. Any parse
    /// failure, version mismatch, or dimensionality inconsistency is
    /// [`IndexError::Corruption`] — the caller decides whether to rebuild.
    pub fn load(path: &Path) -> Result<Option<Self>, IndexError> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::Corruption(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::Corruption(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut entries = Vec::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            let blob = STANDARD
                .decode(&entry.embedding)
                .map_err(|e| IndexError::Corruption(e.to_string()))?;
            let embedding = blob_to_vec(&blob);
            if embedding.len() != snapshot.dims {
                return Err(IndexError::Corruption(format!(
                    "entry for '{}' has {} dims, snapshot declares {}",
                    entry.chunk.source,
                    embedding.len(),
                    snapshot.dims
                )));
            }
            entries.push(IndexEntry {
                chunk: entry.chunk,
                embedding,
            });
        }

        Ok(Some(Self {
            model: snapshot.model,
            dims: snapshot.dims,
            entries,
        }))
    }
}
