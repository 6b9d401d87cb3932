//! Document ingestion pipeline.
//!
//! Orchestrates the write half of the system: extract plain text per the
//! declared type, chunk it, embed the chunks in batches, and upsert into the
//! archive index. Single files and raw byte uploads go through
//! [`ingest_file`] / [`ingest_bytes`]; [`ingest_dir`] walks a directory in
//! stable lexicographic order with per-file error isolation, so one bad file
//! never aborts the batch.
//!
//! Persisting the index afterwards is the caller's job — the orchestrator
//! holds the write lock and saves once per ingestion call.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::extract::{self, DocumentKind, ExtractError};
use crate::index::{ArchiveIndex, IndexError};
use crate::models::Chunk;

/// Failure while ingesting one document.
#[derive(Debug)]
pub enum IngestError {
    /// The file extension maps to no recognized document type.
    UnsupportedFormat(String),
    /// Extraction produced zero non-whitespace characters.
    EmptyDocument(String),
    Extraction(ExtractError),
    Embedding(EmbeddingError),
    Index(IndexError),
    Io(std::io::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::UnsupportedFormat(name) => {
                write!(f, "unsupported document format: {}", name)
            }
            IngestError::EmptyDocument(name) => {
                write!(f, "document contains no extractable text: {}", name)
            }
            IngestError::Extraction(e) => write!(f, "{}", e),
            IngestError::Embedding(e) => write!(f, "{}", e),
            IngestError::Index(e) => write!(f, "{}", e),
            IngestError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ExtractError> for IngestError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnsupportedFormat(name) => IngestError::UnsupportedFormat(name),
            other => IngestError::Extraction(other),
        }
    }
}

impl From<EmbeddingError> for IngestError {
    fn from(e: EmbeddingError) -> Self {
        IngestError::Embedding(e)
    }
}

impl From<IndexError> for IngestError {
    fn from(e: IndexError) -> Self {
        IngestError::Index(e)
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e)
    }
}

/// Acknowledgment for one successfully ingested document.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub source: String,
    pub chunk_count: usize,
}

/// One file that failed during a directory batch.
#[derive(Debug)]
pub struct IngestFailure {
    pub source: String,
    pub error: IngestError,
}

/// Aggregate outcome of a directory ingestion.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<IngestResult>,
    pub failed: Vec<IngestFailure>,
}

impl BatchReport {
    pub fn chunk_total(&self) -> usize {
        self.succeeded.iter().map(|r| r.chunk_count).sum()
    }
}

/// Ingest raw document bytes under a declared type.
///
/// Extract → reject whitespace-only text → chunk → embed in batches →
/// upsert. The index is untouched unless every step succeeds.
pub async fn ingest_bytes(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &mut ArchiveIndex,
    bytes: &[u8],
    source: &str,
    kind: DocumentKind,
) -> Result<IngestResult, IngestError> {
    let text = extract::extract_text(bytes, kind)?;
    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument(source.to_string()));
    }

    let chunks = chunk_text(source, &text, config.chunking.size, config.chunking.overlap);
    let embeddings = embed_chunks(config, embedder, &chunks).await?;

    let chunk_count = chunks.len();
    index.upsert(chunks, embeddings, embedder.model_name())?;

    info!(source, chunk_count, "document assimilated");
    Ok(IngestResult {
        source: source.to_string(),
        chunk_count,
    })
}

/// Ingest a single file, with the document type inferred from its extension.
pub async fn ingest_file(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &mut ArchiveIndex,
    path: &Path,
) -> Result<IngestResult, IngestError> {
    let kind = extract::detect_kind(path)?;
    let bytes = std::fs::read(path)?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    ingest_bytes(config, embedder, index, &bytes, &source, kind).await
}

/// Ingest every recognized file under a directory.
///
/// Files are matched against the configured include/exclude globs and
/// processed in lexicographic relative-path order. Each file is isolated: a
/// failure is recorded in the report and the batch continues.
pub async fn ingest_dir(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &mut ArchiveIndex,
    root: &Path,
) -> Result<BatchReport, IngestError> {
    let include_set = build_globset(&config.ingest.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.ingest.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut report = BatchReport::default();
    let mut candidates: Vec<String> = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // An unreadable directory entry is a per-item failure, not
                // a batch abort.
                report.failed.push(IngestFailure {
                    source: e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string()),
                    error: IngestError::Io(std::io::Error::other(e.to_string())),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        candidates.push(rel_str);
    }

    // Deterministic batch order.
    candidates.sort();
    debug!(count = candidates.len(), "directory scan complete");

    for rel_str in candidates {
        let path = root.join(&rel_str);
        let outcome = ingest_one_of_batch(config, embedder, index, &path, &rel_str).await;
        match outcome {
            Ok(result) => report.succeeded.push(result),
            Err(error) => {
                warn!(source = %rel_str, %error, "skipping file");
                report.failed.push(IngestFailure {
                    source: rel_str,
                    error,
                });
            }
        }
    }

    Ok(report)
}

async fn ingest_one_of_batch(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &mut ArchiveIndex,
    path: &Path,
    source: &str,
) -> Result<IngestResult, IngestError> {
    let kind = extract::detect_kind(path)?;
    let bytes = std::fs::read(path)?;
    ingest_bytes(config, embedder, index, &bytes, source, kind).await
}

/// Embed chunk texts in config-sized batches, preserving order.
async fn embed_chunks(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    chunks: &[Chunk],
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embedding.batch_size) {
        embeddings.extend(embedder.embed_batch(batch).await?);
    }
    Ok(embeddings)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            IngestError::Io(std::io::Error::other(format!(
                "bad glob '{}': {}",
                pattern, e
            )))
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        IngestError::Io(std::io::Error::other(format!("glob set: {}", e)))
    })
}
