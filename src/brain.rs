//! The orchestrator: owns the index lifecycle and runs the
//! retrieve → prompt → complete round trip.
//!
//! A [`Brain`] is constructed per session by the calling surface. It holds
//! the chat backend, the embedding provider, and the archive index behind a
//! read-write lock: ingestion is single-writer, queries share read access,
//! and the atomic snapshot contract keeps readers from ever observing a
//! partially written index on disk.
//!
//! "No index yet" is a first-class state, not an exception: asking against
//! empty archives returns a fixed sentinel without touching the embedding
//! or chat backends.

use std::path::Path;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{self, EmbeddingError, EmbeddingProvider};
use crate::extract::DocumentKind;
use crate::index::{ArchiveIndex, IndexError};
use crate::ingest::{self, BatchReport, IngestError, IngestResult};
use crate::llm::{ChatModel, LlmError, OpenAiChat};
use crate::persona;
use crate::retrieve;

/// Failure surfaced by the orchestrator.
#[derive(Debug)]
pub enum BrainError {
    /// Construction (or credential rotation) without a usable API key.
    MissingCredential,
    Llm(LlmError),
    Embedding(EmbeddingError),
    Index(IndexError),
    Ingest(IngestError),
}

impl std::fmt::Display for BrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrainError::MissingCredential => write!(
                f,
                "no API key found; pass one explicitly or set OPENROUTER_API_KEY / OPENAI_API_KEY"
            ),
            BrainError::Llm(e) => write!(f, "{}", e),
            BrainError::Embedding(e) => write!(f, "{}", e),
            BrainError::Index(e) => write!(f, "{}", e),
            BrainError::Ingest(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BrainError {}

impl From<LlmError> for BrainError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingCredential => BrainError::MissingCredential,
            other => BrainError::Llm(other),
        }
    }
}

impl From<EmbeddingError> for BrainError {
    fn from(e: EmbeddingError) -> Self {
        BrainError::Embedding(e)
    }
}

impl From<IndexError> for BrainError {
    fn from(e: IndexError) -> Self {
        BrainError::Index(e)
    }
}

impl From<IngestError> for BrainError {
    fn from(e: IngestError) -> Self {
        BrainError::Ingest(e)
    }
}

/// Where the brain stands. Construction itself is the transition out of the
/// unconfigured state: it fails without a credential, so a constructed brain
/// always has a chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrainState {
    /// Chat model configured, archives empty or absent.
    ReadyNoIndex,
    /// Chat model configured, archives hold at least one chunk.
    Ready,
}

/// Health report for callers.
#[derive(Debug, Clone)]
pub struct Status {
    pub has_index: bool,
    pub model_configured: bool,
    pub chunk_count: usize,
    pub sources: Vec<String>,
}

/// Per-session orchestrator over chat model, embedder, and archive index.
pub struct Brain {
    config: Config,
    llm: Box<dyn ChatModel>,
    embedder: Box<dyn EmbeddingProvider>,
    index: RwLock<ArchiveIndex>,
}

impl Brain {
    /// Construct with the production backends.
    ///
    /// Resolves the credential (explicit argument, then environment) and
    /// loads the persisted index if one exists. A corrupt snapshot is
    /// treated as absent — logged, never half-loaded; a snapshot built by a
    /// different embedding model is an error, since its similarities would
    /// be silently wrong.
    pub fn new(config: Config, api_key: Option<&str>) -> Result<Self, BrainError> {
        let llm = OpenAiChat::new(&config.llm, api_key)?;
        let embedder = embedding::create_provider(&config.embedding)?;

        let index = match ArchiveIndex::load(&config.storage.index_path) {
            Ok(Some(existing)) => {
                if existing.model() != embedder.model_name()
                    || existing.dims() != embedder.dims()
                {
                    return Err(BrainError::Index(IndexError::ModelMismatch {
                        expected: format!(
                            "{} ({} dims)",
                            embedder.model_name(),
                            embedder.dims()
                        ),
                        found: format!("{} ({} dims)", existing.model(), existing.dims()),
                    }));
                }
                info!(
                    chunks = existing.len(),
                    path = %config.storage.index_path.display(),
                    "loaded archive index"
                );
                existing
            }
            Ok(None) => ArchiveIndex::new(embedder.model_name(), embedder.dims()),
            Err(IndexError::Corruption(msg)) => {
                warn!(%msg, "persisted index unreadable, starting with empty archives");
                ArchiveIndex::new(embedder.model_name(), embedder.dims())
            }
            Err(e) => return Err(BrainError::Index(e)),
        };

        Ok(Self {
            config,
            llm: Box::new(llm),
            embedder,
            index: RwLock::new(index),
        })
    }

    /// Construct from explicit backends and an existing index. Used by
    /// callers that bring their own implementations, and by tests.
    pub fn from_parts(
        config: Config,
        llm: Box<dyn ChatModel>,
        embedder: Box<dyn EmbeddingProvider>,
        index: ArchiveIndex,
    ) -> Self {
        Self {
            config,
            llm,
            embedder,
            index: RwLock::new(index),
        }
    }

    pub async fn state(&self) -> BrainState {
        if self.index.read().await.is_empty() {
            BrainState::ReadyNoIndex
        } else {
            BrainState::Ready
        }
    }

    pub async fn status(&self) -> Status {
        let index = self.index.read().await;
        Status {
            has_index: !index.is_empty(),
            model_configured: true,
            chunk_count: index.len(),
            sources: index.sources(),
        }
    }

    /// Replace the API key without discarding the loaded index.
    pub fn set_api_key(&mut self, key: &str) -> Result<(), BrainError> {
        if key.trim().is_empty() {
            return Err(BrainError::MissingCredential);
        }
        self.llm.set_api_key(key.to_string());
        Ok(())
    }

    /// Ingest raw document bytes and persist the index.
    pub async fn learn_bytes(
        &self,
        bytes: &[u8],
        source: &str,
        kind: DocumentKind,
    ) -> Result<IngestResult, BrainError> {
        let mut index = self.index.write().await;
        let result = ingest::ingest_bytes(
            &self.config,
            self.embedder.as_ref(),
            &mut index,
            bytes,
            source,
            kind,
        )
        .await?;
        index.save(&self.config.storage.index_path)?;
        Ok(result)
    }

    /// Ingest a single file and persist the index.
    pub async fn learn_file(&self, path: &Path) -> Result<IngestResult, BrainError> {
        let mut index = self.index.write().await;
        let result =
            ingest::ingest_file(&self.config, self.embedder.as_ref(), &mut index, path).await?;
        index.save(&self.config.storage.index_path)?;
        Ok(result)
    }

    /// Ingest a directory with per-file isolation, persisting whatever
    /// succeeded. The report carries both outcomes.
    pub async fn learn_dir(&self, root: &Path) -> Result<BatchReport, BrainError> {
        let mut index = self.index.write().await;
        let report =
            ingest::ingest_dir(&self.config, self.embedder.as_ref(), &mut index, root).await?;
        if !report.succeeded.is_empty() {
            index.save(&self.config.storage.index_path)?;
        }
        Ok(report)
    }

    /// Answer a question from the archives.
    ///
    /// Empty archives short-circuit to the fixed sentinel — no embedding
    /// call, no chat call. Otherwise: embed the question, pull the top-k
    /// chunks, assemble the persona prompt, and run one completion. The
    /// read lock is released before the network round trip so ingestion is
    /// never blocked on a slow backend.
    pub async fn ask(&self, question: &str) -> Result<String, BrainError> {
        let context = {
            let index = self.index.read().await;
            if index.is_empty() {
                return Ok(persona::EMPTY_ARCHIVES.to_string());
            }
            retrieve::retrieve(
                self.embedder.as_ref(),
                &index,
                question,
                self.config.retrieval.top_k,
            )
            .await?
        };

        let prompt = persona::assemble(&context, question);
        let answer = self.llm.complete(&prompt.system, &prompt.question).await?;
        Ok(answer)
    }
}
