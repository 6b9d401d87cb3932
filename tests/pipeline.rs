//! End-to-end pipeline tests: ingest → persist → reload → ask, plus PDF
//! extraction and mixed-directory batches, all against in-process mock
//! backends.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use lorekeeper::brain::{Brain, BrainState};
use lorekeeper::config::Config;
use lorekeeper::embedding::{EmbeddingError, EmbeddingProvider};
use lorekeeper::extract::DocumentKind;
use lorekeeper::index::ArchiveIndex;
use lorekeeper::llm::{ChatModel, LlmError};
use lorekeeper::persona;

// ─── Mock backends ──────────────────────────────────────────────────

/// Deterministic embedder: projects a SHA-256 digest into unit-range floats.
struct HashEmbedder;

const DIMS: usize = 8;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let digest = Sha256::digest(t.as_bytes());
                (0..DIMS).map(|i| digest[i] as f32 / 255.0).collect()
            })
            .collect())
    }
}

/// Chat mock that counts calls and captures the last prompt.
#[derive(Default)]
struct RecordingChat {
    calls: AtomicUsize,
    last_system: Mutex<Option<String>>,
}

#[derive(Clone, Default)]
struct SharedChat(Arc<RecordingChat>);

#[async_trait]
impl ChatModel for SharedChat {
    async fn complete(&self, system: &str, _user: &str) -> Result<String, LlmError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        *self.0.last_system.lock().unwrap() = Some(system.to_string());
        Ok("The Archives declare: the sky is blue.".to_string())
    }
    fn set_api_key(&mut self, _key: String) {}
}

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.storage.index_path = dir.path().join("data").join("archive_index.json");
    config
}

fn test_brain(config: Config, chat: SharedChat) -> Brain {
    let index = match ArchiveIndex::load(&config.storage.index_path) {
        Ok(Some(existing)) => existing,
        _ => ArchiveIndex::new("hash-embedder", DIMS),
    };
    Brain::from_parts(config, Box::new(chat), Box::new(HashEmbedder), index)
}

/// Minimal valid PDF containing the text "the beacon is lit". Builds the
/// body then an xref table with correct byte offsets so the extractor can
/// parse it.
fn minimal_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 49 >> stream\nBT /F1 12 Tf 100 700 Td (the beacon is lit) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_persist_reload_ask_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    // First session: learn a document and persist.
    {
        let brain = test_brain(test_config(&dir), SharedChat::default());
        let result = brain
            .learn_bytes(
                b"The sky is blue. Grass is green.",
                "colors.txt",
                DocumentKind::Text,
            )
            .await
            .unwrap();
        assert_eq!(result.chunk_count, 1);
        assert_eq!(brain.state().await, BrainState::Ready);
    }

    // Second session: the snapshot alone restores the archives.
    let chat = SharedChat::default();
    let brain = test_brain(test_config(&dir), chat.clone());
    assert_eq!(brain.state().await, BrainState::Ready);

    let answer = brain.ask("What color is the sky?").await.unwrap();
    assert!(answer.contains("blue"));
    assert_eq!(chat.0.calls.load(Ordering::SeqCst), 1);

    let system = chat.0.last_system.lock().unwrap().clone().unwrap();
    assert!(system.contains("The sky is blue."));
}

#[tokio::test]
async fn empty_archives_answer_without_backend_calls() {
    let dir = tempfile::tempdir().unwrap();
    let chat = SharedChat::default();
    let brain = test_brain(test_config(&dir), chat.clone());

    let answer = brain.ask("anything?").await.unwrap();
    assert_eq!(answer, persona::EMPTY_ARCHIVES);
    assert_eq!(chat.0.calls.load(Ordering::SeqCst), 0);
    // Nothing was persisted either.
    assert!(!test_config(&dir).storage.index_path.exists());
}

#[tokio::test]
async fn pdf_document_flows_through_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("beacon.pdf");
    fs::write(&pdf_path, minimal_pdf()).unwrap();

    let chat = SharedChat::default();
    let brain = test_brain(test_config(&dir), chat.clone());

    let result = brain.learn_file(&pdf_path).await.unwrap();
    assert_eq!(result.source, "beacon.pdf");
    assert_eq!(result.chunk_count, 1);

    brain.ask("Is the beacon lit?").await.unwrap();
    let system = chat.0.last_system.lock().unwrap().clone().unwrap();
    assert!(system.contains("the beacon is lit"));
}

#[tokio::test]
async fn mixed_directory_batch_reports_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("alpha.txt"), "Alpha notes about deployment.").unwrap();
    fs::write(docs.join("beta.md"), "Beta notes about infrastructure.").unwrap();
    fs::write(docs.join("beacon.pdf"), minimal_pdf()).unwrap();
    fs::write(docs.join("blank.txt"), "   \n").unwrap();
    fs::write(docs.join("report.docx"), "office blob").unwrap();

    let brain = test_brain(test_config(&dir), SharedChat::default());
    let report = brain.learn_dir(&docs).await.unwrap();

    let sources: Vec<&str> = report.succeeded.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["alpha.txt", "beacon.pdf", "beta.md"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].source, "blank.txt");

    // The snapshot reflects the successes.
    let index = ArchiveIndex::load(&test_config(&dir).storage.index_path)
        .unwrap()
        .unwrap();
    assert_eq!(index.sources(), vec!["alpha.txt", "beacon.pdf", "beta.md"]);

    let status = brain.status().await;
    assert!(status.has_index);
    assert_eq!(status.chunk_count, report.chunk_total());
}

#[tokio::test]
async fn corrupt_snapshot_is_treated_as_absent_by_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    fs::create_dir_all(config.storage.index_path.parent().unwrap()).unwrap();
    fs::write(&config.storage.index_path, b"definitely not a snapshot").unwrap();

    // test_brain falls back to an empty index on load failure, mirroring
    // the orchestrator's corruption policy.
    let brain = test_brain(config, SharedChat::default());
    assert_eq!(brain.state().await, BrainState::ReadyNoIndex);
    let answer = brain.ask("anything?").await.unwrap();
    assert_eq!(answer, persona::EMPTY_ARCHIVES);
}
