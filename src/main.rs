//! # Lorekeeper CLI (`lore`)
//!
//! The `lore` binary is the calling surface for the Lorekeeper engine. It
//! owns the per-session state and the terminal; everything else — chunking,
//! embedding, indexing, retrieval, persona prompting — lives in the library.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore ingest <path>` | Ingest a document file or a directory of documents |
//! | `lore ask "<question>"` | Ask one question against the archives |
//! | `lore chat` | Interactive question-answer session |
//! | `lore status` | Report archive and model health |

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lorekeeper::brain::{Brain, BrainError};
use lorekeeper::config;
use lorekeeper::index::ArchiveIndex;
use lorekeeper::models::{Role, Session};
use lorekeeper::persona;

/// Lorekeeper — ask questions answered strictly from your own documents.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lorekeeper — a document-grounded Q&A engine with a fixed persona",
    version,
    long_about = "Lorekeeper ingests text and PDF documents into a persistent vector index \
    and answers questions from them through a persona-constrained language model. \
    Questions the documents cannot answer receive a fixed fallback, not an invention."
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if the file does
    /// not exist.
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    /// API key for the chat backend. Falls back to OPENROUTER_API_KEY or
    /// OPENAI_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest a document or a directory of documents.
    ///
    /// Files are chunked, embedded, and upserted into the archive index,
    /// which is persisted after every ingestion. Directories are processed
    /// in stable order; a bad file is reported and skipped, never aborting
    /// the batch.
    Ingest {
        /// A .txt/.md/.pdf file, or a directory to scan.
        path: PathBuf,
    },

    /// Ask a single question against the archives.
    Ask {
        /// The question text.
        question: String,
    },

    /// Start an interactive session. Type `exit` or `quit` to leave.
    Chat,

    /// Report archive and model health.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest { path } => {
            let brain = Brain::new(config, cli.api_key.as_deref()).map_err(to_anyhow)?;
            if path.is_dir() {
                let report = brain.learn_dir(&path).await.map_err(to_anyhow)?;
                println!("ingest {}", path.display());
                println!("  documents indexed: {}", report.succeeded.len());
                println!("  chunks written: {}", report.chunk_total());
                for failure in &report.failed {
                    println!("  skipped {}: {}", failure.source, failure.error);
                }
                if report.succeeded.is_empty() && report.failed.is_empty() {
                    println!("  no recognized documents found");
                } else if !report.succeeded.is_empty() {
                    println!("{}", persona::KNOWLEDGE_ACK);
                }
            } else {
                let result = brain.learn_file(&path).await.map_err(to_anyhow)?;
                println!(
                    "ingest {} ({} chunks)",
                    result.source, result.chunk_count
                );
                println!("{}", persona::KNOWLEDGE_ACK);
            }
        }

        Commands::Ask { question } => {
            let brain = Brain::new(config, cli.api_key.as_deref()).map_err(to_anyhow)?;
            let answer = brain.ask(&question).await.map_err(to_anyhow)?;
            println!("{}", answer);
        }

        Commands::Chat => {
            let brain = Brain::new(config, cli.api_key.as_deref()).map_err(to_anyhow)?;
            run_chat(&brain).await?;
        }

        Commands::Status => {
            print_status(config, cli.api_key.as_deref()).await?;
        }
    }

    Ok(())
}

/// Interactive loop. The session object — transcript and uploaded source
/// names — lives here, on the calling side; the brain stays stateless
/// across questions.
async fn run_chat(brain: &Brain) -> Result<()> {
    let mut session = Session::new();
    for source in brain.status().await.sources {
        session.remember_source(source);
    }

    println!("Sentinel awaits. Type 'exit' to leave.");
    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        session.record(Role::User, question);
        match brain.ask(question).await {
            Ok(answer) => {
                session.record(Role::Assistant, answer.clone());
                println!("Sentinel: {}", answer);
            }
            Err(e) => {
                // Backend failures are reported as failures, visibly
                // distinct from any in-character answer.
                eprintln!("error: {}", e);
            }
        }
    }

    Ok(())
}

/// Health report. A missing credential downgrades the report instead of
/// failing it: the index half is read directly from disk.
async fn print_status(config: config::Config, api_key: Option<&str>) -> Result<()> {
    match Brain::new(config.clone(), api_key) {
        Ok(brain) => {
            let status = brain.status().await;
            println!("model configured: {}", status.model_configured);
            println!("archives present: {}", status.has_index);
            println!("chunks indexed: {}", status.chunk_count);
            for source in &status.sources {
                println!("  source: {}", source);
            }
        }
        Err(BrainError::MissingCredential) => {
            let (has_index, chunk_count) = match ArchiveIndex::load(&config.storage.index_path)
            {
                Ok(Some(index)) => (!index.is_empty(), index.len()),
                _ => (false, 0),
            };
            println!("model configured: false");
            println!("archives present: {}", has_index);
            println!("chunks indexed: {}", chunk_count);
        }
        Err(e) => return Err(to_anyhow(e)),
    }
    Ok(())
}

fn to_anyhow(e: BrainError) -> anyhow::Error {
    anyhow::anyhow!("{}", e)
}
