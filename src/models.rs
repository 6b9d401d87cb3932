//! Core data models used throughout Lorekeeper.
//!
//! These types represent the chunks, scored retrieval hits, and per-session
//! conversation state that flow through the ingestion and answering pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A bounded window of a source document's extracted text — the unit of
/// retrieval.
///
/// `source` and `seq` carry provenance: which uploaded file the chunk came
/// from and its left-to-right rank within that file. `hash` is a SHA-256 hex
/// digest of `text`, used for staleness checks across re-ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub seq: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk paired with its similarity score from an index query.
///
/// Scores are cosine similarities — higher is closer.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One (role, message) pair in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub message: String,
}

/// Per-conversation mutable state, owned by the calling surface.
///
/// The core pipeline is stateless across calls apart from the archive index;
/// whoever drives the conversation (a REPL, an API handler) keeps one of
/// these and records turns and uploaded source names into it.
#[derive(Debug, Default)]
pub struct Session {
    pub turns: Vec<Turn>,
    pub sources: BTreeSet<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the transcript.
    pub fn record(&mut self, role: Role, message: impl Into<String>) {
        self.turns.push(Turn {
            role,
            message: message.into(),
        });
    }

    /// Remember that a source document was uploaded during this session.
    pub fn remember_source(&mut self, name: impl Into<String>) {
        self.sources.insert(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_records_turns_in_order() {
        let mut session = Session::new();
        session.record(Role::User, "first");
        session.record(Role::Assistant, "second");
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].role, Role::User);
        assert_eq!(session.turns[1].message, "second");
    }

    #[test]
    fn test_session_deduplicates_sources() {
        let mut session = Session::new();
        session.remember_source("manual.pdf");
        session.remember_source("manual.pdf");
        session.remember_source("appendix.txt");
        assert_eq!(session.sources.len(), 2);
    }
}
