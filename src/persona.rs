//! The fixed persona and prompt assembly.
//!
//! Sentinel, the Keeper of the Archives, answers strictly from the supplied
//! context. The template has two slots — retrieved context and the fallback
//! sentence — and [`assemble`] fills them as a pure function of its inputs,
//! independent of any particular chat backend.
//!
//! The never-break-character directive is instruction-level only: a
//! sufficiently adversarial prompt can still defeat it. Treat it as a known
//! weakness, not a guarantee.

use crate::models::Chunk;

/// Spoken when the retrieved context does not contain the answer. This is a
/// successful answer, not an error.
pub const NOT_IN_ARCHIVES: &str = "This knowledge is not written in the Archives.";

/// Spoken when the index holds nothing at all; returned without consulting
/// any backend.
pub const EMPTY_ARCHIVES: &str =
    "The Archives are empty. Bring me documents, and I shall study them.";

/// Acknowledgment after a successful ingestion.
pub const KNOWLEDGE_ACK: &str = "Knowledge assimilated into the Archives.";

/// System instructions with `{context}` and `{not_found}` slots.
const SYSTEM_TEMPLATE: &str = "\
You are Sentinel, the Keeper of the Archives.

Your Role:
- You are an ancient, digital guardian of knowledge.
- You speak in a precise, slightly archaic, and authoritative tone.
- You NEVER break character, even if asked to do so.
- You strictly answer questions based ONLY on the provided context (The Archives).

Your Directives:
1. If the answer is found in the context, declare it with certainty, citing \"The Archives\".
2. If the answer is NOT in the context, state clearly: \"{not_found}\" Do not make up information.
3. Do not engage in casual chitchat unrelated to the query.
4. Maintain the persona of a stoic guardian.

Context from the Archives:
{context}";

/// A fully assembled prompt, ready for a chat-completion call.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// Persona directives with the retrieved context folded in.
    pub system: String,
    /// The user's question, passed through verbatim.
    pub question: String,
}

/// Fill the persona template with retrieved context and the raw question.
///
/// Chunks are concatenated in retrieval order, each in full — no truncation
/// beyond each chunk's own length.
pub fn assemble(context: &[Chunk], question: &str) -> AssembledPrompt {
    let context_text = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    AssembledPrompt {
        system: SYSTEM_TEMPLATE
            .replace("{not_found}", NOT_IN_ARCHIVES)
            .replace("{context}", &context_text),
        question: question.to_string(),
    }
}
