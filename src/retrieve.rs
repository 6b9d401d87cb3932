//! Nearest-neighbor retrieval over the archive index.
//!
//! Embeds the query, asks the index for the closest chunks, and projects the
//! scored hits down to chunks in ranked order. Read-only; safe to run
//! concurrently with other readers.

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::ArchiveIndex;
use crate::models::Chunk;

/// Default number of chunks handed to the model per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Return the `k` chunks most similar to `query`, best first.
pub async fn retrieve(
    embedder: &dyn EmbeddingProvider,
    index: &ArchiveIndex,
    query: &str,
    k: usize,
) -> Result<Vec<Chunk>, EmbeddingError> {
    let query_vec = embedder.embed_one(query).await?;
    Ok(index
        .query(&query_vec, k)
        .into_iter()
        .map(|hit| hit.chunk)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use async_trait::async_trait;

    /// Embedder with a fixed vocabulary: maps known words onto axes.
    struct AxisEmbedder;

    fn axis_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        vec![
            lower.contains("sky") as u8 as f32,
            lower.contains("grass") as u8 as f32,
            lower.contains("sea") as u8 as f32,
        ]
    }

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis-embedder"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| axis_vector(t)).collect())
        }
    }

    fn make_chunk(seq: i64, text: &str) -> Chunk {
        Chunk {
            id: format!("chunk-{}", seq),
            source: "facts.txt".to_string(),
            seq,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_chunk_first() {
        let embedder = AxisEmbedder;
        let mut index = ArchiveIndex::new("axis-embedder", 3);
        let chunks = vec![
            make_chunk(0, "The grass is green."),
            make_chunk(1, "The sky is blue."),
            make_chunk(2, "The sea is deep."),
        ];
        let embeddings = chunks.iter().map(|c| axis_vector(&c.text)).collect();
        index.upsert(chunks, embeddings, "axis-embedder").unwrap();

        let hits = retrieve(&embedder, &index, "What color is the sky?", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.contains("sky"));
    }

    #[tokio::test]
    async fn test_retrieve_empty_index_returns_nothing() {
        let embedder = AxisEmbedder;
        let index = ArchiveIndex::new("axis-embedder", 3);
        let hits = retrieve(&embedder, &index, "anything", DEFAULT_TOP_K)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
