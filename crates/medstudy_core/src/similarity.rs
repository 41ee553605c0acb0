//! crates/medstudy_core/src/similarity.rs
//!
//! Ad hoc vector math for ranking document chunks against a query
//! embedding. Pure and storage-independent, so it can be swapped for a
//! real vector index later without touching callers.

use crate::domain::DocumentChunk;

/// Cosine similarity between two equal-length vectors. Returns 0.0 for
/// mismatched lengths, empty input, or a zero-norm side, so callers never
/// have to special-case missing embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A chunk paired with its similarity score to some query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Ranks chunks by similarity to `query_embedding`, best first, keeping at
/// most `top_k`. Chunks without an embedding are skipped, not scored at
/// zero, so sparse corpora still rank sensibly.
pub fn rank_chunks(
    query_embedding: &[f32],
    chunks: Vec<DocumentChunk>,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_deref()?;
            let score = cosine_similarity(query_embedding, embedding);
            Some(ScoredChunk { chunk, score })
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}
