//! Brute-force cosine retrieval.
//!
//! 1. Embed the query with the same service used for the corpus.
//! 2. Score every stored vector with [`cosine_similarity`].
//! 3. Stable-sort by score (desc); ties keep corpus order.
//! 4. Truncate to `top_k`.
//!
//! The scan is O(N·D) per query, which is fine for a corpus of a few dozen
//! documents.

use anyhow::Result;

use crate::embedding::{cosine_similarity, embed_one, Embedder};
use crate::models::{Document, RetrievalResult};
use crate::store::VectorStore;

/// Default number of documents returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Score `candidates` against `query_vec` and keep the best `limit`.
///
/// Candidates must be supplied in corpus order; the sort is stable, so equal
/// scores stay in that order.
pub fn rank<'a, I>(query_vec: &[f32], candidates: I, limit: usize) -> Vec<RetrievalResult>
where
    I: IntoIterator<Item = (&'a Document, &'a [f32])>,
{
    let mut scored: Vec<(&Document, f32)> = candidates
        .into_iter()
        .map(|(doc, vec)| (doc, cosine_similarity(query_vec, vec)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(doc, similarity)| RetrievalResult {
            document: doc.clone(),
            similarity,
        })
        .collect()
}

/// Retrieve the `top_k` documents most similar to `query`.
///
/// A blank query returns no results without calling the embedding service.
pub async fn retrieve(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievalResult>> {
    if query.trim().is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }
    if store.count().await? == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embed_one(embedder, query).await?;
    store.vector_search(&query_vec, top_k).await
}
