//! Storage abstraction for indexed documents.
//!
//! The [`VectorStore`] trait is the injected repository the engine reads
//! from. It owns the `(document, vector)` pairs for the whole corpus and
//! answers similarity queries over them. Callers decide its lifetime and
//! share it behind an `Arc`.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, RetrievalResult};

/// A document together with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// Abstract vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_all`](VectorStore::replace_all) | Swap in a complete snapshot |
/// | [`count`](VectorStore::count) | Number of indexed documents |
/// | [`vector_search`](VectorStore::vector_search) | Cosine similarity top-K |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Replace the entire contents, in corpus order. Readers observe either
    /// the old or the new snapshot, never a mix.
    async fn replace_all(&self, entries: Vec<IndexedDocument>) -> Result<()>;

    /// Number of indexed documents.
    async fn count(&self) -> Result<usize>;

    /// Rank every stored vector against `query_vec` and return the best
    /// `limit`, in descending similarity with ties in corpus order.
    async fn vector_search(&self, query_vec: &[f32], limit: usize)
        -> Result<Vec<RetrievalResult>>;
}
