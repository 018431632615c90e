//! In-memory [`VectorStore`] implementation.
//!
//! Entries live in a `Vec` (corpus order) behind `std::sync::RwLock`.
//! Vector search is brute-force cosine similarity over all stored vectors,
//! O(N·D) per query.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::RetrievalResult;
use crate::retrieve::rank;

use super::{IndexedDocument, VectorStore};

/// In-memory store shared between the indexer and request handlers.
pub struct InMemoryStore {
    entries: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<IndexedDocument>>> {
        self.entries
            .read()
            .map_err(|_| anyhow!("vector store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexedDocument>>> {
        self.entries
            .write()
            .map_err(|_| anyhow!("vector store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn replace_all(&self, new_entries: Vec<IndexedDocument>) -> Result<()> {
        let mut entries = self.write()?;
        *entries = new_entries;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let entries = self.read()?;
        Ok(rank(
            query_vec,
            entries.iter().map(|e| (&e.document, e.vector.as_slice())),
            limit,
        ))
    }
}
