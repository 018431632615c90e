//! The retrieval-augmented generation engine.
//!
//! [`RagEngine`] owns no global state: the embedding backend, completion
//! backend, and vector store are injected by the caller and shared through
//! `Arc`s, so the same engine can serve concurrent requests.

use std::sync::Arc;

use anyhow::Result;

use crate::answer::{build_prompt, confidence, FALLBACK_ANSWER};
use crate::completion::{Completer, CompletionRequest};
use crate::embedding::Embedder;
use crate::models::{Answer, RetrievalResult, SourceRef};
use crate::retrieve::{retrieve, DEFAULT_TOP_K};
use crate::store::VectorStore;

/// Retrieval + generation over an injected store.
#[derive(Clone)]
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            completer,
            store,
            default_top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the number of documents retrieved when a caller gives none.
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    /// Top-K documents for `query`, best first.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        let k = top_k.unwrap_or(self.default_top_k);
        retrieve(self.embedder.as_ref(), self.store.as_ref(), query, k).await
    }

    /// Answer `question` in `language`, grounded on the top-K documents.
    ///
    /// When nothing is retrieved the canned [`FALLBACK_ANSWER`] is returned
    /// with zero confidence and the completion service is not called.
    pub async fn answer(
        &self,
        question: &str,
        language: &str,
        top_k: Option<usize>,
    ) -> Result<Answer> {
        let results = self.search(question, top_k).await?;

        if results.is_empty() {
            return Ok(Answer {
                text: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
            });
        }

        let prompt = build_prompt(question, language, &results);
        let request = CompletionRequest {
            prompt: &prompt,
            question,
            language,
            context: &results,
        };
        let text = self.completer.complete(&request).await?;

        Ok(Answer {
            text: text.trim().to_string(),
            sources: results.iter().map(SourceRef::from).collect(),
            confidence: confidence(&results),
        })
    }
}
