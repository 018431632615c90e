//! Core data models for the knowledge assistant.
//!
//! These types flow from the corpus file through indexing and retrieval to
//! the generated answer.

use serde::{Deserialize, Serialize};

fn default_category() -> String {
    "general".to_string()
}

/// A knowledge-base document. Immutable once loaded; identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            category: category.into(),
        }
    }

    /// The text sent to the embedding service for this document.
    pub fn embed_text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

/// A document paired with its cosine similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub document: Document,
    pub similarity: f32,
}

/// Wire projection of a [`RetrievalResult`], shared by the search and
/// answer responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub title: String,
    pub category: String,
    pub similarity: f32,
}

impl From<&RetrievalResult> for SourceRef {
    fn from(r: &RetrievalResult) -> Self {
        Self {
            id: r.document.id.clone(),
            title: r.document.title.clone(),
            category: r.document.category.clone(),
            similarity: r.similarity,
        }
    }
}

/// A generated answer with the documents it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    /// Mean similarity of the retrieved documents. Not a calibrated probability.
    pub confidence: f32,
}
