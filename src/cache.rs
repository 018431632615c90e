//! On-disk embedding cache.
//!
//! Persists the `document id → vector` mapping so a restart does not
//! re-embed the corpus. Each entry carries the SHA-256 of the text that was
//! embedded; an entry is reused only while that hash, the model name, and
//! the vector length still match.
//!
//! ```json
//! {
//!   "model": "text-embedding-3-small",
//!   "dims": 1536,
//!   "updated_at": "2026-10-19T08:00:00Z",
//!   "entries": { "safety-001": { "hash": "9f2c…", "vector": [0.013, -0.021, …] } }
//! }
//! ```
//!
//! Writes go to a temporary sibling file that is then renamed over the
//! cache, so a crash mid-write leaves the previous cache intact.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use energichain_rag_core::embedding::hash_text;
use energichain_rag_core::models::Document;
use energichain_rag_core::store::IndexedDocument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorCache {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub dims: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
}

impl VectorCache {
    /// An empty cache bound to `model` and `dims`.
    pub fn new(model: &str, dims: usize) -> Self {
        Self {
            model: model.to_string(),
            dims,
            updated_at: None,
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache file. A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read embedding cache: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| {
            format!(
                "Malformed embedding cache: {} (run `energichain index rebuild`)",
                path.display()
            )
        })
    }

    /// Atomically write the cache file, stamping `updated_at`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create cache directory: {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write embedding cache: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace embedding cache: {}", path.display()))?;
        Ok(())
    }

    /// Re-bind the cache to `model`/`dims`. Entries produced by a different
    /// model are discarded. Returns `true` if anything was dropped.
    pub fn bind_model(&mut self, model: &str, dims: usize) -> bool {
        if self.model == model && self.dims == dims {
            return false;
        }
        let had_entries = !self.entries.is_empty();
        *self = Self::new(model, dims);
        had_entries
    }

    /// Whether the cached vector for `doc` can be reused.
    pub fn is_fresh(&self, doc: &Document) -> bool {
        match self.entries.get(&doc.id) {
            Some(entry) => {
                entry.vector.len() == self.dims && entry.hash == hash_text(&doc.embed_text())
            }
            None => false,
        }
    }

    /// Documents that need embedding, in corpus order.
    pub fn pending<'a>(&self, docs: &'a [Document]) -> Vec<&'a Document> {
        docs.iter().filter(|d| !self.is_fresh(d)).collect()
    }

    pub fn insert(&mut self, doc: &Document, vector: Vec<f32>) {
        self.entries.insert(
            doc.id.clone(),
            CacheEntry {
                hash: hash_text(&doc.embed_text()),
                vector,
            },
        );
    }

    /// Drop entries for ids not in `docs`. Returns the number removed.
    pub fn prune(&mut self, docs: &[Document]) -> usize {
        let ids: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let before = self.entries.len();
        self.entries.retain(|id, _| ids.contains(id.as_str()));
        before - self.entries.len()
    }

    /// Pair every document that has a fresh vector with it, in corpus order.
    pub fn indexed_documents(&self, docs: &[Document]) -> Vec<IndexedDocument> {
        docs.iter()
            .filter(|d| self.is_fresh(d))
            .filter_map(|d| {
                self.entries.get(&d.id).map(|e| IndexedDocument {
                    document: d.clone(),
                    vector: e.vector.clone(),
                })
            })
            .collect()
    }
}
