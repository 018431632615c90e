//! Knowledge-base corpus loading.
//!
//! The corpus is a JSON array of documents:
//!
//! ```json
//! [{"id": "safety-001", "title": "Gas Leak Detection", "content": "...", "category": "safety"}]
//! ```
//!
//! Any failure here is fatal at startup: a missing file, malformed JSON, an
//! empty id, or a duplicate id.

use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use energichain_rag_core::models::Document;

use crate::config::Config;

/// Load and validate the corpus file.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
    parse_corpus(&content).with_context(|| format!("Invalid corpus file: {}", path.display()))
}

/// Parse and validate corpus JSON.
pub fn parse_corpus(json: &str) -> Result<Vec<Document>> {
    let docs: Vec<Document> = serde_json::from_str(json).context("malformed corpus JSON")?;

    let mut seen = HashSet::new();
    for (i, doc) in docs.iter().enumerate() {
        if doc.id.trim().is_empty() {
            bail!("document at index {} has an empty id", i);
        }
        if !seen.insert(doc.id.as_str()) {
            bail!("duplicate document id: {}", doc.id);
        }
        if doc.content.trim().is_empty() {
            eprintln!("Warning: document {} has empty content", doc.id);
        }
    }

    Ok(docs)
}

/// `energichain corpus`: validate the corpus and print a summary.
pub fn list_corpus(config: &Config) -> Result<()> {
    let docs = load_corpus(&config.corpus.path)?;

    println!("corpus {}", config.corpus.path.display());
    println!("  documents: {}", docs.len());

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in &docs {
        *by_category.entry(doc.category.as_str()).or_default() += 1;
    }
    for (category, count) in &by_category {
        println!("  {:<16} {}", category, count);
    }

    if !docs.is_empty() {
        println!();
        println!("{:<20} {:<16} TITLE", "ID", "CATEGORY");
        for doc in &docs {
            println!("{:<20} {:<16} {}", doc.id, doc.category, doc.title);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_corpus_in_order() {
        let docs = parse_corpus(
            r#"[
                {"id": "b", "title": "B", "content": "second", "category": "ordering"},
                {"id": "a", "title": "A", "content": "first"}
            ]"#,
        )
        .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "b");
        assert_eq!(docs[1].category, "general");
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_corpus("[]").unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = parse_corpus(
            r#"[{"id":"d1","title":"x","content":"y"},{"id":"d1","title":"z","content":"w"}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate document id: d1"));
    }

    #[test]
    fn empty_id_rejected() {
        assert!(parse_corpus(r#"[{"id":"  ","title":"x","content":"y"}]"#).is_err());
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(parse_corpus(r#"{"id":"d1"}"#).is_err());
        assert!(parse_corpus(r#"[{"id":"d1","content":"no title"}]"#).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_corpus(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read corpus file"));
    }
}
