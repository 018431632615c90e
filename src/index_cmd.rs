//! Embedding indexer.
//!
//! Embeds every document whose cached vector is missing or stale and
//! persists the result to the embedding cache. The cache is checkpointed
//! after each batch, so an interrupted or partially failed run loses at most
//! one batch of work and a rerun only embeds what is still missing.
//!
//! A batch that fails is retried one document at a time, so a single bad
//! document (or a transient failure) does not sink the rest of the batch.

use anyhow::{bail, Result};
use std::path::Path;

use energichain_rag_core::embedding::Embedder;
use energichain_rag_core::models::Document;

use crate::cache::VectorCache;
use crate::config::Config;
use crate::corpus::load_corpus;
use crate::embedding::create_embedder;
use crate::progress::{IndexProgressEvent, IndexProgressReporter, ProgressMode};

/// Counts from one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total: usize,
    pub pending: usize,
    pub embedded: usize,
    pub failed: usize,
    pub pruned: usize,
    /// Whether the cache file was written.
    pub written: bool,
}

/// Bring `cache` up to date with `docs`.
///
/// When `checkpoint` is set, the cache is saved there after every batch that
/// produced vectors, and once more at the end if entries were pruned or
/// invalidated. An unchanged corpus over a warm cache makes no embedding
/// calls and writes nothing.
pub async fn index_documents(
    embedder: &dyn Embedder,
    cache: &mut VectorCache,
    docs: &[Document],
    batch_size: usize,
    checkpoint: Option<&Path>,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexStats> {
    let mut stats = IndexStats {
        total: docs.len(),
        ..Default::default()
    };

    let mut dirty = cache.bind_model(embedder.model_name(), embedder.dims());
    stats.pruned = cache.prune(docs);
    dirty |= stats.pruned > 0;

    let pending = cache.pending(docs);
    stats.pending = pending.len();
    progress.report(IndexProgressEvent::Planned {
        pending: stats.pending as u64,
        total: stats.total as u64,
    });

    let mut processed = 0u64;

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|d| d.embed_text()).collect();
        let mut batch_embedded = 0usize;

        match embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (doc, vector) in batch.iter().zip(vectors) {
                    cache.insert(doc, vector);
                    batch_embedded += 1;
                }
            }
            outcome => {
                let reason = match outcome {
                    Ok(vectors) => format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    ),
                    Err(e) => e.to_string(),
                };

                if batch.len() == 1 {
                    eprintln!("Warning: embedding failed for {}: {}", batch[0].id, reason);
                    stats.failed += 1;
                } else {
                    eprintln!("Warning: embedding batch failed: {}", reason);
                    progress.report(IndexProgressEvent::BatchFallback {
                        size: batch.len() as u64,
                    });
                    for doc in batch {
                        match embed_single(embedder, doc).await {
                            Ok(vector) => {
                                cache.insert(doc, vector);
                                batch_embedded += 1;
                            }
                            Err(e) => {
                                eprintln!("Warning: embedding failed for {}: {}", doc.id, e);
                                stats.failed += 1;
                            }
                        }
                    }
                }
            }
        }

        stats.embedded += batch_embedded;
        processed += batch.len() as u64;
        progress.report(IndexProgressEvent::Embedding {
            n: processed,
            total: stats.pending as u64,
        });

        if batch_embedded > 0 {
            dirty = true;
            if let Some(path) = checkpoint {
                cache.save(path)?;
                stats.written = true;
                dirty = false;
            }
        }
    }

    if dirty {
        if let Some(path) = checkpoint {
            cache.save(path)?;
            stats.written = true;
        }
    }

    Ok(stats)
}

async fn embed_single(embedder: &dyn Embedder, doc: &Document) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[doc.embed_text()]).await?;
    match vectors.pop() {
        Some(v) if vectors.is_empty() => Ok(v),
        _ => bail!("expected exactly one embedding"),
    }
}

/// `energichain index pending`: embed missing or stale documents.
pub async fn run_index_pending(config: &Config, dry_run: bool, progress: ProgressMode) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let docs = load_corpus(&config.corpus.path)?;
    let embedder = create_embedder(&config.embedding)?;
    let mut cache = VectorCache::load(&config.index.cache_path)?;

    if dry_run {
        cache.bind_model(embedder.model_name(), embedder.dims());
        println!("index pending (dry-run)");
        println!("  documents: {}", docs.len());
        println!("  documents needing embeddings: {}", cache.pending(&docs).len());
        return Ok(());
    }

    let reporter = progress.reporter();
    let stats = index_documents(
        embedder.as_ref(),
        &mut cache,
        &docs,
        config.embedding.batch_size,
        Some(&config.index.cache_path),
        reporter.as_ref(),
    )
    .await?;

    println!("index pending");
    print_stats(&stats, &config.index.cache_path);

    if stats.failed > 0 {
        bail!(
            "{} document(s) failed to embed; rerun `energichain index pending` to retry",
            stats.failed
        );
    }
    Ok(())
}

/// `energichain index rebuild`: discard the cache and re-embed everything.
pub async fn run_index_rebuild(config: &Config, progress: ProgressMode) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let docs = load_corpus(&config.corpus.path)?;
    let embedder = create_embedder(&config.embedding)?;
    let mut cache = VectorCache::new(embedder.model_name(), embedder.dims());
    cache.save(&config.index.cache_path)?;

    println!("index rebuild: cleared existing embeddings");

    let reporter = progress.reporter();
    let stats = index_documents(
        embedder.as_ref(),
        &mut cache,
        &docs,
        config.embedding.batch_size,
        Some(&config.index.cache_path),
        reporter.as_ref(),
    )
    .await?;

    println!("index rebuild");
    print_stats(&stats, &config.index.cache_path);

    if stats.failed > 0 {
        bail!(
            "{} document(s) failed to embed; rerun `energichain index pending` to retry",
            stats.failed
        );
    }
    Ok(())
}

fn print_stats(stats: &IndexStats, cache_path: &Path) {
    println!("  documents: {}", stats.total);
    println!("  pending: {}", stats.pending);
    println!("  embedded: {}", stats.embedded);
    println!("  failed: {}", stats.failed);
    if stats.pruned > 0 {
        println!("  pruned: {}", stats.pruned);
    }
    if stats.pending == 0 {
        println!("  all documents up to date");
    }
    println!("  cache: {}", cache_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use energichain_rag_core::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("d1", "Leak", "turn off valve", "safety"),
            Document::new("d2", "Refill", "order a refill online", "ordering"),
            Document::new("d3", "Payment", "pay with mobile money", "payments"),
        ]
    }

    /// Wraps [`HashEmbedder`], counting calls and failing any batch that
    /// contains a poisoned text.
    struct FlakyEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
        poison: Option<&'static str>,
        fail_batches: bool,
    }

    impl FlakyEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::new(32),
                calls: AtomicUsize::new(0),
                poison: None,
                fail_batches: false,
            }
        }
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            32
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_batches && texts.len() > 1 {
                return Err(ServiceError::Embedding("batch too large".into()).into());
            }
            if let Some(p) = self.poison {
                if texts.iter().any(|t| t.contains(p)) {
                    return Err(ServiceError::Embedding("rejected input".into()).into());
                }
            }
            self.inner.embed(texts).await
        }
    }

    #[tokio::test]
    async fn cold_cache_embeds_everything_in_batches() {
        let embedder = FlakyEmbedder::new();
        let mut cache = VectorCache::default();
        let stats = index_documents(&embedder, &mut cache, &corpus(), 2, None, &NoProgress)
            .await
            .unwrap();

        assert_eq!(stats.pending, 3);
        assert_eq!(stats.embedded, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entries.len(), 3);
        assert_eq!(cache.model, "flaky");
    }

    #[tokio::test]
    async fn warm_cache_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        let docs = corpus();

        let embedder = FlakyEmbedder::new();
        let mut cache = VectorCache::default();
        index_documents(&embedder, &mut cache, &docs, 8, Some(&path), &NoProgress)
            .await
            .unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let second_embedder = FlakyEmbedder::new();
        let mut reloaded = VectorCache::load(&path).unwrap();
        let stats = index_documents(
            &second_embedder,
            &mut reloaded,
            &docs,
            8,
            Some(&path),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(stats.pending, 0);
        assert!(!stats.written);
        assert_eq!(second_embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[tokio::test]
    async fn only_changed_documents_are_reembedded() {
        let embedder = FlakyEmbedder::new();
        let mut cache = VectorCache::default();
        let mut docs = corpus();
        index_documents(&embedder, &mut cache, &docs, 8, None, &NoProgress)
            .await
            .unwrap();
        let untouched = cache.entries["d1"].clone();

        docs[1].content = "order a refill by phone".to_string();
        let stats = index_documents(&embedder, &mut cache, &docs, 8, None, &NoProgress)
            .await
            .unwrap();

        assert_eq!(stats.pending, 1);
        assert_eq!(stats.embedded, 1);
        assert_eq!(cache.entries["d1"], untouched);
    }

    #[tokio::test]
    async fn failed_batch_falls_back_per_document() {
        let mut embedder = FlakyEmbedder::new();
        embedder.fail_batches = true;
        let mut cache = VectorCache::default();
        let stats = index_documents(&embedder, &mut cache, &corpus(), 3, None, &NoProgress)
            .await
            .unwrap();

        assert_eq!(stats.embedded, 3);
        assert_eq!(stats.failed, 0);
        // One failed batch call, then one call per document.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn poisoned_document_fails_alone_and_rest_is_checkpointed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        let mut embedder = FlakyEmbedder::new();
        embedder.poison = Some("mobile money");

        let mut cache = VectorCache::default();
        let stats = index_documents(&embedder, &mut cache, &corpus(), 3, Some(&path), &NoProgress)
            .await
            .unwrap();

        assert_eq!(stats.embedded, 2);
        assert_eq!(stats.failed, 1);
        let saved = VectorCache::load(&path).unwrap();
        assert!(saved.entries.contains_key("d1"));
        assert!(saved.entries.contains_key("d2"));
        assert!(!saved.entries.contains_key("d3"));

        // Rerun with a healthy service picks up only the missing document.
        let healthy = FlakyEmbedder::new();
        let mut reloaded = VectorCache::load(&path).unwrap();
        let stats = index_documents(&healthy, &mut reloaded, &corpus(), 3, Some(&path), &NoProgress)
            .await
            .unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.embedded, 1);
    }

    #[tokio::test]
    async fn removed_documents_are_pruned() {
        let embedder = FlakyEmbedder::new();
        let mut cache = VectorCache::default();
        let docs = corpus();
        index_documents(&embedder, &mut cache, &docs, 8, None, &NoProgress)
            .await
            .unwrap();

        let stats = index_documents(&embedder, &mut cache, &docs[..1], 8, None, &NoProgress)
            .await
            .unwrap();
        assert_eq!(stats.pruned, 2);
        assert_eq!(cache.entries.len(), 1);
    }
}
