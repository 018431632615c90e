//! Engine assembly from configuration.
//!
//! Loads the corpus and embedding cache, optionally indexes pending
//! documents, and wires the configured embedder, completer, and an
//! [`InMemoryStore`] into a [`RagEngine`].

use anyhow::{bail, Result};
use std::sync::Arc;

use energichain_rag_core::completion::Completer;
use energichain_rag_core::store::memory::InMemoryStore;
use energichain_rag_core::store::VectorStore;
use energichain_rag_core::RagEngine;

use crate::cache::VectorCache;
use crate::completion::{create_completer, DisabledCompleter};
use crate::config::Config;
use crate::corpus::load_corpus;
use crate::embedding::create_embedder;
use crate::index_cmd::index_documents;
use crate::progress::ProgressMode;

/// A ready-to-query engine plus the counts reported on startup and by `/health`.
pub struct LoadedEngine {
    pub engine: RagEngine,
    pub documents: usize,
    pub indexed: usize,
}

/// How much a command depends on the completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionUse {
    /// Retrieval only; no completer is built.
    Skip,
    /// The command cannot run without it; construction errors are fatal.
    Required,
    /// Construction errors are reported and the engine answers with
    /// [`ServiceError::CompletionDisabled`](energichain_rag_core::ServiceError).
    BestEffort,
}

fn build_completer(config: &Config, usage: CompletionUse) -> Result<Arc<dyn Completer>> {
    match usage {
        CompletionUse::Skip => Ok(Arc::new(DisabledCompleter)),
        CompletionUse::Required => create_completer(&config.completion),
        CompletionUse::BestEffort => match create_completer(&config.completion) {
            Ok(completer) => Ok(completer),
            Err(e) => {
                eprintln!(
                    "Warning: completion provider '{}' unavailable: {:#}. Answers are disabled.",
                    config.completion.provider, e
                );
                Ok(Arc::new(DisabledCompleter))
            }
        },
    }
}

/// Build the engine described by `config`.
///
/// With `[index].auto_index` enabled, documents missing from the cache are
/// embedded (and the cache saved) before the engine is returned. Documents
/// that still have no vector are left out of retrieval with a warning.
pub async fn load_engine(
    config: &Config,
    progress: ProgressMode,
    completion: CompletionUse,
) -> Result<LoadedEngine> {
    if !config.embedding.is_enabled() {
        bail!("Retrieval requires embeddings. Set [embedding] provider in config.");
    }

    let docs = load_corpus(&config.corpus.path)?;
    let embedder = create_embedder(&config.embedding)?;
    let completer = build_completer(config, completion)?;
    let mut cache = VectorCache::load(&config.index.cache_path)?;

    if config.index.auto_index {
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
        if stats.embedded > 0 {
            eprintln!("Indexed {} document(s) before startup", stats.embedded);
        }
    } else if cache.bind_model(embedder.model_name(), embedder.dims()) {
        eprintln!(
            "Warning: embedding cache was built with a different model; run `energichain index rebuild`"
        );
    }

    let entries = cache.indexed_documents(&docs);
    let indexed = entries.len();
    if indexed < docs.len() {
        eprintln!(
            "Warning: {} of {} documents have no embedding and will not be searched; run `energichain index pending`",
            docs.len() - indexed,
            docs.len()
        );
    }

    let store = Arc::new(InMemoryStore::new());
    store.replace_all(entries).await?;
    let engine = RagEngine::new(embedder, completer, store)
        .with_default_top_k(config.retrieval.top_k);

    Ok(LoadedEngine {
        engine,
        documents: docs.len(),
        indexed,
    })
}
