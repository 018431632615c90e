//! # EnergiChain knowledge assistant CLI (`energichain`)
//!
//! Answers LPG customer questions (safety, ordering, delivery, payments,
//! cylinder care) from a curated knowledge base.
//!
//! ## Usage
//!
//! ```bash
//! energichain --config ./config/energichain.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `energichain corpus` | List the knowledge-base documents |
//! | `energichain index pending` | Embed documents missing from the cache |
//! | `energichain index rebuild` | Discard the cache and re-embed everything |
//! | `energichain search "<query>"` | Top-K documents for a query |
//! | `energichain ask "<question>"` | Answer a question with sources |
//! | `energichain serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Build the embedding cache
//! energichain index pending
//!
//! # Retrieve the three closest documents
//! energichain search "I smell gas near the cylinder"
//!
//! # Answer in Swahili
//! energichain ask "How do I pay with M-Pesa?" --language sw
//!
//! # Serve /api/rag/search and /api/rag/answer
//! energichain serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use energichain_rag::config;
use energichain_rag::corpus;
use energichain_rag::index_cmd;
use energichain_rag::progress::ProgressMode;
use energichain_rag::search;
use energichain_rag::server;

/// EnergiChain knowledge assistant: retrieval-augmented answers over the
/// LPG platform knowledge base.
#[derive(Parser)]
#[command(
    name = "energichain",
    about = "EnergiChain knowledge assistant: retrieval-augmented answers for LPG customers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/energichain.toml")]
    config: PathBuf,

    /// Indexing progress on stderr: `human`, `json`, or `off`.
    /// Defaults to `human` when stderr is a terminal.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List knowledge-base documents and category counts.
    Corpus,

    /// Manage the embedding cache.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Retrieve the documents most similar to a query.
    Search {
        /// The search query string.
        query: String,

        /// Number of documents to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print `{"results": [...]}` instead of the human listing.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from retrieved context.
    Ask {
        /// The customer question.
        question: String,

        /// Response language code (e.g., `en`, `sw`, `hi`).
        #[arg(long, default_value = "en")]
        language: String,

        /// Number of documents used as context.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print `{"answer", "sources", "confidence"}` as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to `[server].bind` and serves `/api/rag/search`,
    /// `/api/rag/answer`, and `/health`.
    Serve,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Embed documents that are missing from the cache or have changed.
    Pending {
        /// Show counts without calling the embedding provider.
        #[arg(long)]
        dry_run: bool,
    },

    /// Discard every cached vector and re-embed the whole corpus.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let progress = ProgressMode::from_flag(cli.progress.as_deref())?;
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Corpus => {
            corpus::list_corpus(&cfg)?;
        }
        Commands::Index { action } => match action {
            IndexAction::Pending { dry_run } => {
                index_cmd::run_index_pending(&cfg, dry_run, progress).await?;
            }
            IndexAction::Rebuild => {
                index_cmd::run_index_rebuild(&cfg, progress).await?;
            }
        },
        Commands::Search {
            query,
            top_k,
            json,
        } => {
            search::run_search(&cfg, &query, top_k, json, progress).await?;
        }
        Commands::Ask {
            question,
            language,
            top_k,
            json,
        } => {
            search::run_ask(&cfg, &question, &language, top_k, json, progress).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
