//! # EnergiChain RAG
//!
//! Retrieval-augmented knowledge assistant for the EnergiChain LPG platform.
//!
//! A small curated corpus (safety procedures, ordering, delivery, payments,
//! cylinder care) is embedded once into a JSON cache. Queries are embedded at
//! request time, ranked by cosine similarity against every document, and the
//! best matches become numbered context for a completion model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Corpus JSON │──▶│   Indexer    │──▶│ Vector cache │
//! │  documents  │   │ embed+retry │   │    (JSON)     │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                           │
//!                                    ┌──────▼───────┐
//!                                    │  RagEngine   │
//!                                    │ rank+answer  │
//!                                    └──────┬───────┘
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │   CLI    │        │   HTTP   │
//!                 │  search  │        │ /api/rag │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! energichain index pending
//! energichain search "cylinder leak"
//! energichain ask "What should I do if I smell gas?"
//! energichain serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`corpus`] | Knowledge-base loading |
//! | [`cache`] | Persistent embedding cache |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, feature hashing) |
//! | [`completion`] | Completion providers (OpenAI, Ollama, extractive) |
//! | [`retry`] | Timeouts and bounded retry for provider calls |
//! | [`index_cmd`] | Incremental, idempotent indexing |
//! | [`engine`] | Engine assembly from configuration |
//! | [`search`] | `search` and `ask` commands |
//! | [`server`] | HTTP API |
//! | [`progress`] | Indexing progress on stderr |
//!
//! Ranking, prompt construction, and the store abstraction live in
//! `energichain-rag-core`.

pub mod cache;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod index_cmd;
pub mod progress;
pub mod retry;
pub mod search;
pub mod server;
