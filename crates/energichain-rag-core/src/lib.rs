//! # EnergiChain RAG Core
//!
//! Runtime-agnostic logic for the EnergiChain knowledge assistant: data
//! models, the embedding and completion service traits, the vector store
//! abstraction, retrieval ranking, prompt assembly, and the [`RagEngine`]
//! that ties them together.
//!
//! This crate performs no file or network I/O. The application crate
//! supplies concrete [`Embedder`](embedding::Embedder) and
//! [`Completer`](completion::Completer) implementations and decides where
//! vectors are persisted.

pub mod answer;
pub mod completion;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod models;
pub mod retrieve;
pub mod store;

pub use engine::RagEngine;
pub use error::ServiceError;
