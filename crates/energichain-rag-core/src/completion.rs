//! Completion service trait.
//!
//! A [`Completer`] turns an assembled [`Prompt`](crate::answer::Prompt)
//! into answer text. Backends (OpenAI chat completions, Ollama chat,
//! offline extractive answers) live in the application crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::answer::Prompt;
use crate::models::RetrievalResult;

/// Everything a completion backend may use to produce an answer.
///
/// Network backends send `prompt`; offline backends may read `context`
/// directly instead.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a Prompt,
    pub question: &'a str,
    pub language: &'a str,
    /// Retrieved documents, best match first. Never empty.
    pub context: &'a [RetrievalResult],
}

/// A text-generation backend.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
    /// Generate answer text for the request.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String>;
}
