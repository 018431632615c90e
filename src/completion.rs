//! Completion backends.
//!
//! Concrete implementations of [`Completer`]:
//! - **[`DisabledCompleter`]**: fails with [`ServiceError::CompletionDisabled`].
//! - **[`OpenAICompleter`]**: `POST {url}/chat/completions` with retry and backoff.
//! - **[`OllamaCompleter`]**: `POST {url}/api/chat` with `stream: false`.
//! - **[`ExtractiveCompleter`]**: offline; quotes the best-matching document.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use energichain_rag_core::completion::{Completer, CompletionRequest};
use energichain_rag_core::ServiceError;

use crate::config::CompletionConfig;
use crate::retry::{build_client, post_json_with_retry, ServiceKind};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Create the [`Completer`] named by `[completion].provider`.
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAICompleter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        "extractive" => Ok(Arc::new(ExtractiveCompleter)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

fn required_model(config: &CompletionConfig) -> Result<String> {
    config.model.clone().ok_or_else(|| {
        anyhow::anyhow!("completion.model required for {} provider", config.provider)
    })
}

fn chat_messages(request: &CompletionRequest<'_>) -> serde_json::Value {
    serde_json::json!([
        {"role": "system", "content": request.prompt.system},
        {"role": "user", "content": request.prompt.user},
    ])
}

// ============ Disabled ============

pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String> {
        Err(ServiceError::CompletionDisabled.into())
    }
}

// ============ OpenAI ============

/// Chat-completions client for OpenAI or a compatible gateway.
/// Requires `OPENAI_API_KEY`.
pub struct OpenAICompleter {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());
        Ok(Self {
            model: required_model(config)?,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(request),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/chat/completions", self.url),
            Some(&self.api_key),
            &body,
            self.max_retries,
            ServiceKind::Completion,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ServiceError::Completion("Invalid OpenAI response: missing choices[0].message".into())
                .into()
        })
}

// ============ Ollama ============

/// Chat client for a local Ollama instance (non-streaming).
pub struct OllamaCompleter {
    model: String,
    url: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
        Ok(Self {
            model: required_model(config)?,
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(request),
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/chat", self.url),
            None,
            &body,
            self.max_retries,
            ServiceKind::Completion,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ServiceError::Completion("Invalid Ollama response: missing message.content".into())
                .into()
        })
}

// ============ Extractive ============

/// Offline completer: answers with the content of the best-matching
/// document, citing it as `[1]`.
pub struct ExtractiveCompleter;

#[async_trait]
impl Completer for ExtractiveCompleter {
    fn model_name(&self) -> &str {
        "extractive"
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let best = request
            .context
            .first()
            .ok_or_else(|| ServiceError::Completion("no context to extract from".into()))?;
        Ok(format!(
            "According to \"{}\" [1]: {}",
            best.document.title,
            best.document.content.trim()
        ))
    }
}
