//! Bounded retry with exponential backoff for external service calls.
//!
//! Retry strategy shared by every HTTP provider:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts, including while reading the body → retry
//! - A complete 2xx body that is not JSON → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Each attempt is bounded by the client's per-call timeout, so a call
//! takes at most `(max_retries + 1) × timeout` plus backoff.

use anyhow::Result;
use std::time::Duration;

use energichain_rag_core::ServiceError;

/// Which service a call belongs to; selects the [`ServiceError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Embedding,
    Completion,
}

impl ServiceKind {
    fn error(self, message: String) -> ServiceError {
        match self {
            ServiceKind::Embedding => ServiceError::Embedding(message),
            ServiceKind::Completion => ServiceError::Completion(message),
        }
    }

    fn transport(self, err: &reqwest::Error, message: String) -> ServiceError {
        ServiceError::from_transport(self == ServiceKind::Embedding, err.is_timeout(), message)
    }
}

/// Build an HTTP client with a per-call timeout.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Whether a response status is worth retrying.
pub fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// POST `body` as JSON to `url`, retrying transient failures.
///
/// `label` names the upstream in error messages (e.g. `"OpenAI"`).
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    kind: ServiceKind,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err: Option<ServiceError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let bytes = match response.bytes().await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            last_err = Some(kind.transport(
                                &e,
                                format!("{} response body from {}: {}", label, url, e),
                            ));
                            continue;
                        }
                    };
                    return serde_json::from_slice(&bytes).map_err(|e| {
                        anyhow::Error::from(
                            kind.error(format!("{} returned invalid JSON: {}", label, e)),
                        )
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = kind.error(format!("{} API error {}: {}", label, status, body_text));

                if is_retryable(status) {
                    last_err = Some(err);
                    continue;
                }

                return Err(err.into());
            }
            Err(e) => {
                last_err = Some(kind.transport(
                    &e,
                    format!("{} request to {} failed: {}", label, url, e),
                ));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| kind.error(format!("{} request failed after retries", label)))
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve `app` on a free local port and return its base URL.
    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    async fn call(client: &reqwest::Client, url: &str, max_retries: u32) -> Result<Value> {
        post_json_with_retry(
            client,
            url,
            Some("test-key"),
            &json!({"input": ["leak"]}),
            max_retries,
            ServiceKind::Embedding,
            "stub",
        )
        .await
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(20), Duration::from_secs(32));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(reqwest::StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_service_error() {
        let client = build_client(2).unwrap();
        let err = call(&client, "http://127.0.0.1:1/embeddings", 0)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ServiceError>().is_some());
    }

    #[tokio::test]
    async fn server_error_then_success_retries_once() {
        async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, Json<Value>) {
            if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})))
            } else {
                (StatusCode::OK, Json(json!({"ok": true})))
            }
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(
            Router::new()
                .route("/embeddings", post(flaky))
                .with_state(hits.clone()),
        )
        .await;

        let client = build_client(5).unwrap();
        let body = call(&client, &format!("{}/embeddings", base), 1)
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        async fn rejected(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, Json<Value>) {
            hits.fetch_add(1, Ordering::SeqCst);
            (StatusCode::BAD_REQUEST, Json(json!({"error": "bad input"})))
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(
            Router::new()
                .route("/embeddings", post(rejected))
                .with_state(hits.clone()),
        )
        .await;

        let client = build_client(5).unwrap();
        let err = call(&client, &format!("{}/embeddings", base), 1)
            .await
            .unwrap_err();
        match err.downcast_ref::<ServiceError>() {
            Some(ServiceError::Embedding(msg)) => assert!(msg.contains("400"), "{}", msg),
            other => panic!("expected embedding error, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        async fn slow() -> Json<Value> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"ok": true}))
        }
        let base = spawn_stub(Router::new().route("/embeddings", post(slow))).await;

        let client = build_client(1).unwrap();
        let err = call(&client, &format!("{}/embeddings", base), 0)
            .await
            .unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ServiceError>(), Some(ServiceError::Timeout(_))),
            "expected timeout, got {:#}",
            err
        );
    }

    #[tokio::test]
    async fn stalled_body_times_out_and_retries() {
        // Headers arrive at once, then the body stops short of Content-Length.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"ok\":";
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                });
            }
        });

        let client = build_client(1).unwrap();
        let err = call(&client, &format!("http://{}/embeddings", addr), 1)
            .await
            .unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ServiceError>(), Some(ServiceError::Timeout(_))),
            "expected timeout, got {:#}",
            err
        );
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_json_success_body_is_not_retried() {
        async fn garbage(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
            hits.fetch_add(1, Ordering::SeqCst);
            "not json"
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(
            Router::new()
                .route("/embeddings", post(garbage))
                .with_state(hits.clone()),
        )
        .await;

        let client = build_client(5).unwrap();
        let err = call(&client, &format!("{}/embeddings", base), 1)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("invalid JSON"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
