/// Cortensor router-node client (raw HTTP via reqwest)
///
/// Talks to a local Cortensor router node running the LLaMA 3.1 8B Q4
/// model.
///
/// Endpoints:
/// - POST {base}/api/v1/completions/{session_id}      - sync or SSE stream
/// - POST {base}/api/v1/chat/completions/{session_id} - chat fallback
/// - GET  {base}/health                               - advisory probe
///
/// Every request carries a freshly generated 8-hex-char session id used by
/// the node for correlation only. The bearer token is attached when
/// non-empty. No retries happen here; the retry policy lives in the
/// analysis engine.
pub mod types;

pub use self::types::{
    ChatCompletionRequest, CompletionRequest, CompletionResponse, StreamCompletionRequest,
};

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::apis::llm::sse::StreamAccumulator;
use crate::apis::llm::{ChatMessage, CompletionBackend, LlmError};
use crate::config;
use crate::logger::{self, LogTag};

// ============================================================================
// API CONFIGURATION
// ============================================================================

const ENDPOINT_COMPLETIONS: &str = "/api/v1/completions";
const ENDPOINT_CHAT_COMPLETIONS: &str = "/api/v1/chat/completions";
const ENDPOINT_HEALTH: &str = "/health";

/// Outer HTTP deadline for every request
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Wall-clock cap on a streamed completion, independent of chunk arrival
const STREAM_TIMEOUT_SECS: u64 = 120;
/// Server-side generation timeout sent in sync completion bodies
const COMPLETION_TIMEOUT_SECS: u64 = 60;
const STREAM_MAX_TOKENS: u32 = 2000;
const STREAM_TEMPERATURE: f64 = 0.2;

// ============================================================================
// CLIENT IMPLEMENTATION
// ============================================================================

pub struct CortensorClient {
    base_url: String,
    api_key: String,
    client: Client,
    timeout: Duration,
}

impl CortensorClient {
    /// Create a client against an explicit base URL and bearer token
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, String> {
        if base_url.trim().is_empty() {
            return Err("Completion service base URL cannot be empty".to_string());
        }

        let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout,
        })
    }

    /// Create a client from the process-wide settings
    pub fn from_settings() -> Result<Self, String> {
        config::with_settings(|s| Self::new(&s.base_url, &s.api_key))
    }

    /// Opaque per-request correlation id: 4 random bytes as lowercase hex
    fn generate_session_id() -> String {
        let bytes: [u8; 4] = rand::random();
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    /// Error text including the source chain, so failure-class matching
    /// sees the underlying "connection refused"/"connection reset" detail
    fn describe_error(error: &reqwest::Error) -> String {
        let mut message = error.to_string();
        let mut source = std::error::Error::source(error);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        message
    }

    fn map_send_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            LlmError::NetworkError {
                message: Self::describe_error(&error),
            }
        }
    }

    /// Map non-success statuses into the error taxonomy
    async fn check_status(response: Response) -> Result<Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Parse Retry-After before consuming the body
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);

        let body = response.text().await.unwrap_or_default();

        Err(match status.as_u16() {
            401 | 403 => LlmError::AuthError {
                message: if body.is_empty() {
                    "Invalid API key".to_string()
                } else {
                    body
                },
            },
            429 => LlmError::RateLimited { retry_after_ms },
            code => LlmError::ApiError {
                status_code: code,
                message: body,
            },
        })
    }

    async fn consume_stream(&self, response: Response) -> Result<String, LlmError> {
        let mut stream = response.bytes_stream();
        let mut accumulator = StreamAccumulator::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_send_error(e))?;
            let text = String::from_utf8_lossy(&chunk);
            if accumulator.push_chunk(&text) {
                break;
            }
        }

        // Stream end without the sentinel still resolves with what arrived
        Ok(accumulator.into_text())
    }
}

#[async_trait]
impl CompletionBackend for CortensorClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let session_id = Self::generate_session_id();
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_COMPLETIONS, session_id);

        logger::debug(
            LogTag::Llm,
            &format!("Completion request session={}", session_id),
        );

        let request = CompletionRequest {
            prompt: prompt.to_string(),
            stream: false,
            timeout: COMPLETION_TIMEOUT_SECS,
        };

        let response = self
            .apply_auth(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        let payload: CompletionResponse =
            response.json().await.map_err(|e| LlmError::ParseError {
                message: format!("Failed to decode completion response: {}", e),
            })?;

        Ok(payload.completion_text())
    }

    async fn complete_streaming(&self, prompt: &str) -> Result<String, LlmError> {
        let session_id = Self::generate_session_id();
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_COMPLETIONS, session_id);

        logger::debug(
            LogTag::Stream,
            &format!("Streaming completion request session={}", session_id),
        );

        let request = StreamCompletionRequest {
            prompt: prompt.to_string(),
            stream: true,
            max_tokens: STREAM_MAX_TOKENS,
            temperature: STREAM_TEMPERATURE,
        };

        let exchange = async {
            let response = self
                .apply_auth(
                    self.client
                        .post(&url)
                        .header("Accept", "text/event-stream")
                        .header("Cache-Control", "no-cache"),
                )
                .json(&request)
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;

            let response = Self::check_status(response).await?;
            self.consume_stream(response).await
        };

        match tokio::time::timeout(Duration::from_secs(STREAM_TIMEOUT_SECS), exchange).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                timeout_ms: STREAM_TIMEOUT_SECS * 1000,
            }),
        }
    }

    async fn chat_complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let session_id = Self::generate_session_id();
        let url = format!(
            "{}{}/{}",
            self.base_url, ENDPOINT_CHAT_COMPLETIONS, session_id
        );

        logger::debug(
            LogTag::Llm,
            &format!("Chat completion request session={}", session_id),
        );

        let request = ChatCompletionRequest {
            messages: messages.to_vec(),
            stream: false,
        };

        let response = self
            .apply_auth(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        let payload: CompletionResponse =
            response.json().await.map_err(|e| LlmError::ParseError {
                message: format!("Failed to decode chat response: {}", e),
            })?;

        Ok(payload.chat_text())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}{}", self.base_url, ENDPOINT_HEALTH);

        match self.apply_auth(self.client.get(&url)).send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                logger::warning(
                    LogTag::Llm,
                    &format!("Health check failed: status {}", response.status()),
                );
                false
            }
            Err(e) => {
                logger::warning(
                    LogTag::Llm,
                    &format!("Health check failed: {}", Self::describe_error(&e)),
                );
                false
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_eight_hex_chars() {
        for _ in 0..32 {
            let id = CortensorClient::generate_session_id();
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn new_rejects_empty_base_url_and_trims_trailing_slash() {
        assert!(CortensorClient::new("", "key").is_err());
        assert!(CortensorClient::new("   ", "key").is_err());

        let client = CortensorClient::new("http://127.0.0.1:5010/", "key").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:5010");
    }

    #[test]
    fn empty_api_key_sends_no_auth_header() {
        let client = CortensorClient::new("http://127.0.0.1:5010", "").unwrap();
        let request = client
            .apply_auth(client.client.get("http://127.0.0.1:5010/health"))
            .build()
            .unwrap();
        assert!(request.headers().get("Authorization").is_none());

        let client = CortensorClient::new("http://127.0.0.1:5010", "token").unwrap();
        let request = client
            .apply_auth(client.client.get("http://127.0.0.1:5010/health"))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Bearer token"
        );
    }
}
