/// Core LLM API types
///
/// Message and error types shared by the completion client and the
/// analysis engine's retry policy.
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// MESSAGE TYPES
// ============================================================================

/// Chat message with role and content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Message role in a chat conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors from the completion service
#[derive(Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Rate limited by the service
    RateLimited { retry_after_ms: Option<u64> },

    /// Request or stream timeout
    Timeout { timeout_ms: u64 },

    /// Authentication error
    AuthError { message: String },

    /// Network error
    NetworkError { message: String },

    /// Response body could not be decoded
    ParseError { message: String },

    /// Generic API error
    ApiError { status_code: u16, message: String },
}

impl LlmError {
    /// Rate-limit failure class: retried, and fatal to the session once the
    /// retry ceiling is exhausted. Covers explicit 429s, connection resets,
    /// and quota wording in error bodies.
    pub fn is_rate_limit_class(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::NetworkError { message } | LlmError::ApiError { message, .. } => {
                let message = message.to_lowercase();
                message.contains("connection reset")
                    || message.contains("rate limit")
                    || message.contains("quota")
            }
            _ => false,
        }
    }

    /// Transient failure class: retried, then skipped softly on exhaustion.
    /// Covers server errors, refused connections, and timeouts.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout { .. } => true,
            LlmError::ApiError { status_code, .. } => *status_code >= 500,
            LlmError::NetworkError { message } => {
                let message = message.to_lowercase();
                message.contains("connection refused") || message.contains("timeout")
            }
            _ => false,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::RateLimited { retry_after_ms } => {
                if let Some(ms) = retry_after_ms {
                    write!(f, "Rate limited (retry after {}ms)", ms)
                } else {
                    write!(f, "Rate limited")
                }
            }
            LlmError::Timeout { timeout_ms } => {
                write!(f, "Request timeout ({}ms)", timeout_ms)
            }
            LlmError::AuthError { message } => {
                write!(f, "Auth error: {}", message)
            }
            LlmError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            LlmError::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            LlmError::ApiError {
                status_code,
                message,
            } => {
                write!(f, "API error {}: {}", status_code, message)
            }
        }
    }
}

impl std::error::Error for LlmError {}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roles_serialize_lowercase() {
        let message = ChatMessage::system("be terse");
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""role":"system""#));

        let user = ChatMessage::user("hello");
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains(r#""role":"user""#));
    }

    #[test]
    fn rate_limit_class_covers_status_resets_and_quota_wording() {
        assert!(LlmError::RateLimited { retry_after_ms: None }.is_rate_limit_class());
        assert!(LlmError::NetworkError {
            message: "Connection reset by peer".to_string()
        }
        .is_rate_limit_class());
        assert!(LlmError::ApiError {
            status_code: 400,
            message: "daily quota exceeded".to_string()
        }
        .is_rate_limit_class());
        assert!(!LlmError::Timeout { timeout_ms: 1000 }.is_rate_limit_class());
    }

    #[test]
    fn transient_class_covers_timeouts_refusals_and_server_errors() {
        assert!(LlmError::Timeout { timeout_ms: 1000 }.is_transient());
        assert!(LlmError::NetworkError {
            message: "Connection refused (os error 111)".to_string()
        }
        .is_transient());
        assert!(LlmError::ApiError {
            status_code: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!LlmError::ApiError {
            status_code: 404,
            message: "not found".to_string()
        }
        .is_transient());
        assert!(!LlmError::RateLimited { retry_after_ms: None }.is_transient());
    }
}
