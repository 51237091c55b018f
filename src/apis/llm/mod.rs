/// LLM backend abstraction
///
/// One trait, one live implementation (the Cortensor router node). The
/// analysis engine only sees the trait, which keeps the retry and parsing
/// logic testable against scripted backends.
pub mod cortensor;
pub mod sse;
pub mod types;

pub use self::cortensor::CortensorClient;
pub use self::types::{ChatMessage, LlmError, MessageRole};

use async_trait::async_trait;

/// Completion transport used by the analysis engine
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Single-shot completion for a raw prompt
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// SSE-streamed completion, resolved to the fully accumulated text
    async fn complete_streaming(&self, prompt: &str) -> Result<String, LlmError>;

    /// Chat-style completion, used as a fallback when raw completions
    /// come back unparseable
    async fn chat_complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Advisory liveness probe; failures are logged, never fatal
    async fn health_check(&self) -> bool;
}
