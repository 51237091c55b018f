/// Cortensor wire types
///
/// Request/response shapes for the router-node REST API. Response bodies
/// vary across router builds, so every alias the node has been observed to
/// emit is modeled and the extractors take the first populated one.
use serde::{Deserialize, Serialize};

use crate::apis::llm::ChatMessage;

/// Synchronous completion request body
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub stream: bool,
    /// Server-side generation timeout in seconds
    pub timeout: u64,
}

/// Streaming completion request body
#[derive(Debug, Clone, Serialize)]
pub struct StreamCompletionRequest {
    pub prompt: String,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

fn populated(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl CompletionResponse {
    /// Completion text: `response` | `choices[0].text` | `text`, else empty
    pub fn completion_text(&self) -> String {
        populated(&self.response)
            .or_else(|| self.choices.first().and_then(|c| populated(&c.text)))
            .or_else(|| populated(&self.text))
            .unwrap_or_default()
            .to_string()
    }

    /// Chat text: `choices[0].message.content` | `response`, else empty
    pub fn chat_text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| populated(&m.content))
            .or_else(|| populated(&self.response))
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_text_takes_first_populated_alias() {
        let direct: CompletionResponse =
            serde_json::from_str(r#"{"response":"direct"}"#).unwrap();
        assert_eq!(direct.completion_text(), "direct");

        let choice: CompletionResponse =
            serde_json::from_str(r#"{"response":"","choices":[{"text":"from choice"}]}"#).unwrap();
        assert_eq!(choice.completion_text(), "from choice");

        let flat: CompletionResponse = serde_json::from_str(r#"{"text":"flat"}"#).unwrap();
        assert_eq!(flat.completion_text(), "flat");

        let empty: CompletionResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(empty.completion_text(), "");
    }

    #[test]
    fn chat_text_prefers_message_content() {
        let chat: CompletionResponse = serde_json::from_str(
            r#"{"response":"fallback","choices":[{"message":{"content":"from chat"}}]}"#,
        )
        .unwrap();
        assert_eq!(chat.chat_text(), "from chat");

        let fallback: CompletionResponse =
            serde_json::from_str(r#"{"response":"fallback","choices":[]}"#).unwrap();
        assert_eq!(fallback.chat_text(), "fallback");
    }

    #[test]
    fn request_bodies_match_the_wire_contract() {
        let body = serde_json::to_value(CompletionRequest {
            prompt: "p".to_string(),
            stream: false,
            timeout: 60,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"prompt":"p","stream":false,"timeout":60}));

        let body = serde_json::to_value(StreamCompletionRequest {
            prompt: "p".to_string(),
            stream: true,
            max_tokens: 2000,
            temperature: 0.2,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"prompt":"p","stream":true,"max_tokens":2000,"temperature":0.2})
        );

        let body = serde_json::to_value(ChatCompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            stream: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"messages":[{"role":"user","content":"hi"}],"stream":false})
        );
    }
}
