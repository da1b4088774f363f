//! OpenAI API data models for request/response handling.
//!
//! This module contains types that match the OpenAI chat completions wire
//! format. Domain types live in `fmgate-core`; this module handles the API
//! layer mapping.

use fmgate_core::{ChatMessage, MessageRole, UsageRecord};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Value of `owned_by` in the models listing.
pub const MODEL_OWNER: &str = "fmgate";

// =============================================================================
// Chat Completion Request Types
// =============================================================================

/// Request to /v1/chat/completions endpoint.
///
/// Unknown fields are ignored so that clients sending the full OpenAI
/// parameter set are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name to use. Echoed back in the response.
    pub model: String,
    /// Array of chat messages.
    pub messages: Vec<RequestMessage>,
    /// Whether to stream the response. `null` counts as false.
    #[serde(default)]
    pub stream: Option<bool>,
    /// Sampling temperature (0-2).
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Convert wire messages into domain messages, preserving order.
    ///
    /// Fails with a caller-facing message when a message carries content
    /// parts other than text.
    pub fn to_messages(&self) -> Result<Vec<ChatMessage>, String> {
        self.messages
            .iter()
            .map(RequestMessage::to_chat_message)
            .collect()
    }
}

/// A single chat message as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestMessage {
    /// Role: "system", "user" or "assistant".
    pub role: MessageRole,
    /// Message content; `null` is treated as empty.
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl RequestMessage {
    fn to_chat_message(&self) -> Result<ChatMessage, String> {
        let content = match &self.content {
            None => String::new(),
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => {
                let mut joined = String::new();
                for part in parts {
                    match (part.kind.as_str(), &part.text) {
                        ("text", Some(text)) => joined.push_str(text),
                        (kind, _) => {
                            return Err(format!("Unsupported content part type '{kind}'"));
                        }
                    }
                }
                joined
            }
        };
        Ok(ChatMessage::new(self.role, content))
    }
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of array-form message content.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

// =============================================================================
// Chat Completion Response Types
// =============================================================================

/// Response from /v1/chat/completions endpoint (non-streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

impl ChatCompletionResponse {
    /// Build a single-choice response with `finish_reason = "stop"`.
    pub fn new(
        id: String,
        created: i64,
        model: String,
        content: String,
        usage: &UsageRecord,
    ) -> Self {
        Self {
            id,
            object: "chat.completion".to_string(),
            created,
            model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage::from(usage),
        }
    }

    /// Content of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single chat completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

/// Streaming chunk from /v1/chat/completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
    /// Only present on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single streaming choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunkChoice {
    pub index: u32,
    pub delta: ChatDelta,
    /// Serialized as `null` until the final chunk.
    pub finish_reason: Option<String>,
}

/// Delta content in streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Token usage statistics.
///
/// Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub prompt_time: f64,
    pub completion_time: f64,
}

impl From<&UsageRecord> for Usage {
    fn from(record: &UsageRecord) -> Self {
        Self {
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            total_tokens: record.total_tokens(),
            prompt_time: record.prompt_latency.as_secs_f64(),
            completion_time: record.completion_latency.as_secs_f64(),
        }
    }
}

// =============================================================================
// Models Endpoint Types
// =============================================================================

/// Response from /v1/models endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    /// Listing with a single model.
    pub fn single(id: &str, created: i64) -> Self {
        Self {
            object: "list".to_string(),
            data: vec![ModelInfo {
                id: id.to_string(),
                object: "model".to_string(),
                created,
                owned_by: MODEL_OWNER.to_string(),
            }],
        }
    }
}

/// Information about a single model (OpenAI format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

// =============================================================================
// Error Response Types
// =============================================================================

/// Error response matching OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: kind.as_str().to_string(),
            },
        }
    }
}
