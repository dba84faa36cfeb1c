//! Provider-agnostic request and stream types

use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Token usage reported by a provider, in billable units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_units: u32,
    pub completion_units: u32,
}

/// One item of a normalized provider stream
///
/// A stream carries any number of `Pending` deltas and at most one
/// `Done`. `Done { usage: None }` means the upstream closed without
/// reporting usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Pending { content_delta: String },
    Done { usage: Option<Usage> },
}

/// A generation request, immutable once dispatch begins
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub request_id: String,
    pub user_id: String,
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub explicit_provider_id: Option<String>,
}

/// Payload handed to a stream adapter
///
/// `model` is already the upstream model id for the target provider.
/// `middle_out` is only honored by aggregator providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub end_user_id: String,
    pub middle_out: bool,
}
