//! Wire types for OpenAI-style streaming chat completions
//!
//! Both provider families speak this dialect. Aggregators add a few
//! request fields, which are left unset for direct providers.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Usage};

/// Streaming chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    /// End-user identifier forwarded for upstream abuse tracking
    pub user: &'a str,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Aggregator usage accounting switch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageOptions>,
    /// Aggregator prompt transforms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transforms: Option<Vec<&'static str>>,
}

/// Ask for a final chunk carrying token usage
#[derive(Debug, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

/// Aggregator equivalent of [`StreamOptions`]
#[derive(Debug, Serialize)]
pub struct UsageOptions {
    pub include: bool,
}

/// One `data:` payload of the event stream
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
    /// In-band error reported after the stream opened
    #[serde(default)]
    pub error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Self {
            prompt_units: usage.prompt_tokens,
            completion_units: usage.completion_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl WireError {
    /// Message with the error code folded in, for classification
    pub fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{} ({code})", self.message),
            None => self.message.clone(),
        }
    }
}
