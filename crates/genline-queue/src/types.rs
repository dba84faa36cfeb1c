use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A batch of prompts submitted under one queue id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptQueue {
    pub queue_id: String,
    pub user_id: String,
    pub prompt_count: usize,
    pub created_at: Timestamp,
}

impl PromptQueue {
    /// New queue with a random id
    pub fn new(user_id: impl Into<String>, prompt_count: usize) -> Self {
        Self {
            queue_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            prompt_count,
            created_at: Timestamp::now(),
        }
    }
}

/// Fire-and-forget request to stop a running batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationSignal {
    pub queue_id: String,
    /// User who asked for the cancellation
    pub user_id: String,
}
