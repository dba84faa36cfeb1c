/// Errors returned by the prompt queue registry
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Shared store unreachable or rejected a command
    #[error("queue backend error: {0}")]
    Backend(String),

    /// Signal payload could not be encoded
    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}
