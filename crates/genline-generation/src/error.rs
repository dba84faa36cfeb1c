use genline_billing::BillingError;
use genline_core::HttpError;
use genline_llm::LlmError;
use genline_queue::QueueError;
use http::StatusCode;

use crate::store::StoreError;

/// Errors raised before a generation or batch starts streaming
///
/// Failures after streaming began are reported through the job outcome
/// instead, since the caller's response is already committed.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Model or provider resolution failed
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Balance check failed or was insufficient
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Prompt queue registry unavailable
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Message record could not be written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Batch submitted without prompts
    #[error("prompt batch is empty")]
    EmptyBatch,
}

impl HttpError for GenerationError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Llm(e) => e.status_code(),
            Self::Billing(e) => e.status_code(),
            Self::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmptyBatch => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Llm(e) => e.error_type(),
            Self::Billing(e) => e.error_type(),
            Self::Queue(_) => "queue_unavailable",
            Self::Store(_) => "internal_error",
            Self::EmptyBatch => "invalid_request_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Llm(e) => e.client_message(),
            Self::Billing(e) => e.client_message(),
            Self::Queue(_) => "prompt queue registry unavailable".to_owned(),
            Self::Store(_) => "internal error".to_owned(),
            Self::EmptyBatch => self.to_string(),
        }
    }
}
