use genline_core::HttpError;
use http::StatusCode;
use thiserror::Error;

/// Provider error text that means the request itself is too large
const CONTEXT_LENGTH_PATTERNS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "context length",
    "context window",
    "too many tokens",
    "token limit",
    "prompt is too long",
    "reduce the length of the messages",
];

/// Errors that can occur while resolving or streaming from a provider
#[derive(Debug, Error)]
pub enum LlmError {
    /// Requested model is not configured
    #[error("model not found: {model}")]
    ModelNotFound { model: String },

    /// Named provider does not exist, or no provider serves the model
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Provider is disabled and has nowhere to fall back to
    #[error("provider disabled: {provider}")]
    ProviderDisabled { provider: String },

    /// Request exceeds the model's context length
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Upstream connection or HTTP failure
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Failure after the stream was established
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Fallback chain is longer than the configured hop limit
    #[error("fallback chain starting at {provider} exceeds {depth} hops")]
    FallbackDepthExceeded { provider: String, depth: usize },

    /// Stream ran past the configured maximum duration
    #[error("stream exceeded {seconds}s without finishing")]
    StreamTimeout { seconds: u64 },

    /// Stream finished without a usage report
    #[error("provider {provider} finished without reporting usage")]
    UsageUnavailable { provider: String },
}

impl LlmError {
    /// Whether switching to the fallback provider may succeed
    ///
    /// Context-length violations are excluded: every provider would
    /// reject the same oversized request.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Streaming(_))
    }

    /// Build an error from provider-reported failure text
    pub fn from_upstream_message(message: String) -> Self {
        if is_context_length_message(&message) {
            Self::ContextLengthExceeded(message)
        } else {
            Self::Upstream(message)
        }
    }
}

/// Whether provider error text reports a context-length violation
pub fn is_context_length_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTEXT_LENGTH_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotFound { .. } | Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ProviderDisabled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::ContextLengthExceeded(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::Streaming(_) | Self::FallbackDepthExceeded { .. } => StatusCode::BAD_GATEWAY,
            Self::StreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::UsageUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::ModelNotFound { .. } | Self::ProviderNotFound { .. } => "not_found_error",
            Self::ProviderDisabled { .. } => "provider_disabled_error",
            Self::ContextLengthExceeded(_) => "context_length_exceeded",
            Self::Upstream(_) | Self::FallbackDepthExceeded { .. } => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::StreamTimeout { .. } => "timeout_error",
            Self::UsageUnavailable { .. } => "usage_unavailable",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
