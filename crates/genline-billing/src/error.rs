use genline_core::HttpError;
use http::StatusCode;

/// Errors returned by subscription ledgers
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// HTTP transport or connection error
    #[error("billing request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Ledger service returned a non-success status
    #[error("billing API error ({status}): {message}")]
    Api {
        /// HTTP status from the ledger service
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// Ledger selected but not configured
    #[error("billing is not configured")]
    NotConfigured,

    /// Balance does not cover the estimated cost
    #[error("insufficient balance: {balance} caps available, {required} required")]
    InsufficientBalance {
        /// Current balance
        balance: i64,
        /// Estimated cost of the request
        required: u64,
    },
}

impl HttpError for BillingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::Request(_) | Self::Api { .. } => StatusCode::BAD_GATEWAY,
            Self::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::Request(_) | Self::Api { .. } | Self::NotConfigured => "billing_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::InsufficientBalance { .. } => self.to_string(),
            _ => "billing service unavailable".to_owned(),
        }
    }
}
