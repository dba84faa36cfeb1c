use axum::Json;
use axum::response::{IntoResponse, Response};
use genline_core::HttpError;
use genline_generation::GenerationError;
use genline_queue::QueueError;
use http::StatusCode;

/// Errors returned before a response is committed
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing caller identity")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl From<QueueError> for ApiError {
    fn from(error: QueueError) -> Self {
        Self::Generation(error.into())
    }
}

impl HttpError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Generation(e) => e.status_code(),
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Unauthorized => "authentication_error",
            Self::BadRequest(_) => "invalid_request_error",
            Self::Generation(e) => e.error_type(),
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Generation(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

/// `{"error": {"type", "message"}}` body for an error
pub fn error_body(error: &impl HttpError) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "type": error.error_type(),
            "message": error.client_message(),
        }
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(error_body(&self))).into_response()
    }
}
