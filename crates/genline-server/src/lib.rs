//! HTTP surface for Genline
//!
//! Streams single generations and prompt batches to clients as SSE and
//! accepts prompt queue cancellations from any process.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod context;
mod error;
mod events;
mod generations;
mod health;
mod queues;
mod relay;
mod state;

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use genline_config::{Config, ServerConfig};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use context::{SUBSCRIPTION_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
pub use error::ApiError;
pub use state::AppState;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    state: AppState,
}

impl Server {
    /// Build the server and its generation pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a provider, the ledger or the queue backend
    /// cannot be initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let state = AppState::from_config(&config).await?;
        Ok(Self::with_state(state, &config.server))
    }

    /// Build the server around an existing pipeline
    pub fn with_state(state: AppState, config: &ServerConfig) -> Self {
        let listen_address = config.listen_address_or_default();

        let api = Router::new()
            .route("/v1/chats/{chat_id}/generations", post(generations::create_generation))
            .route("/v1/chats/{chat_id}/events", get(events::chat_events))
            .route("/v1/prompt-queues", post(queues::create_prompt_queue))
            .route("/v1/prompt-queues/cancel", post(queues::cancel_prompt_queue))
            .route_layer(axum::middleware::from_fn(context::request_context_middleware))
            .with_state(state.clone());

        let mut app = Router::new();

        if config.health.enabled {
            app = app.route(&config.health.path, get(health::health_handler));
        }

        let router = app.merge(api).layer(TraceLayer::new_for_http());

        Self {
            router,
            listen_address,
            state,
        }
    }

    /// Get the configured listen address
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Shared pipeline state, for inspection
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    const CONFIG: &str = r#"
        [providers.primary]
        kind = "openai_compatible"
        base_url = "http://127.0.0.1:9/v1"

        [models.gpt-x]
        providers = ["primary"]
    "#;

    async fn router() -> Router {
        let config = Config::parse(CONFIG).unwrap();
        Server::new(config).await.unwrap().into_router()
    }

    #[tokio::test]
    async fn health_needs_no_identity() {
        let response = router()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_user_header() {
        let request = Request::post("/v1/prompt-queues/cancel")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"queueId":"q1"}"#))
            .unwrap();

        let response = router().await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "authentication_error");
    }

    #[tokio::test]
    async fn cancelling_unknown_queue_answers_false() {
        let request = Request::post("/v1/prompt-queues/cancel")
            .header("content-type", "application/json")
            .header(USER_ID_HEADER, "usr_1")
            .body(Body::from(r#"{"queueId":"q-unknown"}"#))
            .unwrap();

        let response = router().await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "cancelled": false }));
    }

    #[tokio::test]
    async fn unknown_model_fails_before_streaming() {
        let request = Request::post("/v1/chats/chat_1/generations")
            .header("content-type", "application/json")
            .header(USER_ID_HEADER, "usr_1")
            .body(Body::from(
                r#"{"model":"missing","messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .unwrap();

        let response = router().await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
