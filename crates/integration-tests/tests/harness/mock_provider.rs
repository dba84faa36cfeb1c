//! Mock upstream serving OpenAI-style chat completion streams
//!
//! Each request consumes the next scripted [`Mode`]; the last mode is
//! reused once the script runs out.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

/// How the mock answers one request
#[derive(Debug, Clone)]
pub enum Mode {
    /// Stream the deltas, then usage when given, then `[DONE]`
    Stream {
        deltas: Vec<&'static str>,
        usage: Option<(u32, u32)>,
    },
    /// Refuse the request with a 500
    FailOnConnect,
    /// Refuse the request as too long for the model
    ContextLength,
    /// Stream the deltas, then an in-band error
    FailMidStream { deltas: Vec<&'static str> },
    /// Stream the deltas, then keep the connection open forever
    Hang { deltas: Vec<&'static str> },
}

impl Mode {
    pub fn text(deltas: &[&'static str]) -> Self {
        Self::Stream {
            deltas: deltas.to_vec(),
            usage: Some((10, 5)),
        }
    }
}

struct MockState {
    modes: Mutex<VecDeque<Mode>>,
    requests: Mutex<Vec<serde_json::Value>>,
}

pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockProvider {
    pub async fn start(modes: Vec<Mode>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            modes: Mutex::new(modes.into()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn next_mode(state: &MockState) -> Mode {
    let mut modes = state.modes.lock().unwrap();
    if modes.len() > 1 {
        modes.pop_front().unwrap()
    } else {
        modes.front().cloned().unwrap_or_else(|| Mode::text(&["ok"]))
    }
}

fn delta(text: &str) -> Event {
    Event::default().data(serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": text } }] }).to_string())
}

fn usage(prompt: u32, completion: u32) -> Event {
    Event::default().data(
        serde_json::json!({
            "choices": [],
            "usage": { "prompt_tokens": prompt, "completion_tokens": completion }
        })
        .to_string(),
    )
}

fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": { "message": message } })
}

async fn handle_chat_completions(State(state): State<Arc<MockState>>, Json(body): Json<serde_json::Value>) -> Response {
    state.requests.lock().unwrap().push(body);

    let events: Vec<Event> = match next_mode(&state) {
        Mode::FailOnConnect => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(error_body("upstream overloaded"))).into_response();
        }
        Mode::ContextLength => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_body("This model's maximum context length is 8192 tokens")),
            )
                .into_response();
        }
        Mode::Stream { deltas, usage: reported } => deltas
            .iter()
            .map(|d| delta(d))
            .chain(reported.map(|(p, c)| usage(p, c)))
            .chain(std::iter::once(Event::default().data("[DONE]")))
            .collect(),
        Mode::FailMidStream { deltas } => deltas
            .iter()
            .map(|d| delta(d))
            .chain(std::iter::once(
                Event::default().data(error_body("upstream reset").to_string()),
            ))
            .collect(),
        Mode::Hang { deltas } => {
            let head = stream::iter(deltas.iter().map(|d| Ok::<_, Infallible>(delta(d))).collect::<Vec<_>>());
            return Sse::new(head.chain(stream::pending())).into_response();
        }
    };

    Sse::new(stream::iter(events.into_iter().map(Ok::<_, Infallible>))).into_response()
}
