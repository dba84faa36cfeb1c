//! Genline bound to an ephemeral local port

use std::net::SocketAddr;

use genline_config::Config;
use genline_server::{AppState, Server, USER_ID_HEADER};
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};

pub struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    state: AppState,
    _stop: DropGuard,
}

impl TestServer {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(config).await?;
        let state = server.state().clone();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;

        let stop = CancellationToken::new();
        let stopped = stop.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, server.into_router())
                .with_graceful_shutdown(stopped.cancelled_owned())
                .await;
            if let Err(e) = served {
                eprintln!("test server exited: {e}");
            }
        });

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            state,
            _stop: stop.drop_guard(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Pipeline shared with the running server
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// JSON POST carrying `user_id` as the caller identity
    pub async fn post(&self, path: &str, user_id: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(USER_ID_HEADER, user_id)
            .json(body)
            .send()
            .await
            .expect("request sent")
    }
}
