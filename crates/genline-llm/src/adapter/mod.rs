//! Stream adapters normalizing upstream wire protocols
//!
//! Each adapter opens a streaming request against one provider and turns
//! its event stream into [`StreamChunk`]s. Connection and HTTP failures
//! are returned from [`StreamAdapter::open`]; failures after the stream
//! is established arrive as `Err` items.

pub mod aggregator;
pub mod openai;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use genline_config::{Config, ProviderKind};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::LlmError;
use crate::protocol::{ChatCompletionChunk, ChatCompletionRequest};
use crate::types::{DispatchPayload, StreamChunk};

pub use aggregator::AggregatorAdapter;
pub use openai::OpenAiCompatibleAdapter;

/// Normalized chunk stream produced by an adapter
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

/// Adapter for one upstream provider
#[async_trait]
pub trait StreamAdapter: Send + Sync {
    /// Provider id this adapter talks to
    fn provider_id(&self) -> &str;

    /// Wire protocol family
    fn kind(&self) -> ProviderKind;

    /// Open a streaming generation
    async fn open(&self, payload: &DispatchPayload) -> Result<ChunkStream, LlmError>;
}

/// Build one adapter per configured provider
///
/// # Errors
///
/// Returns an error if a provider's base URL cannot be combined into a
/// request URL
pub fn from_config(config: &Config) -> Result<HashMap<String, Arc<dyn StreamAdapter>>, LlmError> {
    let client = Client::new();

    config
        .providers
        .iter()
        .map(|(id, provider)| {
            let adapter: Arc<dyn StreamAdapter> = match provider.kind {
                ProviderKind::OpenaiCompatible => {
                    Arc::new(OpenAiCompatibleAdapter::from_config(id.clone(), provider, client.clone())?)
                }
                ProviderKind::AggregatorCompatible => {
                    Arc::new(AggregatorAdapter::from_config(id.clone(), provider, client.clone())?)
                }
            };
            Ok((id.clone(), adapter))
        })
        .collect()
}

/// Parse a built-in default base URL
fn default_url(raw: &str) -> Result<Url, LlmError> {
    Url::parse(raw).map_err(|e| LlmError::Upstream(format!("invalid base url {raw}: {e}")))
}

/// Chat completions endpoint under a base URL
fn completions_url(base_url: &Url) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{base}/chat/completions")
}

/// POST a streaming request and normalize the response
async fn open_stream(
    provider: &str,
    client: &Client,
    url: String,
    api_key: Option<&SecretString>,
    body: &ChatCompletionRequest<'_>,
) -> Result<ChunkStream, LlmError> {
    let mut builder = client.post(url).json(body);

    if let Some(key) = api_key {
        builder = builder.bearer_auth(key.expose_secret());
    }

    let response = builder.send().await.map_err(|e| {
        tracing::error!(provider, error = %e, "upstream stream request failed");
        LlmError::Upstream(e.to_string())
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider, status = %status, "upstream returned error");
        return Err(LlmError::from_upstream_message(format!("provider returned {status}: {body}")));
    }

    Ok(normalize(provider.to_owned(), response))
}

/// Turn an SSE response into normalized chunks
///
/// Emits exactly one `Done`, or ends with an error item. A connection that
/// closes without the `[DONE]` sentinel still finishes with `Done`,
/// carrying whatever usage was seen.
fn normalize(provider: String, response: reqwest::Response) -> ChunkStream {
    let mut events = Box::pin(response.bytes_stream().eventsource());

    let stream = async_stream::stream! {
        let mut usage = None;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "upstream stream broke");
                    yield Err(LlmError::Streaming(e.to_string()));
                    return;
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                yield Ok(StreamChunk::Done { usage });
                return;
            }

            let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::debug!(provider = %provider, error = %e, "skipping unparseable stream event");
                    continue;
                }
            };

            if let Some(error) = chunk.error {
                let message = error.describe();
                tracing::warn!(provider = %provider, error = %message, "upstream reported error mid-stream");
                yield Err(match LlmError::from_upstream_message(message) {
                    LlmError::Upstream(message) => LlmError::Streaming(message),
                    other => other,
                });
                return;
            }

            if let Some(reported) = chunk.usage {
                usage = Some(reported.into());
            }

            for choice in chunk.choices {
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    yield Ok(StreamChunk::Pending { content_delta: content });
                }
            }
        }

        tracing::debug!(provider = %provider, "upstream closed without [DONE]");
        yield Ok(StreamChunk::Done { usage });
    };

    Box::pin(stream)
}
