//! Fallback-aware dispatch of generation requests
//!
//! The dispatcher opens a stream on the resolved provider and re-routes
//! along the fallback chain when the provider is disabled or fails. A
//! failure after some deltas were delivered is spliced: the fallback's
//! output continues the same caller-facing stream. Callers observe a
//! sequence of deltas closed by exactly one terminal item.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use genline_config::{Config, ProviderKind};

use crate::adapter::{self, ChunkStream, StreamAdapter};
use crate::error::LlmError;
use crate::graph::{ModelEntry, ProviderGraph, ProviderNode};
use crate::types::{DispatchPayload, GenerationRequest, StreamChunk, Usage};

/// Final result of a dispatched generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Full text delivered to the caller, across fallback splices
    pub content: String,
    /// Usage reported by the provider that finished the stream
    pub usage: Option<Usage>,
    /// Provider that finished the stream
    pub provider_id: String,
}

/// Item of a dispatched stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Delta(String),
    /// Emitted once, last
    Terminal(Completion),
}

/// Caller-facing stream of a dispatched generation
///
/// Ends after a `Terminal` item or after the first `Err`.
pub type DispatchStream = Pin<Box<dyn Stream<Item = Result<DispatchEvent, LlmError>> + Send>>;

/// Tunables for fallback behaviour
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Fallback hops allowed per request, disabled-provider skips included
    pub max_fallback_depth: usize,
    /// Request middle-out compression from aggregator providers
    pub middle_out: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_fallback_depth: 3,
            middle_out: true,
        }
    }
}

struct DispatcherInner {
    graph: Arc<ProviderGraph>,
    adapters: HashMap<String, Arc<dyn StreamAdapter>>,
    settings: DispatchSettings,
}

/// Dispatches generations with transparent provider fallback
#[derive(Clone)]
pub struct FallbackDispatcher {
    inner: Arc<DispatcherInner>,
}

/// A stream that opened successfully somewhere along the chain
struct Opened {
    provider_id: String,
    chunks: ChunkStream,
}

impl FallbackDispatcher {
    pub fn new(
        graph: Arc<ProviderGraph>,
        adapters: HashMap<String, Arc<dyn StreamAdapter>>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                graph,
                adapters,
                settings,
            }),
        }
    }

    /// Build the graph and one HTTP adapter per configured provider
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let graph = Arc::new(ProviderGraph::from_config(config));
        let adapters = adapter::from_config(config)?;
        let settings = DispatchSettings {
            max_fallback_depth: config.generation.max_fallback_depth,
            middle_out: config.generation.middle_out,
        };

        Ok(Self::new(graph, adapters, settings))
    }

    pub fn graph(&self) -> &ProviderGraph {
        &self.inner.graph
    }

    /// Resolve the starting provider for a request and dispatch to it
    pub async fn dispatch_request(&self, request: &GenerationRequest) -> Result<DispatchStream, LlmError> {
        let provider = self
            .inner
            .graph
            .resolve(&request.model_id, request.explicit_provider_id.as_deref())?;
        let provider_id = provider.id.clone();

        self.dispatch(&provider_id, request).await
    }

    /// Dispatch a request starting at `provider_id`
    ///
    /// Errors raised before any delta is produced are returned directly;
    /// later failures that cannot be recovered arrive as the stream's
    /// final `Err` item.
    pub async fn dispatch(&self, provider_id: &str, request: &GenerationRequest) -> Result<DispatchStream, LlmError> {
        let model = self.inner.graph.model(&request.model_id)?.clone();
        let mut depth = 0;
        let opened = self.open_chain(provider_id, &model, request, &mut depth).await?;

        Ok(self.splice(opened, model, request.clone(), depth))
    }

    /// Walk the chain from `start_id` until a stream opens
    async fn open_chain(
        &self,
        start_id: &str,
        model: &ModelEntry,
        request: &GenerationRequest,
        depth: &mut usize,
    ) -> Result<Opened, LlmError> {
        let graph = &self.inner.graph;
        let mut provider = graph.provider(start_id).ok_or_else(|| LlmError::ProviderNotFound {
            provider: start_id.to_owned(),
        })?;

        loop {
            if provider.disabled {
                let Some(fallback) = graph.fallback_of(provider) else {
                    return Err(LlmError::ProviderDisabled {
                        provider: provider.id.clone(),
                    });
                };
                self.take_hop(start_id, depth)?;
                tracing::debug!(
                    provider = %provider.id,
                    fallback = %fallback.id,
                    "provider disabled, routing to fallback"
                );
                provider = fallback;
                continue;
            }

            match self.open_one(provider, model, request).await {
                Ok(chunks) => {
                    return Ok(Opened {
                        provider_id: provider.id.clone(),
                        chunks,
                    });
                }
                Err(error) => {
                    provider = self.fallback_after_failure(start_id, provider, request, error, depth)?;
                }
            }
        }
    }

    async fn open_one(
        &self,
        provider: &ProviderNode,
        model: &ModelEntry,
        request: &GenerationRequest,
    ) -> Result<ChunkStream, LlmError> {
        let adapter = self
            .inner
            .adapters
            .get(&provider.id)
            .ok_or_else(|| LlmError::ProviderNotFound {
                provider: provider.id.clone(),
            })?;

        let payload = DispatchPayload {
            model: model.upstream_id(provider.kind),
            messages: request.messages.clone(),
            end_user_id: request.user_id.clone(),
            middle_out: self.inner.settings.middle_out && provider.kind == ProviderKind::AggregatorCompatible,
        };

        tracing::debug!(
            provider = %provider.id,
            model = %payload.model,
            request_id = %request.request_id,
            "opening provider stream"
        );

        adapter.open(&payload).await
    }

    /// Decide where to go after `provider` failed with `error`
    ///
    /// Non-retryable errors, and failures with no enabled fallback,
    /// surface the provider's own error.
    fn fallback_after_failure(
        &self,
        start_id: &str,
        provider: &ProviderNode,
        request: &GenerationRequest,
        error: LlmError,
        depth: &mut usize,
    ) -> Result<&ProviderNode, LlmError> {
        if !error.is_retryable() {
            tracing::warn!(
                provider = %provider.id,
                request_id = %request.request_id,
                error = %error,
                "provider failed with non-retryable error"
            );
            return Err(error);
        }

        match self.inner.graph.fallback_of(provider) {
            Some(fallback) if !fallback.disabled => {
                self.take_hop(start_id, depth)?;
                tracing::warn!(
                    provider = %provider.id,
                    fallback = %fallback.id,
                    model = %request.model_id,
                    user_id = %request.user_id,
                    error = %error,
                    "provider failed, failing over"
                );
                Ok(fallback)
            }
            _ => {
                tracing::error!(
                    provider = %provider.id,
                    model = %request.model_id,
                    user_id = %request.user_id,
                    error = %error,
                    "provider failed with no usable fallback"
                );
                Err(error)
            }
        }
    }

    fn take_hop(&self, start_id: &str, depth: &mut usize) -> Result<(), LlmError> {
        let max = self.inner.settings.max_fallback_depth;
        if *depth >= max {
            tracing::error!(provider = %start_id, depth = max, "fallback chain too long");
            return Err(LlmError::FallbackDepthExceeded {
                provider: start_id.to_owned(),
                depth: max,
            });
        }
        *depth += 1;
        Ok(())
    }

    /// Forward deltas, re-opening on the fallback after mid-stream failures
    fn splice(&self, opened: Opened, model: ModelEntry, request: GenerationRequest, depth: usize) -> DispatchStream {
        let dispatcher = self.clone();

        let stream = async_stream::stream! {
            let mut current = opened;
            let mut depth = depth;
            let mut content = String::new();
            let start_id = current.provider_id.clone();

            loop {
                match current.chunks.next().await {
                    Some(Ok(StreamChunk::Pending { content_delta })) => {
                        content.push_str(&content_delta);
                        yield Ok(DispatchEvent::Delta(content_delta));
                    }
                    Some(Ok(StreamChunk::Done { usage })) => {
                        yield Ok(DispatchEvent::Terminal(Completion {
                            content,
                            usage,
                            provider_id: current.provider_id,
                        }));
                        break;
                    }
                    None => {
                        yield Ok(DispatchEvent::Terminal(Completion {
                            content,
                            usage: None,
                            provider_id: current.provider_id,
                        }));
                        break;
                    }
                    Some(Err(error)) => {
                        let Some(provider) = dispatcher.inner.graph.provider(&current.provider_id) else {
                            yield Err(error);
                            break;
                        };
                        let next_id = match dispatcher.fallback_after_failure(&start_id, provider, &request, error, &mut depth) {
                            Ok(fallback) => fallback.id.clone(),
                            Err(error) => {
                                yield Err(error);
                                break;
                            }
                        };
                        match dispatcher.open_chain(&next_id, &model, &request, &mut depth).await {
                            Ok(next) => current = next,
                            Err(error) => {
                                yield Err(error);
                                break;
                            }
                        }
                    }
                }
            }
        };

        Box::pin(stream)
    }
}
