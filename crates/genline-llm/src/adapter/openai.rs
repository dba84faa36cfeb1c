//! Adapter for OpenAI-compatible chat completion APIs

use async_trait::async_trait;
use genline_config::{ProviderConfig, ProviderKind};
use reqwest::Client;
use secrecy::SecretString;
use url::Url;

use super::{ChunkStream, StreamAdapter};
use crate::error::LlmError;
use crate::protocol::{ChatCompletionRequest, StreamOptions};
use crate::types::DispatchPayload;

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider adapter
pub struct OpenAiCompatibleAdapter {
    id: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl OpenAiCompatibleAdapter {
    pub const fn new(id: String, client: Client, base_url: Url, api_key: Option<SecretString>) -> Self {
        Self {
            id,
            client,
            base_url,
            api_key,
        }
    }

    /// Create from provider configuration
    pub fn from_config(id: String, config: &ProviderConfig, client: Client) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => super::default_url(DEFAULT_BASE_URL)?,
        };

        Ok(Self::new(id, client, base_url, config.api_key.clone()))
    }
}

#[async_trait]
impl StreamAdapter for OpenAiCompatibleAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenaiCompatible
    }

    async fn open(&self, payload: &DispatchPayload) -> Result<ChunkStream, LlmError> {
        let body = ChatCompletionRequest {
            model: &payload.model,
            messages: &payload.messages,
            user: &payload.end_user_id,
            stream: true,
            stream_options: Some(StreamOptions { include_usage: true }),
            usage: None,
            transforms: None,
        };

        super::open_stream(
            &self.id,
            &self.client,
            super::completions_url(&self.base_url),
            self.api_key.as_ref(),
            &body,
        )
        .await
    }
}
