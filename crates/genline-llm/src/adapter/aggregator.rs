//! Adapter for aggregator providers
//!
//! Aggregators front many vendors, address models as `vendor/model`, and
//! report usage only when asked through their own request field.

use async_trait::async_trait;
use genline_config::{ProviderConfig, ProviderKind};
use reqwest::Client;
use secrecy::SecretString;
use url::Url;

use super::{ChunkStream, StreamAdapter};
use crate::error::LlmError;
use crate::protocol::{ChatCompletionRequest, UsageOptions};
use crate::types::DispatchPayload;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Transform compressing the middle of an over-long conversation
const MIDDLE_OUT: &str = "middle-out";

pub struct AggregatorAdapter {
    id: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl AggregatorAdapter {
    pub const fn new(id: String, client: Client, base_url: Url, api_key: Option<SecretString>) -> Self {
        Self {
            id,
            client,
            base_url,
            api_key,
        }
    }

    pub fn from_config(id: String, config: &ProviderConfig, client: Client) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => super::default_url(DEFAULT_BASE_URL)?,
        };

        Ok(Self::new(id, client, base_url, config.api_key.clone()))
    }
}

#[async_trait]
impl StreamAdapter for AggregatorAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::AggregatorCompatible
    }

    async fn open(&self, payload: &DispatchPayload) -> Result<ChunkStream, LlmError> {
        let body = ChatCompletionRequest {
            model: &payload.model,
            messages: &payload.messages,
            user: &payload.end_user_id,
            stream: true,
            stream_options: None,
            usage: Some(UsageOptions { include: true }),
            transforms: payload.middle_out.then(|| vec![MIDDLE_OUT]),
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
