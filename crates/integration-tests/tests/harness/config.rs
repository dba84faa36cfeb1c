//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use genline_config::{
    BillingConfig, Config, GenerationConfig, ModelConfig, ModelPricing, ProviderConfig, ProviderKind, ServerConfig,
};
use secrecy::SecretString;

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config with an in-memory ledger holding plenty of caps
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                generation: GenerationConfig::default(),
                billing: BillingConfig {
                    initial_balance: 1_000_000,
                    ..BillingConfig::default()
                },
                ..Config::default()
            },
        }
    }

    fn with_provider(mut self, id: &str, kind: ProviderKind, base_url: &str) -> Self {
        self.config.providers.insert(
            id.to_owned(),
            ProviderConfig {
                kind,
                base_url: Some(base_url.parse().expect("valid URL")),
                api_key: Some(SecretString::from("test-key")),
                disabled: false,
                fallback: None,
                default_eligible: true,
            },
        );
        self
    }

    pub fn with_openai_provider(self, id: &str, base_url: &str) -> Self {
        self.with_provider(id, ProviderKind::OpenaiCompatible, base_url)
    }

    pub fn with_aggregator_provider(self, id: &str, base_url: &str) -> Self {
        self.with_provider(id, ProviderKind::AggregatorCompatible, base_url)
    }

    /// Make `id` fall back to `fallback`
    pub fn with_fallback(mut self, id: &str, fallback: &str) -> Self {
        self.provider(id).fallback = Some(fallback.to_owned());
        self
    }

    pub fn disabled(mut self, id: &str) -> Self {
        self.provider(id).disabled = true;
        self
    }

    pub fn not_default(mut self, id: &str) -> Self {
        self.provider(id).default_eligible = false;
        self
    }

    /// Serve `id` from `providers`, priced at one cap per unit
    pub fn with_model(mut self, id: &str, id_prefix: &str, providers: &[&str]) -> Self {
        self.config.models.insert(
            id.to_owned(),
            ModelConfig {
                id_prefix: id_prefix.to_owned(),
                providers: providers.iter().map(|p| (*p).to_owned()).collect(),
                pricing: ModelPricing {
                    prompt_per_1k: 1000.0,
                    completion_per_1k: 1000.0,
                },
            },
        );
        self
    }

    pub fn with_initial_balance(mut self, balance: u64) -> Self {
        self.config.billing.initial_balance = balance;
        self
    }

    fn provider(&mut self, id: &str) -> &mut ProviderConfig {
        self.config.providers.get_mut(id).expect("provider configured")
    }

    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }
}
