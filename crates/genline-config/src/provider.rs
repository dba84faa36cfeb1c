use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Upstream provider entry
///
/// Providers form fallback chains through `fallback`, which names another
/// provider id rather than embedding it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Wire protocol family spoken by the provider
    pub kind: ProviderKind,
    /// Base URL override (defaults depend on `kind`)
    #[serde(default)]
    pub base_url: Option<Url>,
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Disabled providers are never contacted; requests go to the fallback
    #[serde(default)]
    pub disabled: bool,
    /// Provider id to switch to when this one is disabled or fails
    #[serde(default)]
    pub fallback: Option<String>,
    /// Whether this provider may be picked when the caller names none
    #[serde(default = "default_true")]
    pub default_eligible: bool,
}

/// Supported upstream wire protocol families
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat completions API and compatible servers
    OpenaiCompatible,
    /// Aggregators multiplexing many vendors behind prefixed model ids
    AggregatorCompatible,
}

/// Model entry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Prefix joined to the model id when addressing aggregator providers
    #[serde(default)]
    pub id_prefix: String,
    /// Providers serving the model, in order of preference
    pub providers: Vec<String>,
    /// Caps charged per thousand units
    #[serde(default)]
    pub pricing: ModelPricing,
}

/// Per-model caps rates
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPricing {
    /// Caps per 1000 prompt units
    #[serde(default = "default_rate")]
    pub prompt_per_1k: f64,
    /// Caps per 1000 completion units
    #[serde(default = "default_rate")]
    pub completion_per_1k: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            prompt_per_1k: default_rate(),
            completion_per_1k: default_rate(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

const fn default_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_defaults() {
        let provider: ProviderConfig = toml::from_str(r#"kind = "openai_compatible""#).unwrap();
        assert_eq!(provider.kind, ProviderKind::OpenaiCompatible);
        assert!(!provider.disabled);
        assert!(provider.fallback.is_none());
        assert!(provider.default_eligible);
    }

    #[test]
    fn aggregator_with_fallback() {
        let provider: ProviderConfig = toml::from_str(
            r#"
            kind = "aggregator_compatible"
            base_url = "https://openrouter.ai/api/v1"
            api_key = "sk-or"
            disabled = true
            fallback = "openai"
            default_eligible = false
            "#,
        )
        .unwrap();
        assert_eq!(provider.kind, ProviderKind::AggregatorCompatible);
        assert!(provider.disabled);
        assert_eq!(provider.fallback.as_deref(), Some("openai"));
        assert!(!provider.default_eligible);
    }

    #[test]
    fn model_with_pricing() {
        let model: ModelConfig = toml::from_str(
            r#"
            id_prefix = "openai/"
            providers = ["openai", "openrouter"]

            [pricing]
            prompt_per_1k = 0.5
            completion_per_1k = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(model.id_prefix, "openai/");
        assert_eq!(model.providers, vec!["openai", "openrouter"]);
        assert!((model.pricing.completion_per_1k - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_kind_rejected() {
        let result: Result<ProviderConfig, _> = toml::from_str(r#"kind = "scraper""#);
        assert!(result.is_err());
    }
}
