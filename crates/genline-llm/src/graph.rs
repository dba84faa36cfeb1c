//! Provider graph built from configuration
//!
//! Providers reference their fallback by id, so a chain is walked by
//! repeated lookup instead of pointer chasing. The graph is read-only
//! after startup.

use genline_config::{Config, ProviderKind};
use indexmap::IndexMap;

use crate::error::LlmError;

/// A configured upstream provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderNode {
    pub id: String,
    pub kind: ProviderKind,
    pub disabled: bool,
    pub fallback_id: Option<String>,
    /// Whether the provider may be chosen when the caller names none
    pub default_eligible: bool,
}

impl ProviderNode {
    /// Enabled, default-eligible provider without a fallback
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            disabled: false,
            fallback_id: None,
            default_eligible: true,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback_id: impl Into<String>) -> Self {
        self.fallback_id = Some(fallback_id.into());
        self
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    #[must_use]
    pub const fn not_default(mut self) -> Self {
        self.default_eligible = false;
        self
    }
}

/// A configured model and the providers serving it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub id: String,
    /// Prefix joined to `id` when addressing aggregator providers
    pub id_prefix: String,
    /// Serving providers in preference order
    pub provider_ids: Vec<String>,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, provider_ids: &[&str]) -> Self {
        Self {
            id: id.into(),
            id_prefix: String::new(),
            provider_ids: provider_ids.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Model id as the given provider family expects it
    pub fn upstream_id(&self, kind: ProviderKind) -> String {
        match kind {
            ProviderKind::OpenaiCompatible => self.id.clone(),
            ProviderKind::AggregatorCompatible => format!("{}{}", self.id_prefix, self.id),
        }
    }
}

/// Read-only index of providers and models
#[derive(Debug, Default)]
pub struct ProviderGraph {
    providers: IndexMap<String, ProviderNode>,
    models: IndexMap<String, ModelEntry>,
}

impl ProviderGraph {
    pub fn new(
        providers: impl IntoIterator<Item = ProviderNode>,
        models: impl IntoIterator<Item = ModelEntry>,
    ) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.id.clone(), p)).collect(),
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let providers = config.providers.iter().map(|(id, p)| ProviderNode {
            id: id.clone(),
            kind: p.kind,
            disabled: p.disabled,
            fallback_id: p.fallback.clone(),
            default_eligible: p.default_eligible,
        });

        let models = config.models.iter().map(|(id, m)| ModelEntry {
            id: id.clone(),
            id_prefix: m.id_prefix.clone(),
            provider_ids: m.providers.clone(),
        });

        Self::new(providers, models)
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderNode> {
        self.providers.get(id)
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderNode> {
        self.providers.values()
    }

    /// Look up a model by id
    pub fn model(&self, id: &str) -> Result<&ModelEntry, LlmError> {
        self.models
            .get(id)
            .ok_or_else(|| LlmError::ModelNotFound { model: id.to_owned() })
    }

    /// The provider `provider` falls back to, if it names one that exists
    pub fn fallback_of(&self, provider: &ProviderNode) -> Option<&ProviderNode> {
        provider.fallback_id.as_deref().and_then(|id| self.providers.get(id))
    }

    /// Select the provider that starts dispatch for a model
    ///
    /// An explicit provider wins when it serves the model. Otherwise the
    /// first default-eligible serving provider is used. A disabled choice
    /// is still returned when it has a fallback, since dispatch re-routes
    /// it without contacting the network.
    pub fn resolve(&self, model_id: &str, explicit_provider_id: Option<&str>) -> Result<&ProviderNode, LlmError> {
        let model = self.model(model_id)?;

        let provider = if let Some(explicit) = explicit_provider_id {
            if !model.provider_ids.iter().any(|p| p == explicit) {
                return Err(LlmError::ProviderNotFound {
                    provider: explicit.to_owned(),
                });
            }
            self.provider(explicit).ok_or_else(|| LlmError::ProviderNotFound {
                provider: explicit.to_owned(),
            })?
        } else {
            model
                .provider_ids
                .iter()
                .filter_map(|id| self.provider(id))
                .find(|p| p.default_eligible)
                .ok_or_else(|| LlmError::ProviderNotFound {
                    provider: format!("<default for {model_id}>"),
                })?
        };

        if provider.disabled && self.fallback_of(provider).is_none() {
            return Err(LlmError::ProviderDisabled {
                provider: provider.id.clone(),
            });
        }

        Ok(provider)
    }
}
