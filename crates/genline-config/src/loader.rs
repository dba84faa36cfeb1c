use std::path::Path;

use crate::{Config, LedgerKind, QueueBackendKind};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if providers, models, or backends reference
    /// missing entries or lack required settings
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_providers()?;
        self.validate_models()?;
        self.validate_generation()?;
        self.validate_backends()?;
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for (id, provider) in &self.providers {
            let Some(fallback) = &provider.fallback else {
                continue;
            };

            if fallback == id {
                anyhow::bail!("provider '{id}' cannot fall back to itself");
            }

            if !self.providers.contains_key(fallback) {
                anyhow::bail!("provider '{id}' falls back to unknown provider '{fallback}'");
            }
        }

        Ok(())
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        for (id, model) in &self.models {
            if model.providers.is_empty() {
                anyhow::bail!("model '{id}' must list at least one provider");
            }

            for provider in &model.providers {
                if !self.providers.contains_key(provider) {
                    anyhow::bail!("model '{id}' references unknown provider '{provider}'");
                }
            }

            if model.pricing.prompt_per_1k < 0.0 || model.pricing.completion_per_1k < 0.0 {
                anyhow::bail!("model '{id}' has negative pricing");
            }
        }

        Ok(())
    }

    fn validate_generation(&self) -> anyhow::Result<()> {
        if self.generation.max_fallback_depth == 0 {
            anyhow::bail!("generation.max_fallback_depth must be at least 1");
        }

        self.generation.max_stream_duration()?;
        self.generation.persist_interval()?;

        Ok(())
    }

    fn validate_backends(&self) -> anyhow::Result<()> {
        if self.queue.backend == QueueBackendKind::Redis && self.queue.url.is_none() {
            anyhow::bail!("queue.url is required for the redis backend");
        }

        if self.billing.ledger == LedgerKind::Http && self.billing.url.is_none() {
            anyhow::bail!("billing.url is required for the http ledger");
        }

        Ok(())
    }
}
