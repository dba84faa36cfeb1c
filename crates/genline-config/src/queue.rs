use serde::Deserialize;

/// Prompt queue registry configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Storage backing the registry and cancellation channel
    #[serde(default)]
    pub backend: QueueBackendKind,
    /// Redis/Valkey URL, required for the `redis` backend
    #[serde(default)]
    pub url: Option<String>,
}

/// Registry storage backends
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackendKind {
    /// Process-local; cancellation only reaches this process
    #[default]
    Memory,
    /// Shared Redis/Valkey store, cancellation crosses processes
    Redis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_by_default() {
        let config: QueueConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend, QueueBackendKind::Memory);
        assert!(config.url.is_none());
    }

    #[test]
    fn redis_backend() {
        let config: QueueConfig = toml::from_str(
            r#"
            backend = "redis"
            url = "redis://127.0.0.1:6379"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, QueueBackendKind::Redis);
        assert_eq!(config.url.as_deref(), Some("redis://127.0.0.1:6379"));
    }
}
