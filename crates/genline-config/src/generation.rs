use std::time::Duration;

use serde::Deserialize;

/// Streaming generation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Upper bound on a single provider stream (e.g. "10m")
    #[serde(default = "default_max_stream_duration")]
    pub max_stream_duration: String,
    /// Maximum number of fallback hops followed for one request
    #[serde(default = "default_max_fallback_depth")]
    pub max_fallback_depth: usize,
    /// Minimum interval between incremental message writes (e.g. "1s")
    #[serde(default = "default_persist_interval")]
    pub persist_interval: String,
    /// Ask aggregator providers to compress the middle of long conversations
    #[serde(default = "default_true")]
    pub middle_out: bool,
    /// Caller roles whose generations are never billed
    #[serde(default = "default_non_billable_roles")]
    pub non_billable_roles: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_stream_duration: default_max_stream_duration(),
            max_fallback_depth: default_max_fallback_depth(),
            persist_interval: default_persist_interval(),
            middle_out: true,
            non_billable_roles: default_non_billable_roles(),
        }
    }
}

impl GenerationConfig {
    /// Parsed `max_stream_duration`
    ///
    /// # Errors
    ///
    /// Returns an error if the duration string is malformed
    pub fn max_stream_duration(&self) -> anyhow::Result<Duration> {
        parse_duration("generation.max_stream_duration", &self.max_stream_duration)
    }

    /// Parsed `persist_interval`
    ///
    /// # Errors
    ///
    /// Returns an error if the duration string is malformed
    pub fn persist_interval(&self) -> anyhow::Result<Duration> {
        parse_duration("generation.persist_interval", &self.persist_interval)
    }
}

fn parse_duration(field: &str, value: &str) -> anyhow::Result<Duration> {
    duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid {field} '{value}': {e}"))
}

fn default_max_stream_duration() -> String {
    "10m".to_owned()
}

const fn default_max_fallback_depth() -> usize {
    3
}

fn default_persist_interval() -> String {
    "1s".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

fn default_non_billable_roles() -> Vec<String> {
    vec!["admin".to_owned()]
}
