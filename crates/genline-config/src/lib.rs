#![allow(clippy::must_use_candidate)]

pub mod billing;
mod env;
pub mod generation;
mod loader;
pub mod provider;
pub mod queue;
pub mod server;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use billing::*;
pub use generation::*;
pub use provider::*;
pub use queue::*;
pub use server::*;
pub use telemetry::TelemetryConfig;

/// Top-level Genline configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream providers keyed by provider id
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Models keyed by model id
    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,
    /// Streaming generation settings
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Prompt queue registry backend
    #[serde(default)]
    pub queue: QueueConfig,
    /// Subscription ledger configuration
    #[serde(default)]
    pub billing: BillingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
