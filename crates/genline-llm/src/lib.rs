//! Provider resolution and streaming dispatch for Genline
//!
//! Resolves a model to a configured upstream provider, opens a token
//! stream through the adapter for that provider's wire protocol, and
//! transparently re-routes to the provider's fallback when the upstream
//! fails before or during streaming.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod protocol;
pub mod types;

pub use adapter::{ChunkStream, StreamAdapter};
pub use dispatch::{Completion, DispatchEvent, DispatchSettings, DispatchStream, FallbackDispatcher};
pub use error::LlmError;
pub use graph::{ModelEntry, ProviderGraph, ProviderNode};
pub use types::{ChatMessage, DispatchPayload, GenerationRequest, Role, StreamChunk, Usage};
