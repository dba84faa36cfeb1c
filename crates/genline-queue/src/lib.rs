//! Prompt queue registry shared across Genline processes
//!
//! Active batches are tracked as set membership per user, and
//! cancellation is a best-effort publish on a per-queue channel. Set
//! membership, not signal delivery, decides whether a queue can be
//! cancelled.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod backend;
pub mod error;
pub mod registry;
pub mod types;

pub use backend::{MemoryBackend, MessageStream, RedisBackend, RegistryBackend};
pub use error::QueueError;
pub use registry::{CancelStream, PromptQueueRegistry};
pub use types::{CancellationSignal, PromptQueue};
