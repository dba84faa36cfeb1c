//! Storage backends for the registry
//!
//! A backend offers set membership and channel pub/sub. Implementations
//! must make each operation atomic with respect to other processes
//! sharing the store.

mod memory;
mod redis;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;
use crate::error::QueueError;

/// Messages received on a subscribed channel
pub type MessageStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Set and pub/sub primitives of a shared store
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Add `member` to the set at `key`
    async fn add_member(&self, key: &str, member: &str) -> Result<(), QueueError>;

    /// Whether `member` belongs to the set at `key`
    async fn is_member(&self, key: &str, member: &str) -> Result<bool, QueueError>;

    /// Remove `member` from the set at `key`
    async fn remove_member(&self, key: &str, member: &str) -> Result<(), QueueError>;

    /// Publish on a channel, returning how many subscribers received it
    async fn publish(&self, channel: &str, message: &str) -> Result<usize, QueueError>;

    /// Subscribe to a channel
    ///
    /// The subscription is active once this returns; dropping the stream
    /// unsubscribes.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, QueueError>;
}
