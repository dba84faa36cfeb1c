//! Queue membership and cancellation on top of a [`RegistryBackend`]

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use genline_config::{QueueBackendKind, QueueConfig};

use crate::backend::{MemoryBackend, RedisBackend, RegistryBackend};
use crate::error::QueueError;
use crate::types::CancellationSignal;

/// Cancellation signals for one queue
pub type CancelStream = Pin<Box<dyn Stream<Item = CancellationSignal> + Send>>;

/// Set holding a user's active queue ids
fn active_set_key(user_id: &str) -> String {
    format!("promptQueues:{user_id}")
}

/// Channel carrying cancellation signals for a queue
fn cancel_channel(queue_id: &str) -> String {
    format!("promptQueueCancel:{queue_id}")
}

/// Registry of active prompt queues
#[derive(Clone)]
pub struct PromptQueueRegistry {
    backend: Arc<dyn RegistryBackend>,
}

impl PromptQueueRegistry {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self { backend }
    }

    /// Registry on a fresh in-process backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Build the registry on the configured backend
    pub async fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        match config.backend {
            QueueBackendKind::Memory => Ok(Self::in_memory()),
            QueueBackendKind::Redis => {
                let url = config
                    .url
                    .as_deref()
                    .ok_or_else(|| QueueError::Backend("queue.url is not set".to_owned()))?;
                Ok(Self::new(Arc::new(RedisBackend::connect(url).await?)))
            }
        }
    }

    /// Mark a queue as active for a user
    pub async fn register(&self, user_id: &str, queue_id: &str) -> Result<(), QueueError> {
        self.backend.add_member(&active_set_key(user_id), queue_id).await?;
        tracing::debug!(user_id, queue_id, "prompt queue registered");
        Ok(())
    }

    /// Whether the queue is active for this user
    pub async fn is_active(&self, user_id: &str, queue_id: &str) -> Result<bool, QueueError> {
        self.backend.is_member(&active_set_key(user_id), queue_id).await
    }

    /// Ask whichever process runs the queue to stop it
    ///
    /// Returns `false` without publishing when the queue is not in the
    /// user's active set. A publish failure is logged, not returned: the
    /// signal is best-effort and the queue was a valid target.
    pub async fn cancel(&self, user_id: &str, queue_id: &str) -> Result<bool, QueueError> {
        if !self.is_active(user_id, queue_id).await? {
            tracing::debug!(user_id, queue_id, "cancel ignored for inactive or foreign queue");
            return Ok(false);
        }

        let signal = CancellationSignal {
            queue_id: queue_id.to_owned(),
            user_id: user_id.to_owned(),
        };

        match self.publish(&signal).await {
            Ok(0) => tracing::info!(queue_id, "cancel published with no listener"),
            Ok(receivers) => tracing::info!(queue_id, receivers, "cancel published"),
            Err(e) => tracing::warn!(queue_id, error = %e, "failed to publish cancel signal"),
        }

        Ok(true)
    }

    async fn publish(&self, signal: &CancellationSignal) -> Result<usize, QueueError> {
        let payload = serde_json::to_string(signal)?;
        self.backend.publish(&cancel_channel(&signal.queue_id), &payload).await
    }

    /// Remove a queue from the user's active set
    pub async fn unregister(&self, user_id: &str, queue_id: &str) -> Result<(), QueueError> {
        self.backend.remove_member(&active_set_key(user_id), queue_id).await?;
        tracing::debug!(user_id, queue_id, "prompt queue unregistered");
        Ok(())
    }

    /// Listen for cancellation of a queue
    ///
    /// Undecodable payloads are skipped. Dropping the stream unsubscribes.
    pub async fn cancellations(&self, queue_id: &str) -> Result<CancelStream, QueueError> {
        let messages = self.backend.subscribe(&cancel_channel(queue_id)).await?;

        let signals = messages.filter_map(|payload| async move {
            serde_json::from_str::<CancellationSignal>(&payload)
                .map_err(|e| tracing::warn!(error = %e, "ignoring malformed cancel signal"))
                .ok()
        });

        Ok(Box::pin(signals))
    }
}
