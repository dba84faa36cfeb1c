use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use super::{MessageStream, RegistryBackend};
use crate::error::QueueError;

/// Buffered signals per channel before slow subscribers lag
const CHANNEL_CAPACITY: usize = 16;

/// Single-process backend
#[derive(Default)]
pub struct MemoryBackend {
    sets: DashMap<String, HashSet<String>>,
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribers currently attached to `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |sender| sender.receiver_count())
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn add_member(&self, key: &str, member: &str) -> Result<(), QueueError> {
        self.sets
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned());
        Ok(())
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, QueueError> {
        Ok(self.sets.get(key).is_some_and(|set| set.contains(member)))
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), QueueError> {
        self.sets.remove_if_mut(key, |_, set| {
            set.remove(member);
            set.is_empty()
        });
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<usize, QueueError> {
        let delivered = self
            .channels
            .get(channel)
            .map_or(0, |sender| sender.send(message.to_owned()).unwrap_or(0));

        // Nobody listening any more
        if delivered == 0 {
            self.channels.remove_if(channel, |_, sender| sender.receiver_count() == 0);
        }

        Ok(delivered)
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, QueueError> {
        let receiver = self
            .channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        let mut subscription = Subscription {
            receiver: Some(receiver),
            channel: channel.to_owned(),
            channels: Arc::clone(&self.channels),
        };

        let stream = async_stream::stream! {
            while let Some(receiver) = subscription.receiver.as_mut() {
                match receiver.recv().await {
                    Ok(message) => yield message,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "cancellation subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Receiver that removes its channel once the last subscriber is gone
struct Subscription {
    receiver: Option<broadcast::Receiver<String>>,
    channel: String,
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.channels
            .remove_if(&self.channel, |_, sender| sender.receiver_count() == 0);
    }
}
