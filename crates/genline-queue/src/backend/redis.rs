use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{MessageStream, RegistryBackend};
use crate::error::QueueError;

/// Backend on a Redis-compatible store (Redis, Valkey)
///
/// Commands share one managed multiplexed connection. Each subscription
/// opens its own pub/sub connection, closed when the stream is dropped.
#[derive(Clone)]
pub struct RedisBackend {
    client: redis::Client,
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Connect to the store at `url`
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)
            .map_err(|e| QueueError::Backend(format!("failed to connect to Redis: {e}")))?;

        let connection = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| QueueError::Backend(format!("failed to get connection: {e}")))?;

        Ok(Self { client, connection })
    }
}

#[async_trait]
impl RegistryBackend for RedisBackend {
    async fn add_member(&self, key: &str, member: &str) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, QueueError> {
        let mut conn = self.connection.clone();
        Ok(conn.sismember(key, member).await?)
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.srem(key, member).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<usize, QueueError> {
        let mut conn = self.connection.clone();
        let receivers: i64 = conn.publish(channel, message).await?;
        Ok(usize::try_from(receivers).unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, QueueError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let channel = channel.to_owned();
        let messages = pubsub.into_on_message().filter_map(move |msg| {
            let payload = msg.get_payload::<String>();
            let channel = channel.clone();
            async move {
                payload
                    .map_err(|e| tracing::warn!(channel = %channel, error = %e, "dropping undecodable pub/sub message"))
                    .ok()
            }
        });

        Ok(Box::pin(messages))
    }
}
