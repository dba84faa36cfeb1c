//! Message persistence and chat notifications
//!
//! Chat and message storage live outside Genline. These traits are the
//! seams it writes through; the in-memory implementations back single
//! node deployments and tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use genline_billing::Transaction;
use genline_core::RequestContext;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::state::JobStatus;

/// Error from a message store
#[derive(Debug, thiserror::Error)]
#[error("message store error: {0}")]
pub struct StoreError(pub String);

/// Assistant message produced by a generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub user_id: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub content: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MessageRecord {
    /// Empty pending message
    pub fn pending(chat_id: Option<String>, user_id: &str, model_id: &str) -> Self {
        let now = Timestamp::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id,
            user_id: user_id.to_owned(),
            model_id: model_id.to_owned(),
            provider_id: None,
            content: String::new(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, message: &MessageRecord) -> Result<(), StoreError>;

    async fn update(&self, message: &MessageRecord) -> Result<(), StoreError>;
}

/// Lifecycle notification for a chat's subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    MessageUpdated {
        message: MessageRecord,
    },
    TransactionCreated {
        transaction: Transaction,
    },
    #[serde(rename_all = "camelCase")]
    SubscriptionBalanceUpdated {
        subscription_id: String,
        balance: i64,
    },
}

impl ChatEvent {
    /// Whether `context` may see this event
    ///
    /// Messages belong to their user; transactions and balances belong
    /// to the debited subscription.
    pub fn is_visible_to(&self, context: &RequestContext) -> bool {
        match self {
            Self::MessageUpdated { message } => message.user_id == context.user_id,
            Self::TransactionCreated { transaction } => transaction.subscription_id == context.subscription_id,
            Self::SubscriptionBalanceUpdated { subscription_id, .. } => *subscription_id == context.subscription_id,
        }
    }
}

/// Outbound chat event channel
pub trait ChatEventStream: Send + Sync {
    /// Fire-and-forget delivery to the chat's listeners
    fn emit(&self, chat_id: &str, event: ChatEvent);
}

/// Message store holding records in memory
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: DashMap<String, MessageRecord>,
    writes: AtomicUsize,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<MessageRecord> {
        self.messages.get(id).map(|m| m.clone())
    }

    /// Number of updates applied so far
    pub fn update_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create(&self, message: &MessageRecord) -> Result<(), StoreError> {
        self.messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn update(&self, message: &MessageRecord) -> Result<(), StoreError> {
        match self.messages.get_mut(&message.id) {
            Some(mut existing) => {
                *existing = message.clone();
                self.writes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(StoreError(format!("unknown message {}", message.id))),
        }
    }
}

/// Chat events fanned out to in-process subscribers
///
/// Events emitted while nobody is subscribed are dropped.
pub struct BroadcastChatEvents {
    sender: broadcast::Sender<(String, ChatEvent)>,
}

impl Default for BroadcastChatEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastChatEvents {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(256).0,
        }
    }

    /// Receive `(chat_id, event)` pairs emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<(String, ChatEvent)> {
        self.sender.subscribe()
    }
}

impl ChatEventStream for BroadcastChatEvents {
    fn emit(&self, chat_id: &str, event: ChatEvent) {
        let _ = self.sender.send((chat_id.to_owned(), event));
    }
}
