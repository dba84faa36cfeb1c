//! Typed progress events for prompt batches
//!
//! Listeners subscribe per queue and are detached when their
//! [`ProgressSubscription`] is dropped, whatever the reason the consumer
//! went away.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::state::JobStatus;

/// Status of one prompt within a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptProgress {
    pub queue_id: String,
    pub index: usize,
    pub total: usize,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent_caps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final tally of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub queue_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
    pub skipped: usize,
    pub spent_caps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Batch accepted; always the first event
    Queued { queue_id: String },
    Progress(PromptProgress),
    /// Batch finished; always the last event
    End(BatchSummary),
}

impl ProgressEvent {
    pub fn queue_id(&self) -> &str {
        match self {
            Self::Queued { queue_id } => queue_id,
            Self::Progress(progress) => &progress.queue_id,
            Self::End(summary) => &summary.queue_id,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::End(_))
    }
}

struct Listener {
    queue_id: String,
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: DashMap<u64, Listener>,
}

/// In-process publish/subscribe hub for batch progress
#[derive(Clone, Default)]
pub struct ProgressBus {
    inner: Arc<BusInner>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to events of one queue
    pub fn subscribe(&self, queue_id: &str) -> ProgressSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.inner.listeners.insert(
            id,
            Listener {
                queue_id: queue_id.to_owned(),
                sender,
            },
        );

        ProgressSubscription {
            id,
            bus: Arc::clone(&self.inner),
            receiver,
        }
    }

    /// Deliver an event to the queue's listeners
    pub fn emit(&self, event: &ProgressEvent) {
        let queue_id = event.queue_id();

        // Listeners whose receiver is gone are dropped on the way
        self.inner.listeners.retain(|_, listener| {
            listener.queue_id != queue_id || listener.sender.send(event.clone()).is_ok()
        });
    }

    /// Attached listeners across all queues
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

/// A listener attached to a [`ProgressBus`]
pub struct ProgressSubscription {
    id: u64,
    bus: Arc<BusInner>,
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressSubscription {
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }
}

impl Stream for ProgressSubscription {
    type Item = ProgressEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.bus.listeners.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(queue_id: &str) -> ProgressEvent {
        ProgressEvent::Queued {
            queue_id: queue_id.to_owned(),
        }
    }

    #[tokio::test]
    async fn events_are_routed_by_queue() {
        let bus = ProgressBus::new();
        let mut first = bus.subscribe("q1");
        let mut second = bus.subscribe("q2");

        bus.emit(&queued("q1"));
        bus.emit(&queued("q2"));

        assert_eq!(first.recv().await.unwrap().queue_id(), "q1");
        assert_eq!(second.recv().await.unwrap().queue_id(), "q2");
    }

    #[test]
    fn dropping_subscription_detaches_listener() {
        let bus = ProgressBus::new();
        let baseline = bus.listener_count();

        let subscriptions: Vec<_> = (0..10).map(|i| bus.subscribe(&format!("q{i}"))).collect();
        assert_eq!(bus.listener_count(), baseline + 10);

        drop(subscriptions);
        assert_eq!(bus.listener_count(), baseline);
    }

    #[test]
    fn emitting_without_listeners_is_harmless() {
        let bus = ProgressBus::new();
        bus.emit(&queued("q1"));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn end_is_terminal() {
        assert!(ProgressEvent::End(BatchSummary::default()).is_terminal());
        assert!(!queued("q1").is_terminal());
    }
}
