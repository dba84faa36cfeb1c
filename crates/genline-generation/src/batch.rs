//! Sequential prompt batches under a cancellable queue
//!
//! Each prompt runs as its own generation job, one at a time. A
//! cancellation signal, from any process, stops the prompt in flight and
//! skips the rest. Failed prompts do not end the batch.

use futures_util::StreamExt;
use genline_core::RequestContext;
use genline_llm::{ChatMessage, GenerationRequest};
use genline_queue::{CancelStream, PromptQueue, PromptQueueRegistry};
use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;
use crate::generator::Generator;
use crate::job::{JobOutcome, JobUpdate};
use crate::progress::{BatchSummary, ProgressBus, ProgressEvent, ProgressSubscription, PromptProgress};
use crate::state::JobStatus;

/// Prompts submitted together
#[derive(Debug, Clone)]
pub struct PromptBatch {
    pub model_id: String,
    pub prompts: Vec<String>,
    /// Instruction prepended to every prompt
    pub system: Option<String>,
    pub explicit_provider_id: Option<String>,
    pub chat_id: Option<String>,
}

/// Caller side of a submitted batch
pub struct BatchHandle {
    pub queue: PromptQueue,
    /// Progress of this batch, starting with `Queued`
    pub progress: ProgressSubscription,
    cancel: CancellationToken,
}

impl BatchHandle {
    /// Stop the batch from this process
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the batch when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Runs prompt batches
#[derive(Clone)]
pub struct BatchRunner {
    generator: Generator,
    registry: PromptQueueRegistry,
    bus: ProgressBus,
}

impl BatchRunner {
    pub const fn new(generator: Generator, registry: PromptQueueRegistry, bus: ProgressBus) -> Self {
        Self {
            generator,
            registry,
            bus,
        }
    }

    pub const fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    pub const fn registry(&self) -> &PromptQueueRegistry {
        &self.registry
    }

    /// Register a batch and start running it in the background
    ///
    /// The returned subscription is attached before the first event is
    /// emitted, so it observes `Queued` first and `End` last.
    pub async fn submit(&self, context: &RequestContext, batch: PromptBatch) -> Result<BatchHandle, GenerationError> {
        if batch.prompts.is_empty() {
            return Err(GenerationError::EmptyBatch);
        }

        self.generator
            .dispatcher()
            .graph()
            .resolve(&batch.model_id, batch.explicit_provider_id.as_deref())?;

        let queue = PromptQueue::new(&context.user_id, batch.prompts.len());
        self.registry.register(&queue.user_id, &queue.queue_id).await?;

        let signals = match self.registry.cancellations(&queue.queue_id).await {
            Ok(signals) => signals,
            Err(e) => {
                self.unregister(&queue).await;
                return Err(e.into());
            }
        };

        let progress = self.bus.subscribe(&queue.queue_id);
        self.bus.emit(&ProgressEvent::Queued {
            queue_id: queue.queue_id.clone(),
        });

        tracing::info!(
            queue_id = %queue.queue_id,
            user_id = %queue.user_id,
            prompts = queue.prompt_count,
            "prompt batch queued"
        );

        let cancel = CancellationToken::new();
        let runner = self.clone();
        tokio::spawn(runner.run(context.clone(), queue.clone(), batch, signals, cancel.clone()));

        Ok(BatchHandle {
            queue,
            progress,
            cancel,
        })
    }

    async fn run(
        self,
        context: RequestContext,
        queue: PromptQueue,
        batch: PromptBatch,
        mut signals: CancelStream,
        cancel: CancellationToken,
    ) {
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            let queue_id = queue.queue_id.clone();
            async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    signal = signals.next() => match signal {
                        Some(signal) => {
                            tracing::info!(queue_id = %queue_id, requested_by = %signal.user_id, "batch cancellation received");
                            cancel.cancel();
                        }
                        None => {
                            tracing::warn!(queue_id = %queue_id, "cancellation subscription lost, batch can only be stopped locally");
                        }
                    },
                }
            }
        });

        let total = batch.prompts.len();
        let mut summary = BatchSummary {
            queue_id: queue.queue_id.clone(),
            total,
            ..BatchSummary::default()
        };

        for (index, prompt) in batch.prompts.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.skipped = total - index;
                break;
            }

            let request = GenerationRequest {
                request_id: format!("{}:{index}", queue.queue_id),
                user_id: context.user_id.clone(),
                model_id: batch.model_id.clone(),
                messages: batch
                    .system
                    .iter()
                    .map(ChatMessage::system)
                    .chain(std::iter::once(ChatMessage::user(prompt.as_str())))
                    .collect(),
                explicit_provider_id: batch.explicit_provider_id.clone(),
            };

            let progress = |status: JobStatus| PromptProgress {
                queue_id: queue.queue_id.clone(),
                index,
                total,
                status,
                content_delta: None,
                spent_caps: None,
                error: None,
            };

            let started = self
                .generator
                .start_with_stop(&context, request, batch.chat_id.clone(), cancel.child_token())
                .await;

            let mut job = match started {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(queue_id = %queue.queue_id, index, error = %e, "prompt rejected");
                    summary.failed += 1;
                    self.bus.emit(&ProgressEvent::Progress(PromptProgress {
                        error: Some(e.to_string()),
                        ..progress(JobStatus::Error)
                    }));
                    continue;
                }
            };

            let mut outcome: Option<JobOutcome> = None;
            while let Some(update) = job.updates.recv().await {
                match update {
                    JobUpdate::Delta { content_delta } => {
                        self.bus.emit(&ProgressEvent::Progress(PromptProgress {
                            content_delta: Some(content_delta),
                            ..progress(JobStatus::Streaming)
                        }));
                    }
                    JobUpdate::Finished(finished) => outcome = Some(finished),
                }
            }

            let Some(outcome) = outcome else {
                tracing::error!(queue_id = %queue.queue_id, index, "job ended without an outcome");
                summary.failed += 1;
                continue;
            };

            summary.spent_caps += outcome.spent_caps;
            match outcome.status {
                JobStatus::Done => summary.completed += 1,
                JobStatus::Stopped => summary.stopped += 1,
                _ => summary.failed += 1,
            }

            self.bus.emit(&ProgressEvent::Progress(PromptProgress {
                spent_caps: Some(outcome.spent_caps),
                error: outcome.failure.map(|f| f.message),
                ..progress(outcome.status)
            }));
        }

        watcher.abort();
        self.unregister(&queue).await;

        tracing::info!(
            queue_id = %queue.queue_id,
            completed = summary.completed,
            failed = summary.failed,
            stopped = summary.stopped,
            skipped = summary.skipped,
            spent_caps = summary.spent_caps,
            "prompt batch finished"
        );

        self.bus.emit(&ProgressEvent::End(summary));
    }

    async fn unregister(&self, queue: &PromptQueue) {
        if let Err(e) = self.registry.unregister(&queue.user_id, &queue.queue_id).await {
            tracing::warn!(queue_id = %queue.queue_id, error = %e, "failed to unregister prompt queue");
        }
    }
}
