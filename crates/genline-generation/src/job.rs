//! Per-request generation job
//!
//! A job drives one dispatched stream to a terminal status, then settles
//! it: debit the subscription, persist the final message and notify the
//! chat. Settlement runs only for the caller that wins the terminal
//! transition on [`JobState`].

use std::sync::Arc;

use futures_util::StreamExt;
use genline_billing::WriteOffMeta;
use genline_core::{HttpError, RequestContext};
use genline_llm::{Completion, DispatchEvent, GenerationRequest, LlmError, Usage};
use jiff::Timestamp;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::generator::GeneratorInner;
use crate::state::{JobState, JobStatus};
use crate::store::{ChatEvent, MessageRecord};
use crate::tokens;

/// Update sent to the job's caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobUpdate {
    Delta { content_delta: String },
    /// Last update of every job
    Finished(JobOutcome),
}

/// Client-safe description of a job failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<&LlmError> for JobFailure {
    fn from(error: &LlmError) -> Self {
        Self {
            error_type: error.error_type().to_owned(),
            message: error.client_message(),
        }
    }
}

/// Settled result of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: String,
    pub message_id: String,
    pub status: JobStatus,
    pub content: String,
    /// Units the job was billed for
    pub usage: Usage,
    pub spent_caps: u64,
    /// Balance after settlement, when known
    pub balance: Option<i64>,
    pub provider_id: Option<String>,
    pub failure: Option<JobFailure>,
}

/// How the stream ended, before settlement
enum StreamEnd {
    Completed,
    Failed(LlmError),
    Stopped,
}

/// What the job saw of the stream
#[derive(Default)]
struct Observed {
    content: String,
    usage: Option<Usage>,
    provider_id: Option<String>,
}

pub(crate) struct GenerationJob {
    pub(crate) id: String,
    pub(crate) inner: Arc<GeneratorInner>,
    pub(crate) context: RequestContext,
    pub(crate) request: GenerationRequest,
    pub(crate) message: MessageRecord,
    pub(crate) state: Arc<JobState>,
    pub(crate) stop: CancellationToken,
    pub(crate) updates: mpsc::Sender<JobUpdate>,
    pub(crate) billable: bool,
    pub(crate) balance: Option<i64>,
}

impl GenerationJob {
    pub(crate) async fn run(self) {
        let mut observed = Observed::default();
        let end = self.drive(&mut observed).await;
        self.settle(end, observed).await;
    }

    async fn drive(&self, observed: &mut Observed) -> StreamEnd {
        let settings = &self.inner.settings;
        let deadline = tokio::time::sleep(settings.max_stream_duration);
        tokio::pin!(deadline);

        let mut stream = tokio::select! {
            biased;
            () = self.stop.cancelled() => return StreamEnd::Stopped,
            () = self.updates.closed() => return StreamEnd::Stopped,
            () = &mut deadline => return StreamEnd::Failed(self.timeout()),
            result = self.inner.dispatcher.dispatch_request(&self.request) => match result {
                Ok(stream) => stream,
                Err(e) => return StreamEnd::Failed(e),
            },
        };

        self.state.begin_streaming();
        let mut last_persist = Instant::now();

        loop {
            let next = tokio::select! {
                biased;
                () = self.stop.cancelled() => return StreamEnd::Stopped,
                () = self.updates.closed() => return StreamEnd::Stopped,
                () = &mut deadline => return StreamEnd::Failed(self.timeout()),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(DispatchEvent::Delta(delta))) => {
                    observed.content.push_str(&delta);

                    if self
                        .updates
                        .send(JobUpdate::Delta { content_delta: delta })
                        .await
                        .is_err()
                    {
                        return StreamEnd::Stopped;
                    }

                    if last_persist.elapsed() >= settings.persist_interval {
                        self.persist_progress(&observed.content).await;
                        last_persist = Instant::now();
                    }
                }
                Some(Ok(DispatchEvent::Terminal(Completion {
                    content,
                    usage,
                    provider_id,
                }))) => {
                    observed.content = content;
                    observed.usage = usage;
                    observed.provider_id = Some(provider_id);
                    return StreamEnd::Completed;
                }
                Some(Err(e)) => return StreamEnd::Failed(e),
                None => return StreamEnd::Completed,
            }
        }
    }

    fn timeout(&self) -> LlmError {
        LlmError::StreamTimeout {
            seconds: self.inner.settings.max_stream_duration.as_secs(),
        }
    }

    async fn persist_progress(&self, content: &str) {
        let mut record = self.message.clone();
        record.content = content.to_owned();
        record.status = JobStatus::Streaming;
        record.updated_at = Timestamp::now();

        if let Err(e) = self.inner.messages.update(&record).await {
            tracing::warn!(job_id = %self.id, error = %e, "failed to persist partial content");
        }
    }

    /// Usage billed for a terminal status
    fn billed_usage(&self, status: JobStatus, observed: &Observed) -> Usage {
        match (status, observed.usage) {
            (_, Some(usage)) => usage,
            (JobStatus::Stopped, None) => tokens::estimate_usage(&self.request.messages, &observed.content),
            (JobStatus::Done, None) => {
                let provider = observed.provider_id.clone().unwrap_or_default();
                tracing::warn!(
                    job_id = %self.id,
                    error = %LlmError::UsageUnavailable { provider },
                    "billing zero units"
                );
                Usage::default()
            }
            (_, None) => Usage::default(),
        }
    }

    async fn settle(self, end: StreamEnd, observed: Observed) {
        let (status, failure) = match &end {
            StreamEnd::Completed => (JobStatus::Done, None),
            StreamEnd::Failed(e) => (JobStatus::Error, Some(JobFailure::from(e))),
            StreamEnd::Stopped => (JobStatus::Stopped, None),
        };

        if !self.state.try_finish(status) {
            tracing::debug!(job_id = %self.id, "job already settled");
            return;
        }

        if let StreamEnd::Failed(e) = &end {
            tracing::warn!(job_id = %self.id, model = %self.request.model_id, error = %e, "generation failed");
        }

        let usage = self.billed_usage(status, &observed);
        let spent_caps = self
            .inner
            .pricing
            .caps(&self.request.model_id, usage.prompt_units, usage.completion_units);

        let chat_id = self.message.chat_id.as_deref();
        let mut balance = self.balance;
        let mut transaction = None;

        if self.billable {
            let meta = WriteOffMeta {
                job_id: self.id.clone(),
                chat_id: chat_id.map(str::to_owned),
                model_id: self.request.model_id.clone(),
                provider_id: observed.provider_id.clone(),
                prompt_units: usage.prompt_units,
                completion_units: usage.completion_units,
                status: status.as_str().to_owned(),
            };

            match self
                .inner
                .ledger
                .write_off(&self.context.subscription_id, spent_caps, &meta)
                .await
            {
                Ok(write_off) => {
                    balance = Some(write_off.new_balance);
                    transaction = Some(write_off.transaction);
                }
                Err(e) => {
                    tracing::error!(
                        job_id = %self.id,
                        subscription_id = %self.context.subscription_id,
                        spent_caps,
                        error = %e,
                        "failed to write off caps"
                    );
                }
            }
        }

        let mut record = self.message.clone();
        record.content.clone_from(&observed.content);
        record.status = status;
        record.provider_id.clone_from(&observed.provider_id);
        record.updated_at = Timestamp::now();

        if let Err(e) = self.inner.messages.update(&record).await {
            tracing::error!(job_id = %self.id, error = %e, "failed to persist final message");
        }

        if let Some(chat_id) = chat_id {
            let events = &self.inner.events;
            events.emit(chat_id, ChatEvent::MessageUpdated { message: record });
            if let Some(transaction) = transaction {
                events.emit(chat_id, ChatEvent::TransactionCreated { transaction });
            }
            if let (true, Some(balance)) = (self.billable, balance) {
                events.emit(
                    chat_id,
                    ChatEvent::SubscriptionBalanceUpdated {
                        subscription_id: self.context.subscription_id.clone(),
                        balance,
                    },
                );
            }
        }

        tracing::info!(
            job_id = %self.id,
            user_id = %self.context.user_id,
            model = %self.request.model_id,
            provider = observed.provider_id.as_deref().unwrap_or("-"),
            status = %status,
            prompt_units = usage.prompt_units,
            completion_units = usage.completion_units,
            spent_caps,
            "generation settled"
        );

        let outcome = JobOutcome {
            job_id: self.id.clone(),
            message_id: self.message.id.clone(),
            status,
            content: observed.content,
            usage,
            spent_caps,
            balance,
            provider_id: observed.provider_id,
            failure,
        };

        if self.updates.send(JobUpdate::Finished(outcome)).await.is_err() {
            tracing::debug!(job_id = %self.id, "caller left before the outcome");
        }
    }
}
