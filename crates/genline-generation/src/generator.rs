//! Entry point that validates, pre-checks and spawns generation jobs

use std::sync::Arc;
use std::time::Duration;

use genline_billing::{BillingError, Pricing, SubscriptionLedger};
use genline_config::GenerationConfig;
use genline_core::RequestContext;
use genline_llm::{FallbackDispatcher, GenerationRequest};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;
use crate::job::{GenerationJob, JobUpdate};
use crate::state::{JobState, JobStatus};
use crate::store::{ChatEventStream, MessageRecord, MessageStore};
use crate::tokens;

/// Buffered updates before a slow caller applies backpressure
const UPDATE_BUFFER: usize = 64;

/// Job tunables
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Longest a stream may run before the job errors out
    pub max_stream_duration: Duration,
    /// Minimum interval between partial content writes
    pub persist_interval: Duration,
    /// Roles whose jobs are never debited
    pub non_billable_roles: Vec<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_stream_duration: Duration::from_secs(600),
            persist_interval: Duration::from_secs(1),
            non_billable_roles: vec!["admin".to_owned()],
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            max_stream_duration: config.max_stream_duration()?,
            persist_interval: config.persist_interval()?,
            non_billable_roles: config.non_billable_roles.clone(),
        })
    }
}

pub(crate) struct GeneratorInner {
    pub(crate) dispatcher: FallbackDispatcher,
    pub(crate) pricing: Arc<dyn Pricing>,
    pub(crate) ledger: Arc<dyn SubscriptionLedger>,
    pub(crate) messages: Arc<dyn MessageStore>,
    pub(crate) events: Arc<dyn ChatEventStream>,
    pub(crate) settings: GenerationSettings,
}

/// Starts generation jobs
#[derive(Clone)]
pub struct Generator {
    inner: Arc<GeneratorInner>,
}

/// Control side of a running job
pub struct JobHandle {
    pub job_id: String,
    pub message_id: String,
    /// Balance seen by the pre-dispatch check
    pub balance: Option<i64>,
    state: Arc<JobState>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Request an external stop; no-op once the job settled
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Wait for the job task to exit
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!(job_id = %self.job_id, error = %e, "generation task failed");
        }
    }
}

/// A started job and its update stream
pub struct StartedJob {
    pub handle: JobHandle,
    /// Deltas followed by exactly one `Finished`; dropping it stops the job
    pub updates: mpsc::Receiver<JobUpdate>,
}

impl Generator {
    pub fn new(
        dispatcher: FallbackDispatcher,
        pricing: Arc<dyn Pricing>,
        ledger: Arc<dyn SubscriptionLedger>,
        messages: Arc<dyn MessageStore>,
        events: Arc<dyn ChatEventStream>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            inner: Arc::new(GeneratorInner {
                dispatcher,
                pricing,
                ledger,
                messages,
                events,
                settings,
            }),
        }
    }

    pub fn dispatcher(&self) -> &FallbackDispatcher {
        &self.inner.dispatcher
    }

    /// Start a job that stops only through its handle or its receiver
    pub async fn start(
        &self,
        context: &RequestContext,
        request: GenerationRequest,
        chat_id: Option<String>,
    ) -> Result<StartedJob, GenerationError> {
        self.start_with_stop(context, request, chat_id, CancellationToken::new())
            .await
    }

    /// Start a job that also stops when `stop` is cancelled
    ///
    /// Fails without dispatching when the model cannot be resolved or the
    /// balance does not cover the estimated prompt cost.
    pub async fn start_with_stop(
        &self,
        context: &RequestContext,
        request: GenerationRequest,
        chat_id: Option<String>,
        stop: CancellationToken,
    ) -> Result<StartedJob, GenerationError> {
        let inner = &self.inner;
        inner
            .dispatcher
            .graph()
            .resolve(&request.model_id, request.explicit_provider_id.as_deref())?;

        let message = MessageRecord::pending(chat_id, &context.user_id, &request.model_id);
        inner.messages.create(&message).await?;

        let billable = context.is_billable(&inner.settings.non_billable_roles);
        let balance = if billable {
            match self.check_balance(context, &request).await {
                Ok(balance) => Some(balance),
                Err(e) => {
                    let mut rejected = message.clone();
                    rejected.status = JobStatus::Error;
                    if let Err(store_error) = inner.messages.update(&rejected).await {
                        tracing::warn!(error = %store_error, "failed to mark rejected message");
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        let job_id = uuid::Uuid::new_v4().to_string();
        let state = Arc::new(JobState::new());
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);

        tracing::debug!(
            job_id = %job_id,
            user_id = %context.user_id,
            model = %request.model_id,
            billable,
            "starting generation"
        );

        let job = GenerationJob {
            id: job_id.clone(),
            inner: Arc::clone(inner),
            context: context.clone(),
            request,
            message: message.clone(),
            state: Arc::clone(&state),
            stop: stop.clone(),
            updates: tx,
            billable,
            balance,
        };

        let task = tokio::spawn(job.run());

        Ok(StartedJob {
            handle: JobHandle {
                job_id,
                message_id: message.id,
                balance,
                state,
                stop,
                task,
            },
            updates: rx,
        })
    }

    async fn check_balance(&self, context: &RequestContext, request: &GenerationRequest) -> Result<i64, GenerationError> {
        let prompt_units = tokens::count_messages(&request.messages);
        let estimate = self.inner.pricing.caps(&request.model_id, prompt_units, 0);

        let check = self
            .inner
            .ledger
            .check_balance(&context.subscription_id, estimate)
            .await?;

        if !check.sufficient {
            tracing::info!(
                subscription_id = %context.subscription_id,
                balance = check.balance,
                estimate,
                "insufficient balance"
            );
            return Err(BillingError::InsufficientBalance {
                balance: check.balance,
                required: estimate,
            }
            .into());
        }

        Ok(check.balance)
    }
}
