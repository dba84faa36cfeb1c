//! Single streaming generation for a chat

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use futures_util::Stream;
use genline_core::RequestContext;
use genline_generation::{JobFailure, JobStatus, JobUpdate, StartedJob};
use genline_llm::{ChatMessage, GenerationRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// One SSE frame of a generation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationFrame {
    status: JobStatus,
    content_delta: String,
    spent_caps: u64,
    /// Subscription balance, when known
    caps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JobFailure>,
}

/// Handle `POST /v1/chats/{chat_id}/generations`
pub async fn create_generation(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(chat_id): Path<String>,
    Json(body): Json<GenerationBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    if body.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_owned()));
    }

    let request = GenerationRequest {
        request_id: uuid::Uuid::new_v4().to_string(),
        user_id: context.user_id.clone(),
        model_id: body.model,
        messages: body.messages,
        explicit_provider_id: body.provider_id,
    };

    let started = state.generator().start(&context, request, Some(chat_id)).await?;

    Ok(Sse::new(generation_stream(started)).keep_alive(KeepAlive::default()))
}

/// Frames of a started job, closed by `[DONE]`
///
/// Dropping the stream drops the job's receiver, which stops the job.
fn generation_stream(started: StartedJob) -> impl Stream<Item = Result<Event, axum::Error>> {
    let StartedJob { handle, mut updates } = started;
    let caps = handle.balance;

    async_stream::stream! {
        while let Some(update) = updates.recv().await {
            match update {
                JobUpdate::Delta { content_delta } => {
                    yield Event::default().json_data(GenerationFrame {
                        status: JobStatus::Pending,
                        content_delta,
                        spent_caps: 0,
                        caps,
                        error: None,
                    });
                }
                JobUpdate::Finished(outcome) => {
                    yield Event::default().json_data(GenerationFrame {
                        status: outcome.status,
                        content_delta: String::new(),
                        spent_caps: outcome.spent_caps,
                        caps: outcome.balance,
                        error: outcome.failure,
                    });
                    break;
                }
            }
        }

        tracing::debug!(job_id = %handle.job_id, "generation stream closed");
        yield Ok(Event::default().data("[DONE]"));
    }
}
