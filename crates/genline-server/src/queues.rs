//! Prompt queue submission and cancellation

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use futures_util::Stream;
use genline_core::RequestContext;
use genline_generation::PromptBatch;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::relay;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptQueueBody {
    pub model: String,
    pub prompts: Vec<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub queue_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Handle `POST /v1/prompt-queues`
pub async fn create_prompt_queue(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(body): Json<PromptQueueBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let batch = PromptBatch {
        model_id: body.model,
        prompts: body.prompts,
        system: body.system,
        explicit_provider_id: body.provider_id,
        chat_id: body.chat_id,
    };

    let handle = state.batches().submit(&context, batch).await?;

    Ok(Sse::new(relay::relay(handle)).keep_alive(KeepAlive::default()))
}

/// Handle `POST /v1/prompt-queues/cancel`
///
/// Answers `false` for queues that are not active for the caller.
pub async fn cancel_prompt_queue(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state
        .batches()
        .registry()
        .cancel(&context.user_id, &body.queue_id)
        .await?;

    Ok(Json(CancelResponse { cancelled }))
}
