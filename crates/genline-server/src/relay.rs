//! SSE relay for prompt batch progress
//!
//! The relay owns the batch's [`BatchHandle`]. When the client goes away
//! the stream is dropped with it: the progress subscription detaches
//! from the bus and the batch is cancelled. No frame is written after
//! the terminal one.

use axum::response::sse::Event;
use futures_util::Stream;
use genline_generation::{BatchHandle, ProgressEvent};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueuedFrame<'a> {
    queue_id: &'a str,
}

#[derive(Serialize)]
struct ProgressFrame<'a, T: Serialize> {
    #[serde(flatten)]
    event: &'a T,
    done: bool,
}

/// Frame a progress event as SSE
pub fn wire_event(event: &ProgressEvent) -> Result<Event, axum::Error> {
    match event {
        ProgressEvent::Queued { queue_id } => Event::default().json_data(QueuedFrame { queue_id }),
        ProgressEvent::Progress(progress) => Event::default().json_data(ProgressFrame {
            event: progress,
            done: false,
        }),
        ProgressEvent::End(summary) => Event::default().json_data(ProgressFrame {
            event: summary,
            done: true,
        }),
    }
}

/// Relay a batch's progress until its terminal event, then `[DONE]`
pub fn relay(mut handle: BatchHandle) -> impl Stream<Item = Result<Event, axum::Error>> {
    let queue_id = handle.queue.queue_id.clone();
    let cancel_on_drop = handle.cancel_token().drop_guard();

    async_stream::stream! {
        let _cancel_on_drop = cancel_on_drop;

        while let Some(event) = handle.progress.recv().await {
            let terminal = event.is_terminal();
            yield wire_event(&event);

            if terminal {
                yield Ok(Event::default().data("[DONE]"));
                break;
            }
        }

        tracing::debug!(queue_id = %queue_id, "progress relay closed");
    }
}

#[cfg(test)]
mod tests {
    use genline_generation::{BatchSummary, JobStatus, PromptProgress};

    use super::*;

    fn json<T: Serialize>(frame: &T) -> serde_json::Value {
        serde_json::to_value(frame).unwrap()
    }

    #[test]
    fn progress_frames_are_not_done() {
        let progress = PromptProgress {
            queue_id: "q1".to_owned(),
            index: 1,
            total: 3,
            status: JobStatus::Streaming,
            content_delta: Some("hi".to_owned()),
            spent_caps: None,
            error: None,
        };

        let value = json(&ProgressFrame {
            event: &progress,
            done: false,
        });
        assert_eq!(value["queueId"], "q1");
        assert_eq!(value["index"], 1);
        assert_eq!(value["status"], "streaming");
        assert_eq!(value["contentDelta"], "hi");
        assert_eq!(value["done"], false);
        assert!(value.get("spentCaps").is_none());
    }

    #[test]
    fn end_frame_is_done() {
        let summary = BatchSummary {
            queue_id: "q1".to_owned(),
            total: 3,
            completed: 1,
            stopped: 1,
            skipped: 1,
            ..BatchSummary::default()
        };

        let value = json(&ProgressFrame {
            event: &summary,
            done: true,
        });
        assert_eq!(value["done"], true);
        assert_eq!(value["skipped"], 1);
    }

    #[test]
    fn queued_frame_carries_only_the_queue() {
        let value = json(&QueuedFrame { queue_id: "q1" });
        assert_eq!(value, serde_json::json!({ "queueId": "q1" }));
    }
}
