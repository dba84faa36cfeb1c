//! Client-side SSE helpers

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};

/// `data:` payloads of a fully received SSE body
pub fn parse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_owned)
        .collect()
}

/// JSON frames of an SSE body, without the `[DONE]` sentinel
pub fn json_frames(text: &str) -> Vec<serde_json::Value> {
    parse_data(text)
        .iter()
        .filter(|data| *data != "[DONE]")
        .map(|data| serde_json::from_str(data).expect("JSON frame"))
        .collect()
}

/// Incrementally read `data:` payloads from a streaming response
pub fn data_stream(response: reqwest::Response) -> Pin<Box<dyn Stream<Item = String> + Send>> {
    Box::pin(
        response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move { event.ok().map(|e| e.data) }),
    )
}
