mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::{MockProvider, Mode};
use harness::server::TestServer;
use harness::sse::{json_frames, parse_data};

const PATH: &str = "/v1/chats/chat_1/generations";

fn body() -> serde_json::Value {
    serde_json::json!({
        "model": "gpt-x",
        "messages": [{ "role": "user", "content": "Hello" }]
    })
}

#[tokio::test]
async fn stream_frames_deltas_then_settlement() {
    let mock = MockProvider::start(vec![Mode::Stream {
        deltas: vec!["Hel", "lo"],
        usage: Some((10, 5)),
    }])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &mock.base_url())
        .with_model("gpt-x", "", &["primary"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.post(PATH, "usr_1", &body()).await;
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let text = resp.text().await.unwrap();
    assert_eq!(parse_data(&text).last().map(String::as_str), Some("[DONE]"));

    let frames = json_frames(&text);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["status"], "pending");
    assert_eq!(frames[0]["contentDelta"], "Hel");
    assert_eq!(frames[1]["contentDelta"], "lo");
    assert_eq!(frames[0]["caps"], 1_000_000);

    let last = &frames[2];
    assert_eq!(last["status"], "done");
    assert_eq!(last["spentCaps"], 15);
    assert_eq!(last["caps"], 1_000_000 - 15);
    assert!(last.get("error").is_none());

    let sent = &mock.requests()[0];
    assert_eq!(sent["model"], "gpt-x");
    assert_eq!(sent["user"], "usr_1");
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["stream_options"]["include_usage"], true);
}

#[tokio::test]
async fn stream_without_usage_bills_nothing() {
    let mock = MockProvider::start(vec![Mode::Stream {
        deltas: vec!["hi"],
        usage: None,
    }])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &mock.base_url())
        .with_model("gpt-x", "", &["primary"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let text = server.post(PATH, "usr_1", &body()).await.text().await.unwrap();
    let frames = json_frames(&text);
    let last = frames.last().unwrap();

    assert_eq!(last["status"], "done");
    assert_eq!(last["spentCaps"], 0);
    assert_eq!(last["caps"], 1_000_000);
}

#[tokio::test]
async fn context_length_is_reported_in_band_without_fallback() {
    let primary = MockProvider::start(vec![Mode::ContextLength]).await.unwrap();
    let backup = MockProvider::start(vec![Mode::text(&["never"])]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &primary.base_url())
        .with_openai_provider("backup", &backup.base_url())
        .with_fallback("primary", "backup")
        .with_model("gpt-x", "", &["primary", "backup"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.post(PATH, "usr_1", &body()).await;
    assert_eq!(resp.status(), 200);

    let text = resp.text().await.unwrap();
    let frames = json_frames(&text);
    let last = frames.last().unwrap();

    assert_eq!(last["status"], "error");
    assert_eq!(last["error"]["type"], "context_length_exceeded");
    assert_eq!(parse_data(&text).last().map(String::as_str), Some("[DONE]"));
    assert_eq!(primary.request_count(), 1);
    assert_eq!(backup.request_count(), 0);
}

#[tokio::test]
async fn insufficient_balance_is_rejected_before_streaming() {
    let mock = MockProvider::start(vec![Mode::text(&["x"])]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &mock.base_url())
        .with_model("gpt-x", "", &["primary"])
        .with_initial_balance(0)
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.post(PATH, "usr_1", &body()).await;

    assert_eq!(resp.status(), 402);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "insufficient_balance");
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn admin_generates_without_balance() {
    let mock = MockProvider::start(vec![Mode::text(&["x"])]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &mock.base_url())
        .with_model("gpt-x", "", &["primary"])
        .with_initial_balance(0)
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url(PATH))
        .header("x-user-id", "usr_admin")
        .header("x-user-role", "admin")
        .json(&body())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let frames = json_frames(&resp.text().await.unwrap());
    assert_eq!(frames.last().unwrap()["status"], "done");
}

#[tokio::test]
async fn unknown_model_is_a_json_error() {
    let mock = MockProvider::start(vec![Mode::text(&["x"])]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &mock.base_url())
        .with_model("gpt-x", "", &["primary"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let mut request = body();
    request["model"] = "nope".into();
    let resp = server.post(PATH, "usr_1", &request).await;

    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert!(json["error"]["message"].as_str().unwrap().contains("nope"));
}
