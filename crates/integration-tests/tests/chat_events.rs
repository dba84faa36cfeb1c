mod harness;

use std::time::Duration;

use futures_util::StreamExt;
use genline_server::USER_ID_HEADER;
use harness::config::ConfigBuilder;
use harness::mock_provider::{MockProvider, Mode};
use harness::server::TestServer;
use harness::sse::data_stream;

const EVENTS: &str = "/v1/chats/chat_alice/events";
const GENERATIONS: &str = "/v1/chats/chat_alice/generations";

async fn server() -> (MockProvider, TestServer) {
    let mock = MockProvider::start(vec![Mode::text(&["secret"])]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("primary", &mock.base_url())
        .with_model("gpt-x", "", &["primary"])
        .build();
    let server = TestServer::start(config).await.unwrap();
    (mock, server)
}

async fn subscribe(server: &TestServer, user_id: &str) -> reqwest::Response {
    let resp = server
        .client()
        .get(server.url(EVENTS))
        .header(USER_ID_HEADER, user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp
}

async fn generate(server: &TestServer, user_id: &str) {
    let body = serde_json::json!({
        "model": "gpt-x",
        "messages": [{ "role": "user", "content": "tell me" }]
    });
    let resp = server.post(GENERATIONS, user_id, &body).await;
    assert_eq!(resp.status(), 200);
    resp.text().await.unwrap();
}

#[tokio::test]
async fn owner_receives_settlement_events_in_order() {
    let (_mock, server) = server().await;
    let mut events = data_stream(subscribe(&server, "alice").await);

    generate(&server, "alice").await;

    let mut received = Vec::new();
    for _ in 0..3 {
        let data = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("chat event")
            .expect("open stream");
        received.push(serde_json::from_str::<serde_json::Value>(&data).unwrap());
    }

    assert_eq!(received[0]["type"], "messageUpdated");
    assert_eq!(received[0]["message"]["content"], "secret");
    assert_eq!(received[0]["message"]["status"], "done");
    assert_eq!(received[1]["type"], "transactionCreated");
    assert_eq!(received[1]["transaction"]["amount"], 15);
    assert_eq!(received[2]["type"], "subscriptionBalanceUpdated");
    assert_eq!(received[2]["subscriptionId"], "alice");
    assert_eq!(received[2]["balance"], 1_000_000 - 15);
}

#[tokio::test]
async fn other_users_see_nothing_of_a_foreign_chat() {
    let (_mock, server) = server().await;
    let mut intruder = data_stream(subscribe(&server, "mallory").await);
    let mut owner = data_stream(subscribe(&server, "alice").await);

    generate(&server, "alice").await;

    // Owner got all three events, so the intruder's stream had its chance
    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), owner.next())
            .await
            .expect("owner event")
            .expect("open stream");
    }

    let leaked = tokio::time::timeout(Duration::from_millis(200), intruder.next()).await;
    assert!(leaked.is_err(), "foreign subscriber received {leaked:?}");
}
