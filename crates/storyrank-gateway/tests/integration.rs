//! End-to-end tests for the control channel.
//!
//! Each test starts a real server on an ephemeral port with a scripted
//! generation backend and drives it over `tokio-tungstenite`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite;

use storyrank_gateway::testing::ScriptedClient;
use storyrank_gateway::{GatewayOptions, GatewayServer, WorkflowOptions};
use storyrank_providers::RetryConfig;

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn scripted() -> ScriptedClient {
    ScriptedClient::new("default reply")
        .on(
            "Rewrite this exchange",
            "1. Good morning team!\n2. Morning PO!\n3. Hi both.",
        )
        .on("introduce the topic", "Topic notes")
        .on("discuss the context", "Context notes")
        .on(
            "KANO model prioritization",
            "- Story ID 1: Indifferent\n- Story ID 2: Basic Needs\n",
        )
        .on(
            "You are the Manager agent",
            "- Story ID 1: 55 dollars\n- Story ID 2: 45 dollars\n",
        )
}

fn test_options() -> GatewayOptions {
    GatewayOptions {
        pacing: Duration::ZERO,
        max_upload_bytes: 1024 * 1024,
        max_queued_requests: 8,
        workflow: WorkflowOptions {
            temperature: 0.7,
            retry: RetryConfig::no_retry(),
        },
    }
}

async fn start_test_server(client: Arc<ScriptedClient>) -> String {
    start_test_server_with(client, test_options()).await
}

async fn start_test_server_with(client: Arc<ScriptedClient>, options: GatewayOptions) -> String {
    let server = GatewayServer::new(client).with_options(options);
    let app = server.router();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("ws://127.0.0.1:{}", addr.port())
}

async fn connect(url: &str) -> Socket {
    let (ws_stream, _) = tokio_tungstenite::connect_async(format!("{}/api/ws-chat", url))
        .await
        .unwrap();
    ws_stream
}

fn workflow(technique: &str) -> String {
    json!({
        "stories": [
            {"key": 10, "user_story": "Log in", "epic": "Auth", "description": "Email login"},
            {"key": "PROJ-2", "user_story": "Export", "epic": "Reports", "description": "CSV"}
        ],
        "prioritization_type": technique,
        "model": "gpt-4o-mini"
    })
    .to_string()
}

async fn send(ws: &mut Socket, text: &str) {
    ws.send(tungstenite::Message::Text(text.into()))
        .await
        .unwrap();
}

async fn recv(ws: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .unwrap();
        if msg.is_text() {
            return serde_json::from_str(&msg.into_text().unwrap()).unwrap();
        }
    }
}

/// Collect events up to and including the terminal one
async fn recv_run(ws: &mut Socket) -> Vec<Value> {
    let mut events = Vec::new();
    loop {
        let event = recv(ws).await;
        let terminal = event["agentType"] == "Final_output_into_table";
        events.push(event);
        if terminal {
            return events;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_kano_run_end_to_end() {
    let client = Arc::new(scripted());
    let url = start_test_server(client.clone()).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("kano")).await;
    let events = recv_run(&mut ws).await;

    let types: Vec<&str> = events
        .iter()
        .map(|e| e["agentType"].as_str().unwrap())
        .collect();
    assert_eq!(&types[..3], &["PO", "QA", "developer"]);
    assert_eq!(events[0]["message"], "Good morning team!");
    assert_eq!(
        &types[5..],
        &[
            "Final Prioritization",
            "Final Prioritization",
            "Final_output_into_table"
        ]
    );
    assert_eq!(events[6]["message"], "Here is the final prioritized output:");

    let last = events.last().unwrap();
    assert_eq!(last["prioritization_type"], "KANO");
    let ranked = last["message"].as_array().unwrap();
    assert_eq!(ranked[0]["key"], "PROJ-2");
    assert_eq!(ranked[0]["kano_category"], "Basic Needs");
    assert_eq!(ranked[1]["key"], 10);
    assert_eq!(ranked[1]["kano_category"], "Indifferent");

    assert_eq!(client.call_count(), 4);
}

#[tokio::test]
async fn test_hundred_dollar_run_end_to_end() {
    let client = Arc::new(scripted());
    let url = start_test_server(client.clone()).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("100_dollar")).await;
    let events = recv_run(&mut ws).await;

    let last = events.last().unwrap();
    assert_eq!(last["prioritization_type"], "100_DOLLAR");
    assert_eq!(last["message"][0]["dollar_allocation"], 55);
    assert_eq!(last["message"][1]["dollar_allocation"], 45);
    assert_eq!(client.call_count(), 7);
}

#[tokio::test]
async fn test_invalid_frames_are_ignored() {
    let url = start_test_server(Arc::new(scripted())).await;
    let mut ws = connect(&url).await;

    send(&mut ws, "not json").await;
    send(&mut ws, r#"{"stories": [], "model": "m"}"#).await;
    send(&mut ws, &workflow("MOSCOW")).await;

    let first = recv(&mut ws).await;
    assert_eq!(first["agentType"], "PO");
}

#[tokio::test]
async fn test_unknown_technique_keeps_connection_usable() {
    let client = Arc::new(scripted());
    let url = start_test_server(client.clone()).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("RICE")).await;
    let error = recv(&mut ws).await;
    assert_eq!(error["agentType"], "error");
    assert_eq!(error["message"], "Unsupported prioritization type: RICE");
    assert_eq!(client.call_count(), 0);

    send(&mut ws, &workflow("AHP")).await;
    let events = recv_run(&mut ws).await;
    assert_eq!(events.last().unwrap()["prioritization_type"], "AHP");
}

#[tokio::test]
async fn test_requests_during_a_run_are_queued() {
    let url = start_test_server(Arc::new(scripted())).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("WSJF")).await;
    send(&mut ws, &workflow("KANO")).await;

    let first = recv_run(&mut ws).await;
    assert_eq!(first.last().unwrap()["prioritization_type"], "WSJF");
    let second = recv_run(&mut ws).await;
    assert_eq!(second.last().unwrap()["prioritization_type"], "KANO");
}

#[tokio::test]
async fn test_disconnect_abandons_the_run() {
    let client = Arc::new(scripted().with_delay(Duration::from_millis(200)));
    let url = start_test_server(client.clone()).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("100_DOLLAR")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    // only the greeting call was ever started
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_requests_beyond_queue_limit_are_dropped() {
    let client = Arc::new(scripted().with_delay(Duration::from_millis(50)));
    let options = GatewayOptions {
        max_queued_requests: 1,
        ..test_options()
    };
    let url = start_test_server_with(client.clone(), options).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("WSJF")).await;
    send(&mut ws, &workflow("KANO")).await;
    send(&mut ws, &workflow("MOSCOW")).await;

    let first = recv_run(&mut ws).await;
    assert_eq!(first.last().unwrap()["prioritization_type"], "WSJF");
    let second = recv_run(&mut ws).await;
    assert_eq!(second.last().unwrap()["prioritization_type"], "KANO");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(client.call_count(), 8);

    // the connection still takes new work once the queue drains
    send(&mut ws, &workflow("AHP")).await;
    let third = recv_run(&mut ws).await;
    assert_eq!(third.last().unwrap()["prioritization_type"], "AHP");
}

#[tokio::test]
async fn test_disconnect_during_estimation_abandons_the_run() {
    let client = Arc::new(
        scripted().delay_on("KANO model prioritization", Duration::from_millis(500)),
    );
    let url = start_test_server(client.clone()).await;
    let mut ws = connect(&url).await;

    send(&mut ws, &workflow("KANO")).await;
    // greeting (3 events) plus topic and context
    for _ in 0..5 {
        let event = recv(&mut ws).await;
        assert_ne!(event["agentType"], "Final_output_into_table");
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.call_count(), 4);

    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(client.call_count(), 4);

    let mut ws = connect(&url).await;
    send(&mut ws, &workflow("MOSCOW")).await;
    let events = recv_run(&mut ws).await;
    assert_eq!(events.last().unwrap()["prioritization_type"], "MOSCOW");
    assert_eq!(client.call_count(), 8);
}
