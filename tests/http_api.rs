//! HTTP chat API end to end, with in-memory collaborators

mod common;

use common::{config_from, Harness};
use dbagent_cli::transport::http::{router, spawn_idle_sweep, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_api(harness: &Harness) -> (String, Arc<AppState>) {
    let state = Arc::new(AppState::new(harness.services()).exit_on_terminate(false));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn harness() -> Harness {
    let harness = Harness::new(config_from(&[
        ("CB_MCP_ACTIVE", "true"),
        ("PG_MCP_ACTIVE", "false"),
    ]));
    harness.hub.serve("couchbase", 5);
    harness
}

async fn create_session(http: &reqwest::Client, base: &str) -> Value {
    let response = http
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let harness = harness();
    let (base, _) = spawn_api(&harness).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn session_start_message_and_status() {
    let harness = harness();
    let (base, _) = spawn_api(&harness).await;
    let http = reqwest::Client::new();

    let created = create_session(&http, &base).await;
    assert_eq!(created["state"], "READY");
    assert_eq!(
        created["messages"][0]["content"],
        "Connected to: Couchbase MCP (5 tools). Ask me anything!"
    );
    assert_eq!(created["messages"][0]["actions"][0]["name"], "reset_agent");
    let id = created["id"].as_str().unwrap().to_string();

    let status: Value = http
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["backends"][0]["server"], "couchbase");
    assert_eq!(status["backends"][0]["tools"], 5);
    assert_eq!(status["bucket"], "travel-sample");

    let reply: Value = http
        .post(format!("{}/sessions/{}/messages", base, id))
        .json(&json!({ "content": "how many hotels?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["messages"][0]["content"], "echo: how many hotels?");
}

#[tokio::test]
async fn actions_and_end() {
    let harness = harness();
    let (base, state) = spawn_api(&harness).await;
    let http = reqwest::Client::new();

    let created = create_session(&http, &base).await;
    let id = created["id"].as_str().unwrap().to_string();

    let reset: Value = http
        .post(format!("{}/sessions/{}/actions/reset_agent", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["terminate"], false);
    assert_eq!(
        reset["messages"][1]["content"],
        "✅ Agent reset! Ready to query 'travel-sample'."
    );

    let exit: Value = http
        .post(format!("{}/sessions/{}/actions/exit_app", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(exit["terminate"], true);
    assert_eq!(exit["messages"][0]["content"], "🚪 Shutting down application...");

    let response = http
        .delete(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    assert!(state.registry().is_empty());
    assert_eq!(harness.hub.open_handles(), 0);
}

#[tokio::test]
async fn unknown_session_and_action() {
    let harness = harness();
    let (base, _) = spawn_api(&harness).await;
    let http = reqwest::Client::new();

    let missing = http
        .post(format!("{}/sessions/{}/messages", base, uuid::Uuid::new_v4()))
        .json(&json!({ "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let garbage = http
        .get(format!("{}/sessions/not-a-session", base))
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 404);

    let created = create_session(&http, &base).await;
    let id = created["id"].as_str().unwrap();
    let bad_action = http
        .post(format!("{}/sessions/{}/actions/drop_db", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_action.status(), 400);
    let body: Value = bad_action.json().await.unwrap();
    assert_eq!(body["error"], "Unknown action: drop_db");
}

#[tokio::test]
async fn failed_start_is_reported_not_raised() {
    let harness = Harness::new(config_from(&[
        ("CB_MCP_ACTIVE", "false"),
        ("PG_MCP_ACTIVE", "false"),
    ]));
    let (base, _) = spawn_api(&harness).await;
    let http = reqwest::Client::new();

    let created = create_session(&http, &base).await;
    assert_eq!(created["state"], "ERROR");
    let id = created["id"].as_str().unwrap();

    let reply: Value = http
        .post(format!("{}/sessions/{}/messages", base, id))
        .json(&json!({ "content": "hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        reply["messages"][0]["content"],
        "Agent not ready. Please refresh the page."
    );
    assert_eq!(harness.model_calls(), 0);
}

#[tokio::test]
async fn abandoned_session_is_ended_by_idle_sweep() {
    let harness = harness();
    let (base, state) = spawn_api(&harness).await;
    let http = reqwest::Client::new();

    let created = create_session(&http, &base).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(harness.hub.open_handles(), 1);

    let sweep = spawn_idle_sweep(state.clone(), Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(400)).await;
    sweep.abort();

    assert!(state.registry().is_empty());
    assert_eq!(harness.hub.open_handles(), 0);
    let gone = http
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}
