//! End-to-end tests: HTTP request in, OpenAI-compatible backend mocked with
//! wiremock, JSON response out.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use nextlevel::config::ModelConfig;
use nextlevel::gateway::{build_router, AppState};
use nextlevel::{InMemoryConversationStore, ModelGateway, OpenAiGateway, Orchestrator};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn models() -> ModelConfig {
    ModelConfig {
        perception: "pi-model".into(),
        integration: "phi-model".into(),
        expansion: "e-model".into(),
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

async fn mount_phase(server: &MockServer, model: &str, content: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": model })))
        .respond_with(completion(content))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let gateway: Arc<dyn ModelGateway> =
        Arc::new(OpenAiGateway::new("sk-test-key", Some(&server.uri()), 10));
    Orchestrator::new(gateway, &models())
}

fn app(server: &MockServer) -> axum::Router {
    build_router(AppState::new(orchestrator(server)))
}

async fn post_chat(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn full_pipeline_over_http() {
    let server = MockServer::start().await;
    mount_phase(
        &server,
        "pi-model",
        r#"{"plan":"answer directly","needsRag":false,"needsTools":false}"#,
        1,
    )
    .await;
    mount_phase(
        &server,
        "phi-model",
        r#"{"integratedContext":"...","coherence":{"kappa":0.9,"tau":0.8,"sigma":0.1,"notes":"stable"}}"#,
        1,
    )
    .await;
    mount_phase(&server, "e-model", "The answer is 42.", 1).await;

    let (status, body) = post_chat(
        app(&server),
        json!({ "userId": "u-1", "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "reply": "The answer is 42.",
            "coherence": { "kappa": 0.9, "tau": 0.8, "sigma": 0.1, "notes": "stable" },
            "usedRag": false,
            "usedTools": false
        })
    );
}

#[tokio::test]
async fn perception_and_integration_use_json_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "model": "pi-model",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(completion(r#"{"needsTools": true}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "model": "phi-model",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(completion(r#"{"integratedContext":"ctx"}"#))
        .expect(1)
        .mount(&server)
        .await;
    mount_phase(&server, "e-model", "done", 1).await;

    let (status, body) = post_chat(
        app(&server),
        json!({ "messages": [{ "role": "user", "content": "use a tool" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usedTools"], true);
    assert_eq!(body["usedRag"], false);
    assert_eq!(
        body["coherence"],
        json!({ "kappa": 0.5, "tau": 0.5, "sigma": 0.5, "notes": "" })
    );
}

#[tokio::test]
async fn unparseable_perception_skips_later_phases() {
    let server = MockServer::start().await;
    mount_phase(&server, "pi-model", "Let me think about that...", 1).await;
    mount_phase(&server, "phi-model", "{}", 0).await;
    mount_phase(&server, "e-model", "unused", 0).await;

    let (status, body) = post_chat(
        app(&server),
        json!({ "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn backend_error_is_internal_error_without_leaking_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("Incorrect API key provided: sk-test-key-1234567890"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post_chat(
        app(&server),
        json!({ "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("401"));
    assert!(!details.contains("sk-test-key-1234567890"));
}

#[tokio::test]
async fn empty_messages_never_reach_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = post_chat(app(&server), json!({ "messages": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "messages array is required" }));
}

#[tokio::test]
async fn memory_store_records_completed_conversation() {
    let server = MockServer::start().await;
    mount_phase(&server, "pi-model", r#"{"plan":"greet"}"#, 1).await;
    mount_phase(
        &server,
        "phi-model",
        r#"{"integratedContext":"greeting","coherence":{"kappa":0.95,"sigma":0.02}}"#,
        1,
    )
    .await;
    mount_phase(&server, "e-model", "Hello!", 1).await;

    let store = Arc::new(InMemoryConversationStore::new(8));
    let app = build_router(AppState::new(orchestrator(&server).with_store(store.clone())));

    let (status, _) = post_chat(
        app,
        json!({ "userId": "u-7", "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = store.get(Some("u-7")).unwrap();
    assert_eq!(stored.turns, 1);
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[1].content, "Hello!");
    assert_eq!(stored.last_coherence.kappa, 0.95);
    assert_eq!(stored.last_coherence.tau, 0.5);
}
