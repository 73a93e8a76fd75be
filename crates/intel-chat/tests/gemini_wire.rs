//! Gemini client over HTTP against an in-process stand-in.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use intel_chat::llm::gemini::API_KEY_HEADER;
use intel_chat::{
    CompletionClient, CompletionReply, CompletionRequest, ConversationItem, GeminiClient,
    LlmError, ToolDeclaration,
};
use intel_core::config::Secret;

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: Value,
    seen: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

async fn answer(
    State(stub): State<Stub>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.seen
        .lock()
        .unwrap()
        .push((uri.path().to_string(), key, body));
    (stub.status, Json(stub.body.clone())).into_response()
}

async fn spawn(status: StatusCode, body: Value) -> (GeminiClient, Stub) {
    let stub = Stub {
        status,
        body,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new().fallback(answer).with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = GeminiClient::new(
        &format!("http://{}/v1beta", addr),
        "gemini-1.5-flash",
        Secret::new("test-key"),
        Duration::from_secs(5),
    )
    .unwrap();
    (client, stub)
}

fn request() -> CompletionRequest {
    CompletionRequest {
        system: "Be brief.".to_string(),
        items: vec![ConversationItem::User("Analyze Acme".to_string())],
        tools: vec![ToolDeclaration {
            name: "run_partner_engine".to_string(),
            description: "Run the engine".to_string(),
            parameters: json!({"type": "OBJECT", "properties": {}}),
        }],
    }
}

#[tokio::test]
async fn test_complete_sends_key_and_path() {
    let (client, stub) = spawn(
        StatusCode::OK,
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Hi"}]}}]}),
    )
    .await;

    let reply = client.complete(&request()).await.unwrap();
    assert_eq!(reply, CompletionReply::Text("Hi".to_string()));

    let seen = stub.seen.lock().unwrap();
    let (path, key, body) = &seen[0];
    assert_eq!(path, "/v1beta/models/gemini-1.5-flash:generateContent");
    assert_eq!(key.as_deref(), Some("test-key"));
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Analyze Acme");
}

#[tokio::test]
async fn test_complete_returns_tool_calls() {
    let (client, _stub) = spawn(
        StatusCode::OK,
        json!({"candidates": [{"content": {"role": "model", "parts": [{
            "functionCall": {"name": "run_partner_engine", "args": {"target_company": "Acme"}}
        }]}}]}),
    )
    .await;

    match client.complete(&request()).await.unwrap() {
        CompletionReply::ToolCalls(calls) => assert_eq!(calls[0].args["target_company"], "Acme"),
        other => panic!("expected tool calls, got {:?}", other),
    }
}

#[tokio::test]
async fn test_quota_error() {
    let (client, _stub) = spawn(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}),
    )
    .await;

    let err = client.complete(&request()).await.unwrap_err();
    assert!(err.is_quota());
}

#[tokio::test]
async fn test_unknown_model_error() {
    let (client, _stub) = spawn(
        StatusCode::NOT_FOUND,
        json!({"error": {"code": 404, "message": "models/gemini-1.5-flash is not found"}}),
    )
    .await;

    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidModel(ref m) if m == "gemini-1.5-flash"));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_rejected_key_error() {
    let (client, _stub) = spawn(
        StatusCode::BAD_REQUEST,
        json!({"error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}}),
    )
    .await;

    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidApiKey(_)));
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GeminiClient::new(
        &format!("http://{}", addr),
        "gemini-1.5-flash",
        Secret::new("k"),
        Duration::from_secs(2),
    )
    .unwrap();
    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport(_)));
}
