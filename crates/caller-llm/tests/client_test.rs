use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use caller_llm::{LlmClient, LlmConfig, LlmError, Reply};
use caller_types::ChatMessage;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> LlmClient {
    let config = LlmConfig::new("sk-test")
        .with_api_base(format!("http://{addr}/v1"))
        .with_model("gpt-test");
    LlmClient::new(config).unwrap()
}

async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key provided"}})),
        );
    }
    assert_eq!(body["model"], "gpt-test");
    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    let content = match last.as_str() {
        "bye" => "Thanks for calling, goodbye! [END_CALL]".to_string(),
        "empty" => "   ".to_string(),
        _ => format!("You said: {last}"),
    };
    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })),
    )
}

#[tokio::test]
async fn completes_conversation() {
    let addr = spawn_mock(Router::new().route("/v1/chat/completions", post(completions))).await;
    let client = client_for(addr);

    let reply = client
        .complete(&[ChatMessage::system("sys"), ChatMessage::user("hello there")])
        .await
        .unwrap();
    assert_eq!(reply, "You said: hello there");
}

#[tokio::test]
async fn end_call_marker_round_trips_through_reply() {
    let addr = spawn_mock(Router::new().route("/v1/chat/completions", post(completions))).await;
    let client = client_for(addr);

    let raw = client.complete(&[ChatMessage::user("bye")]).await.unwrap();
    let reply = Reply::parse(&raw);
    assert!(reply.ends_call);
    assert_eq!(reply.text, "Thanks for calling, goodbye!");
}

#[tokio::test]
async fn blank_completion_is_an_error() {
    let addr = spawn_mock(Router::new().route("/v1/chat/completions", post(completions))).await;
    let client = client_for(addr);

    let result = client.complete(&[ChatMessage::user("empty")]).await;
    assert!(matches!(result, Err(LlmError::EmptyResponse)));
}

#[tokio::test]
async fn api_errors_carry_message() {
    let addr = spawn_mock(Router::new().route("/v1/chat/completions", post(completions))).await;
    let config = LlmConfig::new("sk-wrong").with_api_base(format!("http://{addr}/v1"));
    let client = LlmClient::new(config).unwrap();

    match client.complete(&[ChatMessage::user("hi")]).await {
        Err(LlmError::Api { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_key_fails_fast() {
    let client = LlmClient::new(LlmConfig::default()).unwrap();
    let result = client.complete(&[ChatMessage::user("hi")]).await;
    assert!(matches!(result, Err(LlmError::Config(_))));
}
