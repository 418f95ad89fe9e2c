use super::*;
use crate::errors::WahubError;
use crate::providers::base::{Message, ToolDefinition};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer, key: &str) -> OpenAIProvider {
    OpenAIProvider::new(
        key.to_string(),
        "gpt-4o-mini".to_string(),
        format!("{}/v1", server.uri()),
        Duration::from_secs(5),
    )
}

fn simple_chat_request(content: &str) -> ChatRequest<'_> {
    ChatRequest {
        messages: vec![Message::user(content)],
        tools: None,
        model: None,
        max_tokens: 1024,
        temperature: 0.7,
        tool_choice: None,
    }
}

#[tokio::test]
async fn test_chat_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "temperature": 0.7})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello! What would you like to order?"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
        })))
        .mount(&server)
        .await;

    let result = provider(&server, "test_key")
        .chat(simple_chat_request("Hi"))
        .await
        .unwrap();

    assert_eq!(result.content.unwrap(), "Hello! What would you like to order?");
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.input_tokens, Some(10));
    assert_eq!(result.output_tokens, Some(8));
}

#[tokio::test]
async fn test_chat_sends_tools_with_auto_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tool_choice": "auto",
            "tools": [{"type": "function", "function": {"name": "get_store_products"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_store_products",
                            "arguments": "{\"category\": \"drinks\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;

    let mut req = simple_chat_request("What drinks do you have?");
    req.tools = Some(vec![ToolDefinition {
        name: "get_store_products".into(),
        description: "List products".into(),
        parameters: json!({"type": "object", "properties": {}}),
    }]);
    let result = provider(&server, "k").chat(req).await.unwrap();

    assert!(result.has_tool_calls());
    assert!(result.content.is_none());
    assert_eq!(result.tool_calls[0].name, "get_store_products");
    assert_eq!(result.tool_calls[0].id, "call_123");
    assert_eq!(result.tool_calls[0].arguments["category"], "drinks");
}

#[tokio::test]
async fn test_chat_serializes_tool_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user", "content": "menu?"},
                {"role": "assistant", "tool_calls": [{
                    "id": "c1", "type": "function",
                    "function": {"name": "get_store_products", "arguments": "{}"}
                }]},
                {"role": "tool", "tool_call_id": "c1", "content": "[]"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Nothing yet"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = ChatRequest {
        messages: vec![
            Message::user("menu?"),
            Message::assistant(
                "",
                Some(vec![ToolCallRequest {
                    id: "c1".into(),
                    name: "get_store_products".into(),
                    arguments: json!({}),
                }]),
            ),
            Message::tool_result("c1", "[]"),
        ],
        ..simple_chat_request("")
    };
    provider(&server, "k").chat(req).await.unwrap();
}

#[tokio::test]
async fn test_chat_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "authentication_error", "message": "Invalid API key"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server, "bad_key")
        .chat(simple_chat_request("Hi"))
        .await
        .unwrap_err();
    let typed = err.downcast_ref::<WahubError>().unwrap();
    assert!(matches!(typed, WahubError::Auth(_)));
    assert!(typed.to_string().contains("Invalid API key"));
}

#[tokio::test]
async fn test_chat_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "60")
                .set_body_json(json!({
                    "error": {"type": "rate_limit", "message": "Too many requests"}
                })),
        )
        .mount(&server)
        .await;

    let err = provider(&server, "k")
        .chat(simple_chat_request("Hi"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WahubError>(),
        Some(WahubError::RateLimit {
            retry_after: Some(60)
        })
    ));
}

#[tokio::test]
async fn test_chat_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"type": "server_error", "message": "Internal server error"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server, "k")
        .chat(simple_chat_request("Hi"))
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<WahubError>().unwrap().is_retryable());
}

#[tokio::test]
async fn test_chat_bad_request_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"type": "invalid_request_error", "message": "messages with role 'tool' must be a response"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server, "k")
        .chat(simple_chat_request("Hi"))
        .await
        .unwrap_err();
    match err.downcast_ref::<WahubError>() {
        Some(WahubError::Permanent { status, detail, .. }) => {
            assert_eq!(*status, 400);
            assert!(detail.contains("role 'tool'"));
        }
        other => panic!("expected Permanent, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let result = provider(&server, "k").chat(simple_chat_request("Hi")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_chat_custom_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "gpt-4-turbo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Response from custom model"},
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let mut req = simple_chat_request("Hi");
    req.model = Some("gpt-4-turbo");
    let result = provider(&server, "k").chat(req).await.unwrap();
    assert_eq!(result.content.unwrap(), "Response from custom model");
}

#[test]
fn test_temperature_serializes_as_written() {
    assert_eq!(json!(wire_temperature(0.7)), json!(0.7));
    assert_eq!(json!(wire_temperature(0.2)), json!(0.2));
    assert_eq!(json!(wire_temperature(1.0)), json!(1.0));
}
