mod common;

use common::{CUSTOMER, TestGateway, chat_text, chat_tool_call, mount_catalog, text_message};
use serde_json::{Value, json};
use wahub::agent::FALLBACK_TEXT;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// Every assistant message with N tool calls is followed by exactly N tool
/// messages answering those ids.
fn assert_tool_calls_paired(messages: &[Value]) {
    let mut i = 0;
    while i < messages.len() {
        let msg = &messages[i];
        if let Some(calls) = msg["tool_calls"].as_array().filter(|c| !c.is_empty()) {
            let mut expected: Vec<&str> = calls.iter().filter_map(|c| c["id"].as_str()).collect();
            let mut answered: Vec<&str> = messages[i + 1..]
                .iter()
                .take(calls.len())
                .filter(|m| m["role"] == "tool")
                .filter_map(|m| m["tool_call_id"].as_str())
                .collect();
            expected.sort_unstable();
            answered.sort_unstable();
            assert_eq!(expected, answered, "unpaired tool calls at message {}", i);
            i += calls.len();
        } else {
            assert_ne!(msg["role"], "tool", "orphan tool result at message {}", i);
        }
        i += 1;
    }
}

fn texts(sent: &[Value]) -> Vec<String> {
    sent.iter()
        .filter_map(|m| m["text"]["body"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_free_text_runs_tool_then_replies() {
    let gw = TestGateway::start().await;
    mount_catalog(&gw.backends).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_tool_call(
            "call_lunch",
            "get_store_products",
            &json!({"limit": 3}),
        )))
        .up_to_n_times(1)
        .mount(&gw.backends.llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_text("Try our Chicken Rice, only SGD 3.50!")),
        )
        .mount(&gw.backends.llm)
        .await;

    gw.deliver(&text_message("wamid.llm1", CUSTOMER, "anything good for lunch?"))
        .await;

    let requests = gw.backends.llm_requests().await;
    assert_eq!(requests.len(), 2);

    let tools: Vec<&str> = requests[0]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["function"]["name"].as_str())
        .collect();
    assert_eq!(tools.len(), 7);
    assert!(tools.contains(&"get_store_products"));
    assert_eq!(requests[0]["model"], "gpt-test");

    let messages = requests[1]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_tool_calls_paired(messages);
    let result = messages
        .iter()
        .find(|m| m["tool_call_id"] == "call_lunch")
        .expect("tool result for call_lunch");
    assert!(result["content"].as_str().unwrap().contains("Chicken Rice"));

    let sent = gw.backends.sent_to(CUSTOMER).await;
    assert_eq!(texts(&sent), vec!["Try our Chicken Rice, only SGD 3.50!"]);
}

#[tokio::test]
async fn test_endless_tool_calls_stop_at_iteration_limit() {
    let gw = TestGateway::start().await;
    mount_catalog(&gw.backends).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_tool_call(
            "call_again",
            "get_store_products",
            &json!({}),
        )))
        .mount(&gw.backends.llm)
        .await;

    gw.deliver(&text_message("wamid.llm2", CUSTOMER, "tell me everything"))
        .await;

    let requests = gw.backends.llm_requests().await;
    assert_eq!(requests.len(), gw.config.agent.max_iterations);
    for request in &requests {
        assert_tool_calls_paired(request["messages"].as_array().unwrap());
    }
    let sent = gw.backends.sent_to(CUSTOMER).await;
    assert_eq!(texts(&sent), vec![FALLBACK_TEXT]);
}

#[tokio::test]
async fn test_model_error_sends_fallback() {
    let gw = TestGateway::start().await;
    mount_catalog(&gw.backends).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "invalid request", "type": "invalid_request_error"}
        })))
        .mount(&gw.backends.llm)
        .await;

    gw.deliver(&text_message("wamid.llm3", CUSTOMER, "hello there"))
        .await;

    assert!(!gw.backends.llm_requests().await.is_empty());
    let sent = gw.backends.sent_to(CUSTOMER).await;
    assert_eq!(texts(&sent), vec![FALLBACK_TEXT]);
}

#[tokio::test]
async fn test_follow_up_turn_carries_transcript() {
    let gw = TestGateway::start().await;
    mount_catalog(&gw.backends).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_text("Sure thing.")))
        .mount(&gw.backends.llm)
        .await;

    gw.deliver(&text_message("wamid.llm4", CUSTOMER, "is the laksa spicy?"))
        .await;
    gw.deliver(&text_message("wamid.llm5", CUSTOMER, "and is it halal?"))
        .await;

    let requests = gw.backends.llm_requests().await;
    assert_eq!(requests.len(), 2);
    let second: Vec<String> = requests[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "user")
        .filter_map(|m| m["content"].as_str().map(str::to_string))
        .collect();
    assert_eq!(second, vec!["is the laksa spicy?", "and is it halal?"]);
}
