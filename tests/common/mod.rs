// Shared test helpers; not every test binary uses every item.
#![allow(unused)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wahub::config::{Config, parse_config};
use wahub::dispatch::Dispatcher;
use wahub::gateway::{GatewayState, build_router};
use wahub::storage::Database;
use wahub::whatsapp::sign_body;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PHONE_ID: &str = "phone-1";
pub const APP_SECRET: &str = "app-secret";
pub const STORE_ID: &str = "store-1";
pub const CUSTOMER: &str = "6591234567";
pub const OWNER: &str = "6590000000";
pub const GRAPH_MESSAGES: &str = "/v21.0/phone-1/messages";

/// Mock HTTP collaborators: Graph API, POS service and the LLM endpoint.
pub struct Backends {
    pub graph: MockServer,
    pub pos: MockServer,
    pub llm: MockServer,
}

impl Backends {
    pub async fn start() -> Self {
        let graph = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GRAPH_MESSAGES))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": CUSTOMER, "wa_id": CUSTOMER}],
                "messages": [{"id": "wamid.outbound"}]
            })))
            .mount(&graph)
            .await;
        Self {
            graph,
            pos: MockServer::start().await,
            llm: MockServer::start().await,
        }
    }

    /// Bodies of every outbound message, in send order.
    pub async fn sent_messages(&self) -> Vec<Value> {
        bodies(&self.graph, "POST", GRAPH_MESSAGES).await
    }

    pub async fn sent_to(&self, user: &str) -> Vec<Value> {
        self.sent_messages()
            .await
            .into_iter()
            .filter(|m| m["to"] == user)
            .collect()
    }

    /// Bodies of every chat completion request.
    pub async fn llm_requests(&self) -> Vec<Value> {
        bodies(&self.llm, "POST", "/chat/completions").await
    }

    pub async fn pos_requests(&self, verb: &str, route: &str) -> Vec<Value> {
        bodies(&self.pos, verb, route).await
    }

    pub async fn pos_request_count(&self) -> usize {
        self.pos
            .received_requests()
            .await
            .map_or(0, |r| r.len())
    }
}

async fn bodies(server: &MockServer, verb: &str, route: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}

pub fn product(id: &str, name: &str, price: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("House special {}", name.to_lowercase()),
        "price": price,
        "currency": "SGD",
        "imageUrl": format!("https://img.example/{}.jpg", id.to_lowercase()),
        "category": "mains",
        "stock": 20
    })
}

pub fn catalog() -> Vec<Value> {
    vec![
        product("P1", "Chicken Rice", "3.50"),
        product("P2", "Chicken Wings", "6.00"),
        product("P3", "Laksa", "5.80"),
        product("P4", "Teh Tarik", "1.90"),
    ]
}

pub async fn mount_catalog(backends: &Backends) {
    Mock::given(method("GET"))
        .and(path(format!("/stores/{}/products", STORE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "products": catalog() })))
        .mount(&backends.pos)
        .await;
}

pub fn chat_text(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-test",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132}
    })
}

pub fn chat_tool_call(call_id: &str, name: &str, arguments: &Value) -> Value {
    json!({
        "id": "chatcmpl-2",
        "object": "chat.completion",
        "model": "gpt-test",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": call_id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 20, "total_tokens": 140}
    })
}

pub fn tenant_json(backends: &Backends) -> Value {
    json!({
        "tenantId": "kopi-1",
        "kind": "pos",
        "displayName": "Hawker Heaven",
        "whatsapp": {
            "accessToken": "graph-token",
            "phoneNumberId": PHONE_ID,
            "appSecret": APP_SECRET,
            "verifyToken": "verify-me"
        },
        "llm": {"apiKey": "sk-test", "model": "gpt-test", "baseUrl": backends.llm.uri()},
        "ownerContact": "+65 9000 0000",
        "store": {"storeId": STORE_ID, "currency": "SGD"}
    })
}

pub fn config_json(backends: &Backends, dir: &TempDir) -> Value {
    json!({
        "dedup": {"durable": true},
        "agent": {"loopBudgetSecs": 20, "llmTimeoutSecs": 5, "toolTimeoutSecs": 5},
        "transport": {
            "baseUrl": backends.graph.uri(),
            "apiVersion": "v21.0",
            "pacingMs": 0,
            "retryDelayMs": 1
        },
        "services": {"posBaseUrl": backends.pos.uri(), "posTimeoutSecs": 5},
        "storage": {"dbPath": dir.path().join("wahub.db")},
        "tenants": [tenant_json(backends)]
    })
}

/// The production stack wired against the mock backends and a SQLite file
/// in a temp dir.
pub struct TestGateway {
    pub state: GatewayState,
    pub dispatcher: Arc<Dispatcher>,
    pub backends: Backends,
    pub config: Config,
    pub dir: TempDir,
}

impl TestGateway {
    pub async fn start() -> Self {
        let backends = Backends::start().await;
        let dir = TempDir::new().expect("create temp dir");
        Self::start_with(backends, dir).await
    }

    /// Build on existing backends and database, e.g. to simulate a restart.
    pub async fn start_with(backends: Backends, dir: TempDir) -> Self {
        let config = parse_config(&config_json(&backends, &dir).to_string()).expect("parse config");
        let db = Arc::new(
            Database::open(dir.path().join("wahub.db")).expect("open database"),
        );
        let (state, dispatcher) = wahub::cli::build_gateway(&config, &db)
            .await
            .expect("build gateway");
        Self {
            state,
            dispatcher,
            backends,
            config,
            dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn request(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router().oneshot(req).await.expect("router response");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// POST a signed delivery and wait for the turn it spawns.
    pub async fn deliver(&self, envelope: &Value) -> StatusCode {
        let body = serde_json::to_vec(envelope).expect("encode envelope");
        let signature = sign_body(APP_SECRET, &body);
        let (status, _) = self.request(webhook_post(body, Some(&signature))).await;
        self.settle().await;
        status
    }

    pub async fn settle(&self) {
        assert!(
            self.state.drain(Duration::from_secs(10)).await,
            "background turns did not finish"
        );
    }
}

pub fn webhook_post(body: Vec<u8>, signature: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        req = req.header("X-Hub-Signature-256", signature);
    }
    req.body(Body::from(body)).expect("build request")
}

fn envelope(from: &str, message: Value) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "6560000000", "phone_number_id": PHONE_ID},
                    "contacts": [{"wa_id": from, "profile": {"name": "Mei"}}],
                    "messages": [message]
                }
            }]
        }]
    })
}

pub fn text_message(message_id: &str, from: &str, body: &str) -> Value {
    envelope(
        from,
        json!({
            "from": from,
            "id": message_id,
            "timestamp": "1760000000",
            "type": "text",
            "text": {"body": body}
        }),
    )
}

pub fn button_reply(message_id: &str, from: &str, action_id: &str, title: &str) -> Value {
    envelope(
        from,
        json!({
            "from": from,
            "id": message_id,
            "timestamp": "1760000000",
            "type": "interactive",
            "interactive": {
                "type": "button_reply",
                "button_reply": {"id": action_id, "title": title}
            }
        }),
    )
}

pub fn list_reply(message_id: &str, from: &str, action_id: &str, title: &str) -> Value {
    envelope(
        from,
        json!({
            "from": from,
            "id": message_id,
            "timestamp": "1760000000",
            "type": "interactive",
            "interactive": {
                "type": "list_reply",
                "list_reply": {"id": action_id, "title": title}
            }
        }),
    )
}

/// Button titles of an interactive button message.
pub fn button_titles(message: &Value) -> Vec<String> {
    message["interactive"]["action"]["buttons"]
        .as_array()
        .map(|buttons| {
            buttons
                .iter()
                .filter_map(|b| b["reply"]["title"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
