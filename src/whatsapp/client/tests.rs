use super::*;
use crate::errors::ErrorKind;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn creds() -> WhatsAppCredentials {
    WhatsAppCredentials {
        access_token: "EAAG-token".into(),
        phone_number_id: "PN1".into(),
        app_secret: "secret".into(),
        verify_token: "verify".into(),
    }
}

fn client(server: &MockServer) -> CloudApiClient {
    CloudApiClient::new(&TransportConfig {
        base_url: server.uri(),
        ..TransportConfig::default()
    })
}

#[tokio::test]
async fn test_send_returns_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v21.0/PN1/messages"))
        .and(header("authorization", "Bearer EAAG-token"))
        .and(body_partial_json(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": "6591234567",
            "type": "text",
            "text": {"body": "hello"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messaging_product": "whatsapp",
            "messages": [{"id": "wamid.OUT1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server)
        .send(&creds(), "6591234567", &OutboundItem::text("hello"))
        .await
        .unwrap();
    assert_eq!(id, "wamid.OUT1");
}

#[tokio::test]
async fn test_send_4xx_is_permanent_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "(#131009) Parameter value is not valid", "code": 131_009}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&creds(), "65", &OutboundItem::text("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermanentExternal);
    assert!(err.to_string().contains("Parameter value is not valid"));
}

#[tokio::test]
async fn test_send_5xx_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&creds(), "65", &OutboundItem::text("x"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_error_detail_prefers_graph_message() {
    assert_eq!(
        error_detail(r#"{"error":{"message":"Invalid parameter"}}"#),
        "Invalid parameter"
    );
    assert_eq!(error_detail("plain"), "plain");
}
