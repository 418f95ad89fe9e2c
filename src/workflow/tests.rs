use super::*;
use crate::storage::Database;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(deal_id: &str) -> DealPayload {
    DealPayload {
        deal_id: deal_id.to_string(),
        tenant_id: "viral".to_string(),
        submitted_by: "6591234567".to_string(),
        restaurant_name: "Hawker Heaven".to_string(),
        place_id: Some("ChIJ1".to_string()),
        address: None,
        description: "1-for-1 laksa".to_string(),
        pricing: "$5".to_string(),
        validity: "until Sunday".to_string(),
        photo_media_id: None,
        audience: "students".to_string(),
        contact: "6591234567".to_string(),
        special_notes: None,
        marketing_copy: "Slurp it up!".to_string(),
        callback_url: Some("https://bot.example/api/n8n/status".to_string()),
    }
}

fn store() -> DealSubmissions {
    DealSubmissions::new(Arc::new(Database::open_in_memory().unwrap()))
}

#[tokio::test]
async fn test_submit_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "dealId": "D1",
            "restaurantName": "Hawker Heaven",
            "marketingCopy": "Slurp it up!"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let runner = HttpWorkflowRunner::new();
    runner
        .submit(&format!("{}/hook", server.uri()), &payload("D1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_submit_without_url_is_config_error() {
    let runner = HttpWorkflowRunner::new();
    let err = runner.submit("", &payload("D1")).await.unwrap_err();
    assert!(matches!(err, WahubError::Config(_)));
}

#[tokio::test]
async fn test_submit_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let runner = HttpWorkflowRunner::new();
    let err = runner.submit(&server.uri(), &payload("D1")).await.unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_save_and_get_roundtrip() {
    let deals = store();
    deals.save(&DealSubmission::new(payload("D1"))).unwrap();
    let got = deals.get("D1").unwrap().unwrap();
    assert_eq!(got.payload, payload("D1"));
    assert_eq!(got.status, DealSubmission::STATUS_SUBMITTED);
    assert!(deals.get("missing").unwrap().is_none());
}

#[test]
fn test_apply_callback_updates_platforms() {
    let deals = store();
    deals.save(&DealSubmission::new(payload("D1"))).unwrap();
    let updated = deals
        .apply_callback(&StatusCallback {
            deal_id: "D1".into(),
            status: "published".into(),
            platforms_posted: vec!["instagram".into(), "tiktok".into()],
            platforms_failed: vec!["facebook".into()],
        })
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, "published");

    let stored = deals.get("D1").unwrap().unwrap();
    assert_eq!(stored.platforms_posted, vec!["instagram", "tiktok"]);
    assert_eq!(stored.platforms_failed, vec!["facebook"]);

    let summary = stored.status_summary();
    assert!(summary.contains("Hawker Heaven"));
    assert!(summary.contains("instagram, tiktok"));
    assert!(summary.contains("facebook"));
}

#[test]
fn test_apply_callback_unknown_deal() {
    let deals = store();
    let out = deals
        .apply_callback(&StatusCallback {
            deal_id: "nope".into(),
            status: "published".into(),
            platforms_posted: vec![],
            platforms_failed: vec![],
        })
        .unwrap();
    assert!(out.is_none());
}

#[test]
fn test_status_callback_accepts_missing_platforms() {
    let cb: StatusCallback =
        serde_json::from_str(r#"{"dealId":"D9","status":"failed"}"#).unwrap();
    assert!(cb.platforms_posted.is_empty());
    assert!(cb.platforms_failed.is_empty());
}

#[test]
fn test_webhook_url_prefers_tenant_override() {
    let config = ServicesConfig {
        workflow_webhook_url: "https://global/hook".into(),
        callback_base_url: "https://bot.example/".into(),
        ..ServicesConfig::default()
    };
    assert_eq!(webhook_url_for(Some("https://t/hook"), &config), "https://t/hook");
    assert_eq!(webhook_url_for(Some(""), &config), "https://global/hook");
    assert_eq!(webhook_url_for(None, &config), "https://global/hook");
    assert_eq!(
        callback_url(&config).as_deref(),
        Some("https://bot.example/api/n8n/status")
    );
}
