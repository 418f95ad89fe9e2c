use super::*;
use crate::errors::WahubError;
use crate::tenants::TenantKind;

#[test]
fn test_default_config_validates() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.session.ttl_hours, 1);
    assert_eq!(config.session.max_user_turns, 10);
    assert_eq!(config.session.max_assistant_turns, 10);
    assert_eq!(config.dedup.window_hours, 24);
    assert_eq!(config.agent.max_iterations, 4);
    assert_eq!(config.agent.loop_budget(), Duration::from_secs(60));
    assert_eq!(config.agent.tool_timeout(), Duration::from_secs(15));
    assert_eq!(config.transport.base_url, "https://graph.facebook.com");
    assert_eq!(config.services.default_region, "sg");
}

#[test]
fn test_invalid_zero_port() {
    let mut config = Config::default();
    config.gateway.port = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_test_webhook_requires_admin_token() {
    let mut config = Config::default();
    config.gateway.test_webhook.enabled = true;
    assert!(config.validate().is_err());
    config.gateway.test_webhook.admin_token = "admin".into();
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_zero_session_bounds() {
    let mut config = Config::default();
    config.session.max_user_turns = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.session.ttl_hours = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_session_ttl_upper_bound() {
    let mut config = Config::default();
    config.session.ttl_hours = MAX_RETENTION_HOURS;
    assert!(config.validate().is_ok());
    config.session.ttl_hours = u64::MAX;
    assert!(matches!(config.validate(), Err(WahubError::Config(_))));

    let mut config = Config::default();
    config.dedup.window_hours = MAX_RETENTION_HOURS + 1;
    assert!(config.validate().is_err());
}

#[test]
fn test_tenant_session_ttl_override_bounded() {
    let mut config = Config::default();
    let mut t = TenantConfig::sample("a", TenantKind::Pos);
    t.session.ttl_hours = Some(u64::MAX);
    config.tenants = vec![t.clone()];
    assert!(config.validate().is_err());

    t.session.ttl_hours = Some(0);
    assert!(t.validate().is_err());
    t.session.ttl_hours = Some(48);
    assert!(t.validate().is_ok());
}

#[test]
fn test_dedup_window_must_cover_a_day() {
    let mut config = Config::default();
    config.dedup.window_hours = 23;
    let err = config.validate().unwrap_err();
    assert!(matches!(err, WahubError::Config(_)));
}

#[test]
fn test_invalid_iterations() {
    let mut config = Config::default();
    config.agent.max_iterations = 0;
    assert!(config.validate().is_err());
    config.agent.max_iterations = 33;
    assert!(config.validate().is_err());
}

#[test]
fn test_loop_budget_shorter_than_llm_timeout() {
    let mut config = Config::default();
    config.agent.loop_budget_secs = 10;
    config.agent.llm_timeout_secs = 30;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_zero_tool_timeout() {
    let mut config = Config::default();
    config.agent.tool_timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_empty_api_version() {
    let mut config = Config::default();
    config.transport.api_version.clear();
    assert!(config.validate().is_err());
}

#[test]
fn test_duplicate_phone_ids_rejected() {
    let mut config = Config::default();
    let a = TenantConfig::sample("a", TenantKind::Pos);
    let mut b = TenantConfig::sample("b", TenantKind::Deals);
    b.whatsapp.phone_number_id = a.whatsapp.phone_number_id.clone();
    config.tenants = vec![a, b];
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_tenant_rejected() {
    let mut config = Config::default();
    let mut t = TenantConfig::sample("a", TenantKind::Pos);
    t.store.store_id.clear();
    config.tenants = vec![t];
    assert!(config.validate().is_err());
}

#[test]
fn test_gateway_debug_redacts_tokens() {
    let mut config = Config::default();
    config.gateway.verify_token = "super-secret-verify".into();
    config.gateway.callback_token = "super-secret-callback".into();
    let out = format!("{:?}", config.gateway);
    assert!(!out.contains("super-secret"));
    assert!(out.contains("[REDACTED]"));
}

#[test]
fn test_camel_case_keys() {
    let config: Config = serde_json::from_value(serde_json::json!({
        "gateway": {"maxBodyBytes": 2048, "testWebhook": {"enabled": true, "adminToken": "x"}},
        "agent": {"loopBudgetSecs": 90, "toolTimeoutSecs": 5},
        "tenantCache": {"ttlSecs": 10}
    }))
    .unwrap();
    assert_eq!(config.gateway.max_body_bytes, 2048);
    assert!(config.gateway.test_webhook.enabled);
    assert_eq!(config.agent.loop_budget_secs, 90);
    assert_eq!(config.agent.tool_timeout_secs, 5);
    assert_eq!(config.tenant_cache.ttl_secs, 10);
}
