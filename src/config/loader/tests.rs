use super::*;
use std::io::Write;

#[test]
fn test_parse_empty_object_uses_defaults() {
    let config = parse_config("{}").unwrap();
    assert_eq!(config.session.ttl_hours, 1);
    assert_eq!(config.agent.max_iterations, 4);
    assert_eq!(config.transport.api_version, "v21.0");
    assert!(config.tenants.is_empty());
}

#[test]
fn test_parse_rejects_invalid_json() {
    assert!(parse_config("{not json").is_err());
}

#[test]
fn test_migrate_transcript_bound() {
    let config = parse_config(r#"{"session": {"transcriptBound": 6}}"#).unwrap();
    assert_eq!(config.session.max_user_turns, 6);
    assert_eq!(config.session.max_assistant_turns, 6);
}

#[test]
fn test_migrate_keeps_explicit_limits() {
    let config = parse_config(
        r#"{"session": {"transcriptBound": 6, "maxAssistantTurns": 3}}"#,
    )
    .unwrap();
    assert_eq!(config.session.max_user_turns, 6);
    assert_eq!(config.session.max_assistant_turns, 3);
}

#[test]
fn test_parse_tenants_section() {
    let config = parse_config(
        r#"{
            "tenants": [{
                "tenantId": "kopi",
                "kind": "pos",
                "whatsapp": {"accessToken": "a", "phoneNumberId": "111", "appSecret": "s"},
                "store": {"storeId": "s1", "todaysOffer": true}
            }]
        }"#,
    )
    .unwrap();
    assert_eq!(config.tenants.len(), 1);
    assert!(config.tenants[0].store.todays_offer);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"gateway": {{"port": 9000}}, "dedup": {{"windowHours": 48}}}}"#
    )
    .unwrap();
    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.dedup.window_hours, 48);
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"dedup": {{"windowHours": 1}}}}"#).unwrap();
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(format!("{:#}", err).contains("windowHours"));
}

#[test]
fn test_load_missing_file_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(Some(&dir.path().join("absent.json"))).unwrap();
    assert_eq!(config.gateway.port, 8080);
}
