use super::*;

#[test]
fn test_ingress_errors_map_to_4xx() {
    assert_eq!(
        WahubError::InvalidSignature.status_code(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        WahubError::MissingSignature.status_code(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        WahubError::MalformedPayload("bad".into()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        WahubError::MissingPhoneNumberId.status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        WahubError::UnknownTenant("123".into()).status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(WahubError::InvalidSignature.kind(), ErrorKind::Ingress);
}

#[test]
fn test_config_errors_map_to_5xx() {
    let err = WahubError::TenantNotConfigured("t1".into());
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!err.is_retryable());
}

#[test]
fn test_transient_is_retryable() {
    assert!(WahubError::transient("pos", "timeout").is_retryable());
    assert!(WahubError::RateLimit { retry_after: None }.is_retryable());
    assert!(!WahubError::permanent("pos", 400, "bad order").is_retryable());
    assert!(!WahubError::Internal(anyhow::anyhow!("boom")).is_retryable());
}

#[test]
fn test_permanent_detail_truncated() {
    let long = "x".repeat(5000);
    match WahubError::permanent("pos", 422, &long) {
        WahubError::Permanent { detail, status, .. } => {
            assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS);
            assert_eq!(status, 422);
        }
        other => panic!("expected Permanent, got {:?}", other),
    }
}

#[test]
fn test_truncate_detail_respects_char_boundaries() {
    let long = "é".repeat(2000);
    let out = truncate_detail(&long);
    assert_eq!(out.chars().count(), MAX_DETAIL_CHARS);
}

#[test]
fn test_kind_of_downcasts_anyhow() {
    let err: anyhow::Error = WahubError::transient("openai", "502").into();
    assert_eq!(kind_of(&err), ErrorKind::TransientExternal);
    let plain = anyhow::anyhow!("something else");
    assert_eq!(kind_of(&plain), ErrorKind::Internal);
}

#[test]
fn test_from_status_classification() {
    assert!(matches!(
        WahubError::from_status("pos", 429, Some(3), ""),
        WahubError::RateLimit {
            retry_after: Some(3)
        }
    ));
    assert_eq!(
        WahubError::from_status("pos", 401, None, "").kind(),
        ErrorKind::Config
    );
    assert_eq!(
        WahubError::from_status("pos", 422, None, "invalid order").kind(),
        ErrorKind::PermanentExternal
    );
    assert!(WahubError::from_status("pos", 502, None, "x").is_retryable());
}
