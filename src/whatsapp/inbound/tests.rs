use super::*;
use crate::whatsapp::sign_body;
use serde_json::{Value, json};

fn envelope(message: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "6560000000", "phone_number_id": "PN1"},
                    "contacts": [{"wa_id": "6591234567", "profile": {"name": "Mei Ling"}}],
                    "messages": [message]
                }
            }]
        }]
    }))
    .unwrap()
}

#[test]
fn test_parse_text_message() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.A", "timestamp": "1717000000",
        "type": "text", "text": {"body": "products"}
    }));
    let events = parse_envelope(&body).unwrap();
    assert_eq!(events.len(), 1);
    let e = &events[0];
    assert_eq!(e.tenant_phone_id, "PN1");
    assert_eq!(e.from, "6591234567");
    assert_eq!(e.message_id, "wamid.A");
    assert_eq!(e.timestamp, Some(1_717_000_000));
    assert_eq!(e.profile_name.as_deref(), Some("Mei Ling"));
    assert_eq!(e.text(), Some("products"));
}

#[test]
fn test_parse_button_reply() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.B", "type": "interactive",
        "interactive": {"type": "button_reply", "button_reply": {"id": "buy_product_P1", "title": "Buy Now"}}
    }));
    let events = parse_envelope(&body).unwrap();
    assert_eq!(events[0].action_id(), Some("buy_product_P1"));
    assert_eq!(events[0].kind.raw_type(), "interactive");
}

#[test]
fn test_parse_list_reply() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.C", "type": "interactive",
        "interactive": {"type": "list_reply", "list_reply": {"id": "update_quantity_O1_P1_3", "title": "3"}}
    }));
    let events = parse_envelope(&body).unwrap();
    assert_eq!(events[0].action_id(), Some("update_quantity_O1_P1_3"));
}

#[test]
fn test_parse_template_quick_reply_button() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.T", "type": "button",
        "button": {"payload": "todays_offer", "text": "See offer"}
    }));
    let events = parse_envelope(&body).unwrap();
    assert_eq!(events[0].action_id(), Some("todays_offer"));
}

#[test]
fn test_parse_location_and_media() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.L", "type": "location",
        "location": {"latitude": 1.3, "longitude": 103.8, "name": "Tiong Bahru"}
    }));
    let events = parse_envelope(&body).unwrap();
    assert!(matches!(events[0].kind, InboundKind::Location { latitude, .. } if (latitude - 1.3).abs() < 1e-9));

    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.I", "type": "image",
        "image": {"id": "MEDIA1", "mime_type": "image/jpeg", "caption": "our laksa"}
    }));
    let events = parse_envelope(&body).unwrap();
    match &events[0].kind {
        InboundKind::Image(m) => {
            assert_eq!(m.id, "MEDIA1");
            assert_eq!(m.caption.as_deref(), Some("our laksa"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(events[0].transcript_text(), "[image] our laksa");
}

#[test]
fn test_unknown_type_is_preserved() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.R", "type": "reaction",
        "reaction": {"emoji": "👍"}
    }));
    let events = parse_envelope(&body).unwrap();
    assert_eq!(
        events[0].kind,
        InboundKind::Unknown {
            raw_type: "reaction".into()
        }
    );
}

#[test]
fn test_status_callback_yields_no_messages() {
    let body = serde_json::to_vec(&json!({
        "entry": [{"changes": [{"value": {
            "metadata": {"phone_number_id": "PN1"},
            "statuses": [{"id": "wamid.X", "status": "delivered"}]
        }}]}]
    }))
    .unwrap();
    assert!(parse_envelope(&body).unwrap().is_empty());
    assert_eq!(envelope_phone_id(&body).unwrap(), "PN1");
}

#[test]
fn test_missing_phone_number_id() {
    let body = br#"{"entry":[{"changes":[{"value":{"messages":[]}}]}]}"#;
    assert!(matches!(
        envelope_phone_id(body),
        Err(WahubError::MissingPhoneNumberId)
    ));
}

#[test]
fn test_malformed_json() {
    assert!(matches!(
        parse_envelope(b"{nope"),
        Err(WahubError::MalformedPayload(_))
    ));
}

#[test]
fn test_text_message_without_text_object_is_malformed() {
    let body = envelope(json!({"from": "1", "id": "wamid.Z", "type": "text"}));
    assert!(matches!(
        parse_envelope(&body),
        Err(WahubError::MalformedPayload(_))
    ));
}

#[test]
fn test_validate_and_parse_signature_paths() {
    let body = envelope(json!({
        "from": "6591234567", "id": "wamid.S", "type": "text", "text": {"body": "hi"}
    }));
    let sig = sign_body("secret", &body);
    assert_eq!(
        validate_and_parse(&body, Some(&sig), "secret", false)
            .unwrap()
            .len(),
        1
    );
    assert!(matches!(
        validate_and_parse(&body, Some(&sig), "other", false),
        Err(WahubError::InvalidSignature)
    ));
    assert!(matches!(
        validate_and_parse(&body, None, "secret", false),
        Err(WahubError::MissingSignature)
    ));
    assert!(validate_and_parse(&body, None, "secret", true).is_ok());
    assert!(matches!(
        validate_and_parse(&body, Some("sha256=00"), "secret", true),
        Err(WahubError::InvalidSignature)
    ));
}
