//! WhatsApp Cloud API transport adapter: handshake, signed inbound parsing,
//! outbound rendering and delivery.

pub mod client;
pub mod inbound;
pub mod message;

pub use client::{CloudApiClient, Transport};
pub use inbound::{
    InboundKind, MediaRef, NormalizedInbound, envelope_phone_id, parse_envelope,
    validate_and_parse,
};
pub use message::{
    Button, InteractiveHeader, ListRow, ListSection, MAX_BODY_CHARS, MediaSource, OutboundItem,
};

use crate::errors::WahubError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature (`sha256=<hex>`).
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Query parameters of the GET subscription handshake.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HandshakeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Return the challenge when `mode == "subscribe"` and the token was accepted.
pub fn verify_handshake(query: &HandshakeQuery, token_accepted: bool) -> Result<String, WahubError> {
    match (query.mode.as_deref(), query.challenge.as_deref()) {
        (Some("subscribe"), Some(challenge)) if token_accepted => Ok(challenge.to_string()),
        _ => Err(WahubError::UnauthorizedVerification),
    }
}

/// HMAC-SHA256 of the exact body keyed by the app secret, compared in
/// constant time against the hex signature (with or without `sha256=`).
pub fn validate_signature(app_secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    let sig = signature.trim();
    let sig = sig.strip_prefix("sha256=").unwrap_or(sig);
    expected.as_bytes().ct_eq(sig.to_ascii_lowercase().as_bytes()).into()
}

/// Compute the header value for `body`. Used by tests and local tooling.
pub fn sign_body(app_secret: &str, body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
