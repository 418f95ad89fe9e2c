use crate::errors::WahubError;
use crate::whatsapp::validate_signature;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Default)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize, Default)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize, Default)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Deserialize, Default)]
struct ChangeValue {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct Contact {
    #[serde(default)]
    wa_id: String,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    from: String,
    id: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<RawText>,
    #[serde(default)]
    interactive: Option<RawInteractive>,
    #[serde(default)]
    button: Option<RawTemplateButton>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    image: Option<RawMedia>,
    #[serde(default)]
    audio: Option<RawMedia>,
    #[serde(default)]
    document: Option<RawMedia>,
    #[serde(default)]
    video: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct RawInteractive {
    #[serde(default)]
    button_reply: Option<RawReply>,
    #[serde(default)]
    list_reply: Option<RawReply>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct RawTemplateButton {
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default)]
    id: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// Media attached to an inbound message; `id` is resolved via the Cloud API.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub id: String,
    pub mime_type: Option<String>,
    pub caption: Option<String>,
    pub filename: Option<String>,
}

impl From<RawMedia> for MediaRef {
    fn from(raw: RawMedia) -> Self {
        Self {
            id: raw.id,
            mime_type: raw.mime_type,
            caption: raw.caption,
            filename: raw.filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    Text {
        body: String,
    },
    /// Button or list reply; `action_id` is the first non-empty of
    /// `button_reply.id`, `list_reply.id`.
    Interactive {
        action_id: String,
        title: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    Image(MediaRef),
    Audio(MediaRef),
    Document(MediaRef),
    Video(MediaRef),
    Unknown {
        raw_type: String,
    },
}

impl InboundKind {
    pub fn raw_type(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Interactive { .. } => "interactive",
            Self::Location { .. } => "location",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
            Self::Document(_) => "document",
            Self::Video(_) => "video",
            Self::Unknown { raw_type } => raw_type,
        }
    }
}

/// One inbound message in transport-independent form.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInbound {
    pub tenant_phone_id: String,
    pub from: String,
    pub message_id: String,
    pub timestamp: Option<i64>,
    pub profile_name: Option<String>,
    pub kind: InboundKind,
}

impl NormalizedInbound {
    /// Text recorded in the user turn.
    pub fn transcript_text(&self) -> String {
        match &self.kind {
            InboundKind::Text { body } => body.clone(),
            InboundKind::Interactive { action_id, title } => {
                if title.is_empty() {
                    format!("[selected {}]", action_id)
                } else {
                    format!("[selected {}] {}", action_id, title)
                }
            }
            InboundKind::Location {
                latitude,
                longitude,
                name,
                ..
            } => match name {
                Some(name) => format!("[location {:.5},{:.5}] {}", latitude, longitude, name),
                None => format!("[location {:.5},{:.5}]", latitude, longitude),
            },
            InboundKind::Image(m)
            | InboundKind::Audio(m)
            | InboundKind::Document(m)
            | InboundKind::Video(m) => match &m.caption {
                Some(caption) => format!("[{}] {}", self.kind.raw_type(), caption),
                None => format!("[{}]", self.kind.raw_type()),
            },
            InboundKind::Unknown { raw_type } => format!("[unsupported {}]", raw_type),
        }
    }

    pub fn action_id(&self) -> Option<&str> {
        match &self.kind {
            InboundKind::Interactive { action_id, .. } => Some(action_id),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            InboundKind::Text { body } => Some(body),
            _ => None,
        }
    }
}

fn decode(body: &[u8]) -> Result<Envelope, WahubError> {
    serde_json::from_slice(body).map_err(|e| WahubError::MalformedPayload(e.to_string()))
}

/// Business phone number id of the first change carrying metadata.
pub fn envelope_phone_id(body: &[u8]) -> Result<String, WahubError> {
    let envelope = decode(body)?;
    envelope
        .entry
        .iter()
        .flat_map(|e| &e.changes)
        .filter_map(|c| c.value.metadata.as_ref())
        .map(|m| m.phone_number_id.trim())
        .find(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(WahubError::MissingPhoneNumberId)
}

/// Normalize every message in the envelope. Status-only callbacks yield an
/// empty list.
pub fn parse_envelope(body: &[u8]) -> Result<Vec<NormalizedInbound>, WahubError> {
    let envelope = decode(body)?;
    let mut out = Vec::new();
    for change in envelope.entry.into_iter().flat_map(|e| e.changes) {
        let value = change.value;
        let Some(phone_id) = value
            .metadata
            .as_ref()
            .map(|m| m.phone_number_id.trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            return Err(WahubError::MissingPhoneNumberId);
        };
        for message in value.messages {
            let profile_name = value
                .contacts
                .iter()
                .find(|c| c.wa_id == message.from)
                .or(value.contacts.first())
                .and_then(|c| c.profile.as_ref())
                .map(|p| p.name.clone())
                .filter(|n| !n.is_empty());
            out.push(normalize(&phone_id, message, profile_name)?);
        }
    }
    debug!("parsed {} inbound message(s)", out.len());
    Ok(out)
}

fn normalize(
    phone_id: &str,
    message: RawMessage,
    profile_name: Option<String>,
) -> Result<NormalizedInbound, WahubError> {
    if message.from.trim().is_empty() || message.id.trim().is_empty() {
        return Err(WahubError::MalformedPayload(
            "message without sender or id".into(),
        ));
    }
    let timestamp = message.timestamp.as_deref().and_then(|t| t.parse().ok());
    let missing = |field: &str| WahubError::MalformedPayload(format!("{} message without {} object", message.kind, field));

    let kind = match message.kind.as_str() {
        "text" => InboundKind::Text {
            body: message.text.ok_or_else(|| missing("text"))?.body,
        },
        "interactive" => {
            let interactive = message.interactive.ok_or_else(|| missing("interactive"))?;
            let reply = [interactive.button_reply, interactive.list_reply]
                .into_iter()
                .flatten()
                .find(|r| r.id.as_deref().is_some_and(|id| !id.is_empty()));
            match reply {
                Some(reply) => InboundKind::Interactive {
                    action_id: reply.id.unwrap_or_default(),
                    title: reply.title,
                },
                None => InboundKind::Unknown {
                    raw_type: "interactive".into(),
                },
            }
        }
        "button" => {
            let button = message.button.ok_or_else(|| missing("button"))?;
            InboundKind::Interactive {
                action_id: button.payload.unwrap_or_else(|| button.text.clone()),
                title: button.text,
            }
        }
        "location" => {
            let loc = message.location.ok_or_else(|| missing("location"))?;
            InboundKind::Location {
                latitude: loc.latitude,
                longitude: loc.longitude,
                name: loc.name,
                address: loc.address,
            }
        }
        "image" => InboundKind::Image(message.image.ok_or_else(|| missing("image"))?.into()),
        "audio" | "voice" => {
            InboundKind::Audio(message.audio.ok_or_else(|| missing("audio"))?.into())
        }
        "document" => {
            InboundKind::Document(message.document.ok_or_else(|| missing("document"))?.into())
        }
        "video" => InboundKind::Video(message.video.ok_or_else(|| missing("video"))?.into()),
        other => InboundKind::Unknown {
            raw_type: if other.is_empty() { "unknown".into() } else { other.to_string() },
        },
    };

    Ok(NormalizedInbound {
        tenant_phone_id: phone_id.to_string(),
        from: message.from,
        message_id: message.id,
        timestamp,
        profile_name,
        kind,
    })
}

/// Verify the signature over the exact body, then normalize.
///
/// A missing header is accepted only when `allow_unsigned` is set; a present
/// but wrong signature is always rejected.
pub fn validate_and_parse(
    raw_body: &[u8],
    signature_header: Option<&str>,
    app_secret: &str,
    allow_unsigned: bool,
) -> Result<Vec<NormalizedInbound>, WahubError> {
    match signature_header.map(str::trim).filter(|s| !s.is_empty()) {
        Some(signature) => {
            if !validate_signature(app_secret, signature, raw_body) {
                return Err(WahubError::InvalidSignature);
            }
        }
        None if allow_unsigned => debug!("accepting unsigned webhook (debug bypass)"),
        None => return Err(WahubError::MissingSignature),
    }
    parse_envelope(raw_body)
}

#[cfg(test)]
mod tests;
