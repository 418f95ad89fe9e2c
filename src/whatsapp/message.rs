use crate::utils::truncate_chars;
use serde_json::{Value, json};

pub const MAX_BODY_CHARS: usize = 1024;
pub const MAX_TEXT_CHARS: usize = 4096;
pub const MAX_BUTTON_TITLE_CHARS: usize = 20;
pub const MAX_BUTTONS: usize = 3;
pub const MAX_ROW_TITLE_CHARS: usize = 24;
pub const MAX_ROW_DESCRIPTION_CHARS: usize = 72;
pub const MAX_LIST_ROWS: usize = 10;
pub const MAX_HEADER_CHARS: usize = 60;
pub const MAX_FOOTER_CHARS: usize = 60;
pub const MAX_ID_CHARS: usize = 256;

/// Media referenced by public URL or by an uploaded media id.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Link(String),
    Id(String),
}

impl MediaSource {
    fn to_json(&self) -> Value {
        match self {
            Self::Link(url) => json!({ "link": url }),
            Self::Id(id) => json!({ "id": id }),
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Link(url) => Some(url),
            Self::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

impl Button {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl ListRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSection {
    pub title: Option<String>,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveHeader {
    Text(String),
    Image(MediaSource),
}

/// One message in an outbound plan.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundItem {
    Text {
        body: String,
        preview_url: bool,
    },
    Image {
        source: MediaSource,
        caption: Option<String>,
    },
    Document {
        source: MediaSource,
        caption: Option<String>,
        filename: Option<String>,
    },
    Video {
        source: MediaSource,
        caption: Option<String>,
    },
    Audio {
        source: MediaSource,
    },
    Sticker {
        source: MediaSource,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    Buttons {
        header: Option<InteractiveHeader>,
        body: String,
        footer: Option<String>,
        buttons: Vec<Button>,
    },
    List {
        header: Option<String>,
        body: String,
        footer: Option<String>,
        button: String,
        sections: Vec<ListSection>,
    },
    Template {
        name: String,
        language: String,
        components: Vec<Value>,
    },
}

impl OutboundItem {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            body: body.into(),
            preview_url: false,
        }
    }

    /// Wire `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
            Self::Video { .. } => "video",
            Self::Audio { .. } => "audio",
            Self::Sticker { .. } => "sticker",
            Self::Location { .. } => "location",
            Self::Buttons { .. } | Self::List { .. } => "interactive",
            Self::Template { .. } => "template",
        }
    }

    /// Cloud API request body for this item addressed to `to`. Text fields
    /// are clipped to the provider's limits.
    pub fn render(&self, to: &str) -> Value {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": self.kind(),
        });
        let (key, value) = match self {
            Self::Text { body, preview_url } => (
                "text",
                json!({
                    "body": truncate_chars(body, MAX_TEXT_CHARS),
                    "preview_url": preview_url,
                }),
            ),
            Self::Image { source, caption } | Self::Video { source, caption } => {
                let mut media = source.to_json();
                if let Some(caption) = caption {
                    media["caption"] = json!(truncate_chars(caption, MAX_BODY_CHARS));
                }
                (self.kind(), media)
            }
            Self::Document {
                source,
                caption,
                filename,
            } => {
                let mut media = source.to_json();
                if let Some(caption) = caption {
                    media["caption"] = json!(truncate_chars(caption, MAX_BODY_CHARS));
                }
                if let Some(filename) = filename {
                    media["filename"] = json!(filename);
                }
                ("document", media)
            }
            Self::Audio { source } | Self::Sticker { source } => (self.kind(), source.to_json()),
            Self::Location {
                latitude,
                longitude,
                name,
                address,
            } => {
                let mut loc = json!({ "latitude": latitude, "longitude": longitude });
                if let Some(name) = name {
                    loc["name"] = json!(name);
                }
                if let Some(address) = address {
                    loc["address"] = json!(address);
                }
                ("location", loc)
            }
            Self::Buttons {
                header,
                body,
                footer,
                buttons,
            } => {
                let mut interactive = json!({
                    "type": "button",
                    "body": { "text": truncate_chars(body, MAX_BODY_CHARS) },
                    "action": {
                        "buttons": buttons.iter().take(MAX_BUTTONS).map(|b| json!({
                            "type": "reply",
                            "reply": {
                                "id": truncate_chars(&b.id, MAX_ID_CHARS),
                                "title": truncate_chars(&b.title, MAX_BUTTON_TITLE_CHARS),
                            }
                        })).collect::<Vec<_>>()
                    }
                });
                match header {
                    Some(InteractiveHeader::Text(text)) => {
                        interactive["header"] =
                            json!({ "type": "text", "text": truncate_chars(text, MAX_HEADER_CHARS) });
                    }
                    Some(InteractiveHeader::Image(source)) => {
                        interactive["header"] = json!({ "type": "image", "image": source.to_json() });
                    }
                    None => {}
                }
                if let Some(footer) = footer {
                    interactive["footer"] = json!({ "text": truncate_chars(footer, MAX_FOOTER_CHARS) });
                }
                ("interactive", interactive)
            }
            Self::List {
                header,
                body,
                footer,
                button,
                sections,
            } => {
                let mut remaining = MAX_LIST_ROWS;
                let sections: Vec<Value> = sections
                    .iter()
                    .filter_map(|section| {
                        let take = section.rows.len().min(remaining);
                        if take == 0 {
                            return None;
                        }
                        remaining -= take;
                        let rows: Vec<Value> = section.rows[..take]
                            .iter()
                            .map(|row| {
                                let mut r = json!({
                                    "id": truncate_chars(&row.id, MAX_ID_CHARS),
                                    "title": truncate_chars(&row.title, MAX_ROW_TITLE_CHARS),
                                });
                                if let Some(desc) = &row.description {
                                    r["description"] =
                                        json!(truncate_chars(desc, MAX_ROW_DESCRIPTION_CHARS));
                                }
                                r
                            })
                            .collect();
                        let mut s = json!({ "rows": rows });
                        if let Some(title) = &section.title {
                            s["title"] = json!(truncate_chars(title, MAX_ROW_TITLE_CHARS));
                        }
                        Some(s)
                    })
                    .collect();
                let mut interactive = json!({
                    "type": "list",
                    "body": { "text": truncate_chars(body, MAX_BODY_CHARS) },
                    "action": {
                        "button": truncate_chars(button, MAX_BUTTON_TITLE_CHARS),
                        "sections": sections,
                    }
                });
                if let Some(header) = header {
                    interactive["header"] =
                        json!({ "type": "text", "text": truncate_chars(header, MAX_HEADER_CHARS) });
                }
                if let Some(footer) = footer {
                    interactive["footer"] = json!({ "text": truncate_chars(footer, MAX_FOOTER_CHARS) });
                }
                ("interactive", interactive)
            }
            Self::Template {
                name,
                language,
                components,
            } => (
                "template",
                json!({
                    "name": name,
                    "language": { "code": language },
                    "components": components,
                }),
            ),
        };
        payload[key] = value;
        payload
    }

    /// Plain-text rendering used when the rich form is rejected. `None` for
    /// text items and items with nothing readable to fall back to.
    pub fn text_fallback(&self) -> Option<String> {
        match self {
            Self::Text { .. } | Self::Template { .. } => None,
            Self::Image { source, caption } | Self::Video { source, caption } => {
                join_lines([caption.clone(), source.link().map(str::to_string)])
            }
            Self::Document {
                source,
                caption,
                filename,
            } => join_lines([
                caption.clone().or_else(|| filename.clone()),
                source.link().map(str::to_string),
            ]),
            Self::Audio { source } | Self::Sticker { source } => {
                source.link().map(str::to_string)
            }
            Self::Location {
                latitude,
                longitude,
                name,
                address,
            } => join_lines([
                name.clone(),
                address.clone(),
                Some(format!(
                    "https://maps.google.com/?q={},{}",
                    latitude, longitude
                )),
            ]),
            Self::Buttons { body, buttons, .. } => {
                let mut text = body.clone();
                if !buttons.is_empty() {
                    text.push_str("\n\nReply with one of:");
                    for b in buttons {
                        text.push_str(&format!("\n- {}", b.title));
                    }
                }
                Some(text)
            }
            Self::List { body, sections, .. } => {
                let mut text = body.clone();
                let mut n = 0;
                for row in sections.iter().flat_map(|s| &s.rows) {
                    n += 1;
                    text.push_str(&format!("\n{}. {}", n, row.title));
                    if let Some(desc) = &row.description {
                        text.push_str(&format!(" ({})", desc));
                    }
                }
                Some(text)
            }
        }
    }
}

fn join_lines<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let lines: Vec<String> = parts
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
