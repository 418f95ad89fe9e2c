use crate::dialog::state::DialogState;
use crate::places::Place;
use crate::providers::base::ToolCallRequest;
use crate::tenants::TenantKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical unit of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
        raw_type: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        result_text: String,
    },
    SystemNote {
        text: String,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self::User {
            text: text.into(),
            raw_type: raw_type.into(),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_calls(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant { text, tool_calls }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        result_text: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            result_text: result_text.into(),
        }
    }

    pub fn note(text: impl Into<String>) -> Self {
        Self::SystemNote { text: text.into() }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}

/// POS order being built in this conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartDraft {
    pub order_id: String,
    pub product_id: String,
}

/// Deals search progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DealSearchDraft {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub results: Vec<Place>,
    #[serde(default)]
    pub selected: Option<usize>,
    #[serde(default)]
    pub alert_frequency: Option<String>,
}

/// Viral Agency deal intake answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViralDraft {
    #[serde(default)]
    pub restaurant_name: Option<String>,
    #[serde(default)]
    pub place: Option<Place>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pricing: Option<String>,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub photo_media_id: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub special_notes: Option<String>,
    #[serde(default)]
    pub generated_copy: Option<String>,
    #[serde(default)]
    pub deal_id: Option<String>,
}

/// Counterparty that receives this user's next text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTarget {
    pub contact: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Typed per-tenant scratch space carried between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scratch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal: Option<DealSearchDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viral: Option<ViralDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_to: Option<RelayTarget>,
    /// Customer has reported payment and waits for the owner to verify it.
    #[serde(default)]
    pub awaiting_owner_reply: bool,
}

/// Per-user conversation state owned by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub tenant_id: String,
    pub user: String,
    pub session_id: String,
    pub state: DialogState,
    #[serde(default)]
    pub last_message_type: Option<String>,
    #[serde(default)]
    pub transcript: Vec<Turn>,
    #[serde(default)]
    pub scratch: Scratch,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// `updated_at` in milliseconds as read from the store; `None` for a record
    /// that has never been committed. Used for compare-and-set.
    #[serde(skip)]
    pub version: Option<i64>,
}

impl ConversationRecord {
    pub fn fresh(tenant_id: &str, user: &str, kind: TenantKind, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.to_string(),
            user: user.to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
            state: DialogState::initial(kind),
            last_message_type: None,
            transcript: Vec::new(),
            scratch: Scratch::default(),
            created_at: now,
            updated_at: now,
            expires_at: expiry_after(now, ttl),
            version: None,
        }
    }

    pub fn session_key(&self) -> String {
        session_key(&self.tenant_id, &self.user)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn push(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.transcript.push(Turn::note(text));
    }
}

/// Composite session id: tenant plus user contact.
/// `now + ttl`, saturating at the latest representable instant.
pub fn expiry_after(now: DateTime<Utc>, ttl: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn session_key(tenant_id: &str, user: &str) -> String {
    format!("{}#{}", tenant_id, user)
}
