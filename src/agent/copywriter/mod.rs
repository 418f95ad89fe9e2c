//! Marketing copy for Viral Agency deals: one model call without tools,
//! falling back to a fixed template.

use crate::providers::base::{ChatRequest, LLMProvider, Message};
use crate::session::record::ViralDraft;
use crate::tenants::TenantConfig;
use crate::utils::truncate_chars;
use crate::whatsapp::MAX_BODY_CHARS;
use std::time::Duration;
use tracing::warn;

const COPY_MAX_TOKENS: u32 = 400;

const COPY_INSTRUCTIONS: &str = "You write short, punchy social media posts for Singapore \
food deals. Use at most 600 characters, 2-4 emoji, and end with a call to action. \
Do not invent details that are not in the brief. Reply with the post only.";

/// Copy and whether the model wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketingCopy {
    pub text: String,
    pub generated: bool,
}

fn field(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("-")
}

fn brief(draft: &ViralDraft) -> String {
    let address = draft
        .place
        .as_ref()
        .map(|p| p.formatted_address.as_str());
    format!(
        "Restaurant: {}\nAddress: {}\nDeal: {}\nPrice: {}\nValid: {}\nAudience: {}\nNotes: {}",
        field(draft.restaurant_name.as_deref()),
        field(address),
        field(draft.description.as_deref()),
        field(draft.pricing.as_deref()),
        field(draft.validity.as_deref()),
        field(draft.audience.as_deref()),
        field(draft.special_notes.as_deref()),
    )
}

/// Template used when the model is unavailable.
pub fn template_copy(draft: &ViralDraft) -> String {
    let mut text = format!(
        "🔥 {} at {}!\n💰 {}\n📅 Valid {}",
        field(draft.description.as_deref()),
        field(draft.restaurant_name.as_deref()),
        field(draft.pricing.as_deref()),
        field(draft.validity.as_deref()),
    );
    if let Some(place) = &draft.place {
        text.push_str(&format!("\n📍 {}", place.formatted_address));
    }
    if let Some(notes) = draft.special_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        text.push_str(&format!("\nℹ️ {}", notes.trim()));
    }
    text.push_str("\n\nGrab it before it's gone! 🏃");
    text
}

pub async fn generate_copy(
    provider: &dyn LLMProvider,
    tenant: &TenantConfig,
    draft: &ViralDraft,
    timeout: Duration,
) -> MarketingCopy {
    let request = ChatRequest {
        messages: vec![
            Message::system(COPY_INSTRUCTIONS),
            Message::user(brief(draft)),
        ],
        tools: None,
        model: Some(tenant.llm.model.as_str()),
        max_tokens: COPY_MAX_TOKENS,
        temperature: tenant.llm.temperature,
        tool_choice: None,
    };
    match tokio::time::timeout(timeout, provider.chat(request)).await {
        Ok(Ok(response)) => {
            if let Some(text) = response.content.filter(|c| !c.trim().is_empty()) {
                return MarketingCopy {
                    text: truncate_chars(text.trim(), MAX_BODY_CHARS),
                    generated: true,
                };
            }
            warn!("tenant {}: copy generation returned nothing", tenant.tenant_id);
        }
        Ok(Err(e)) => warn!("tenant {}: copy generation failed: {}", tenant.tenant_id, e),
        Err(_) => warn!("tenant {}: copy generation timed out", tenant.tenant_id),
    }
    MarketingCopy {
        text: template_copy(draft),
        generated: false,
    }
}
