//! Viral Agency tenant: collects a restaurant deal step by step, writes the
//! marketing copy and hands the approved deal to the publishing workflow.

use super::state::{DialogState, ViralState};
use super::{DialogEngine, TurnCtx};
use crate::agent::copywriter::{MarketingCopy, generate_copy, template_copy};
use crate::errors::WahubError;
use crate::session::record::ViralDraft;
use crate::utils::normalize_phrase;
use crate::whatsapp::{Button, InboundKind, ListRow, ListSection, OutboundItem};
use crate::workflow::{DealPayload, DealSubmission, callback_url, webhook_url_for};
use tracing::{info, warn};
use uuid::Uuid;

const RESTART_WORDS: &[&str] = &["new", "new deal", "restart", "start over"];
const SKIP_WORDS: &[&str] = &["skip", "none", "no", "nil", "-"];
const YES_WORDS: &[&str] = &["yes", "y", "yep", "correct", "that's it"];
const NO_WORDS: &[&str] = &["no", "n", "nope", "wrong"];

/// `(action id, label)`.
const AUDIENCES: &[(&str, &str)] = &[
    ("audience_students", "Students"),
    ("audience_families", "Families"),
    ("audience_office", "Office workers"),
    ("audience_tourists", "Tourists"),
    ("audience_everyone", "Everyone"),
];

fn viral_state(state: ViralState) -> DialogState {
    DialogState::Viral(state)
}

/// Trimmed text of a non-empty text message.
fn answer(kind: &InboundKind) -> Option<String> {
    match kind {
        InboundKind::Text { body } => Some(body.trim().to_string()).filter(|b| !b.is_empty()),
        _ => None,
    }
}

fn phrase_in(kind: &InboundKind, words: &[&str]) -> bool {
    match kind {
        InboundKind::Text { body } => words.contains(&normalize_phrase(body).as_str()),
        _ => false,
    }
}

fn action_is(kind: &InboundKind, id: &str) -> bool {
    matches!(kind, InboundKind::Interactive { action_id, .. } if action_id == id)
}

fn audience_list() -> OutboundItem {
    OutboundItem::List {
        header: None,
        body: "Who is this deal for? Pick one or type your own.".to_string(),
        footer: None,
        button: "Audience".to_string(),
        sections: vec![ListSection {
            title: Some("Target audience".to_string()),
            rows: AUDIENCES
                .iter()
                .map(|(id, label)| ListRow::new(*id, *label))
                .collect(),
        }],
    }
}

fn approval_buttons(copy: &str) -> OutboundItem {
    OutboundItem::Buttons {
        header: None,
        body: copy.to_string(),
        footer: Some("Approve to publish".to_string()),
        buttons: vec![
            Button::new("viral_approve", "Approve"),
            Button::new("viral_regenerate", "Regenerate"),
            Button::new("viral_edit", "Edit"),
        ],
    }
}

fn payload_for(
    tenant_id: &str,
    user: &str,
    deal_id: &str,
    draft: &ViralDraft,
    copy: &str,
    callback: Option<String>,
) -> DealPayload {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    DealPayload {
        deal_id: deal_id.to_string(),
        tenant_id: tenant_id.to_string(),
        submitted_by: user.to_string(),
        restaurant_name: text(&draft.restaurant_name),
        place_id: draft
            .place
            .as_ref()
            .map(|p| p.place_id.clone())
            .filter(|id| !id.is_empty()),
        address: draft
            .place
            .as_ref()
            .map(|p| p.formatted_address.clone())
            .filter(|a| !a.is_empty()),
        description: text(&draft.description),
        pricing: text(&draft.pricing),
        validity: text(&draft.validity),
        photo_media_id: draft.photo_media_id.clone(),
        audience: text(&draft.audience),
        contact: text(&draft.contact),
        special_notes: draft.special_notes.clone(),
        marketing_copy: copy.to_string(),
        callback_url: callback,
    }
}

impl DialogEngine {
    pub(super) async fn viral_turn(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let inbound = t.inbound;
        let kind = &inbound.kind;
        let state = t.record.state.viral().unwrap_or(ViralState::Welcome);

        if phrase_in(kind, RESTART_WORDS) {
            t.record.scratch.viral = None;
            t.set_state(viral_state(ViralState::Welcome));
            self.viral_welcome(t);
            return Ok(());
        }

        match state {
            ViralState::Welcome => self.viral_welcome(t),
            ViralState::CollectRestaurantName => match answer(kind) {
                Some(name) => self.lookup_restaurant(t, name).await,
                None => t.reply_text("Please type the name of your restaurant."),
            },
            ViralState::ConfirmRestaurant => {
                if action_is(kind, "viral_confirm_yes") || phrase_in(kind, YES_WORDS) {
                    self.ask_description(t);
                } else if action_is(kind, "viral_confirm_no") || phrase_in(kind, NO_WORDS) {
                    if let Some(draft) = t.record.scratch.viral.as_mut() {
                        draft.place = None;
                        draft.restaurant_name = None;
                    }
                    t.set_state(viral_state(ViralState::CollectRestaurantName));
                    t.reply_text("No problem. Please type the restaurant name exactly as it appears on Google Maps.");
                } else {
                    t.reply_text("Please tap *Yes* or *No* to confirm the restaurant.");
                }
            }
            ViralState::CollectDescription => match answer(kind) {
                Some(text) => {
                    draft(t).description = Some(text);
                    t.set_state(viral_state(ViralState::CollectPricing));
                    t.reply_text("💰 What's the price? e.g. *$9.90 (usual $15)* or *1-for-1*");
                }
                None => t.reply_text("Please describe the deal in a sentence or two."),
            },
            ViralState::CollectPricing => match answer(kind) {
                Some(text) => {
                    draft(t).pricing = Some(text);
                    t.set_state(viral_state(ViralState::CollectValidity));
                    t.reply_text("📅 How long is the deal valid? e.g. *until 31 Dec* or *weekdays 2-5pm*");
                }
                None => t.reply_text("Please type the deal price."),
            },
            ViralState::CollectValidity => match answer(kind) {
                Some(text) => {
                    draft(t).validity = Some(text);
                    t.set_state(viral_state(ViralState::CollectPhoto));
                    t.reply_text("📸 Send a photo of the dish, or type *skip*.");
                }
                None => t.reply_text("Please type when the deal is valid."),
            },
            ViralState::CollectPhoto => {
                let photo = match kind {
                    InboundKind::Image(media) => Some(Some(media.id.clone())),
                    _ if phrase_in(kind, SKIP_WORDS) => Some(None),
                    _ => None,
                };
                match photo {
                    Some(media_id) => {
                        draft(t).photo_media_id = media_id;
                        t.set_state(viral_state(ViralState::CollectAudience));
                        t.reply(audience_list());
                    }
                    None => t.reply_text("Please send a photo, or type *skip* to continue without one."),
                }
            }
            ViralState::CollectAudience => {
                let audience = match kind {
                    InboundKind::Interactive { action_id, .. } => AUDIENCES
                        .iter()
                        .find(|(id, _)| *id == action_id.as_str())
                        .map(|(_, label)| (*label).to_string()),
                    _ => answer(kind),
                };
                match audience {
                    Some(audience) => {
                        draft(t).audience = Some(audience);
                        t.set_state(viral_state(ViralState::CollectContact));
                        t.reply_text("📞 How can customers reach you or book? (phone, link or handle)");
                    }
                    None => t.reply(audience_list()),
                }
            }
            ViralState::CollectContact => match answer(kind) {
                Some(text) => {
                    draft(t).contact = Some(text);
                    t.set_state(viral_state(ViralState::CollectSpecialNotes));
                    t.reply_text("📝 Anything else we should mention? Type *none* if not.");
                }
                None => t.reply_text("Please type a contact for customers."),
            },
            ViralState::CollectSpecialNotes => match answer(kind) {
                Some(text) => {
                    draft(t).special_notes =
                        (!SKIP_WORDS.contains(&normalize_phrase(&text).as_str())).then_some(text);
                    t.set_state(viral_state(ViralState::GenerateContent));
                    self.write_copy(t).await;
                }
                None => t.reply_text("Please type any extra notes, or *none*."),
            },
            ViralState::GenerateContent => self.write_copy(t).await,
            ViralState::AwaitApproval => {
                if action_is(kind, "viral_approve") || phrase_in(kind, &["approve", "yes"]) {
                    self.submit_deal(t).await?;
                } else if action_is(kind, "viral_regenerate") || phrase_in(kind, &["regenerate"]) {
                    t.set_state(viral_state(ViralState::GenerateContent));
                    self.write_copy(t).await;
                } else if action_is(kind, "viral_edit") || phrase_in(kind, &["edit"]) {
                    self.ask_description(t);
                } else {
                    let copy = draft(t).generated_copy.clone().unwrap_or_default();
                    t.reply_text("Please approve, regenerate or edit the post below.");
                    t.reply(approval_buttons(&copy));
                }
            }
            ViralState::Submitted => self.report_submission(t),
        }
        Ok(())
    }

    fn viral_welcome(&self, t: &mut TurnCtx<'_>) {
        t.record.scratch.viral = Some(ViralDraft::default());
        t.set_state(viral_state(ViralState::CollectRestaurantName));
        t.reply_text(format!(
            "👋 Welcome to {}! Let's get your deal out there.\n\nWhat's the name of your restaurant?",
            t.tenant.display_name()
        ));
    }

    /// Best-effort Places match; without one the name is taken as typed.
    async fn lookup_restaurant(&self, t: &mut TurnCtx<'_>, name: String) {
        draft(t).restaurant_name = Some(name.clone());
        let api_key = t.tenant.maps_api_key.clone().unwrap_or_default();
        let place = if api_key.is_empty() {
            None
        } else {
            match self.places.search(&api_key, &name, None).await {
                Ok(results) => results.into_iter().next(),
                Err(e) => {
                    warn!("tenant {}: restaurant lookup failed: {}", t.tenant.tenant_id, e);
                    None
                }
            }
        };

        match place {
            Some(place) => {
                let body = format!(
                    "Is this your restaurant?\n\n*{}*\n📍 {}",
                    place.name, place.formatted_address
                );
                draft(t).place = Some(place);
                t.set_state(viral_state(ViralState::ConfirmRestaurant));
                t.reply(OutboundItem::Buttons {
                    header: None,
                    body,
                    footer: None,
                    buttons: vec![
                        Button::new("viral_confirm_yes", "Yes"),
                        Button::new("viral_confirm_no", "No"),
                    ],
                });
            }
            None => self.ask_description(t),
        }
    }

    fn ask_description(&self, t: &mut TurnCtx<'_>) {
        t.set_state(viral_state(ViralState::CollectDescription));
        t.reply_text("🍜 Describe the deal, e.g. *Set lunch with drink*.");
    }

    async fn write_copy(&self, t: &mut TurnCtx<'_>) {
        let snapshot = draft(t).clone();
        let copy = match self.providers.provider_for(t.tenant) {
            Ok(provider) => {
                generate_copy(
                    provider.as_ref(),
                    t.tenant,
                    &snapshot,
                    self.agent.llm_timeout(),
                )
                .await
            }
            Err(e) => {
                warn!("tenant {}: no provider for copy: {}", t.tenant.tenant_id, e);
                MarketingCopy {
                    text: template_copy(&snapshot),
                    generated: false,
                }
            }
        };
        if !copy.generated {
            t.record.note("marketing copy used the template");
        }
        draft(t).generated_copy = Some(copy.text.clone());
        t.set_state(viral_state(ViralState::AwaitApproval));
        t.reply_text("Here's your post ✨");
        t.reply(approval_buttons(&copy.text));
    }

    /// Persist first, then hand off. A failed hand-off keeps the user at
    /// approval so they can retry with the same deal id.
    async fn submit_deal(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let deal_id = draft(t)
            .deal_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let snapshot = draft(t).clone();
        let copy = snapshot
            .generated_copy
            .clone()
            .unwrap_or_else(|| template_copy(&snapshot));
        let payload = payload_for(
            &t.tenant.tenant_id,
            &t.record.user,
            &deal_id,
            &snapshot,
            &copy,
            callback_url(&self.services),
        );

        if let Some(store) = &self.submissions {
            store.save(&DealSubmission::new(payload.clone()))?;
        }

        let url = webhook_url_for(t.tenant.workflow_webhook_url.as_deref(), &self.services);
        match self.workflow.submit(url, &payload).await {
            Ok(()) => {
                info!(
                    "tenant {}: deal {} submitted by {}",
                    t.tenant.tenant_id, deal_id, t.record.user
                );
                t.set_state(viral_state(ViralState::Submitted));
                t.reply_text(format!(
                    "🎉 Your deal has been submitted! Reference: {}\nWe'll message you when it goes live. Type *new* to submit another deal.",
                    short_id(&deal_id)
                ));
            }
            Err(e) => {
                warn!("tenant {}: deal {} hand-off failed: {}", t.tenant.tenant_id, deal_id, e);
                if let Some(store) = &self.submissions
                    && let Err(se) = store.set_status(&deal_id, DealSubmission::STATUS_SUBMIT_FAILED)
                {
                    warn!("could not mark deal {} as failed: {}", deal_id, se);
                }
                t.record.note(format!("deal {} submission failed: {}", deal_id, e));
                t.reply_text("Sorry, we couldn't submit your deal right now. Please tap *Approve* to try again.");
                t.reply(approval_buttons(&copy));
            }
        }
        Ok(())
    }

    fn report_submission(&self, t: &mut TurnCtx<'_>) {
        let deal_id = t.record.scratch.viral.as_ref().and_then(|d| d.deal_id.clone());
        let stored = match (&self.submissions, deal_id.as_deref()) {
            (Some(store), Some(id)) => store.get(id).unwrap_or_else(|e| {
                warn!("could not load deal {}: {}", id, e);
                None
            }),
            _ => None,
        };
        match stored {
            Some(submission) => t.reply_text(format!(
                "{}\n\nType *new* to submit another deal.",
                submission.status_summary()
            )),
            None => t.reply_text("Your deal is with our team. Type *new* to submit another deal."),
        }
    }
}

fn draft<'r>(t: &'r mut TurnCtx<'_>) -> &'r mut ViralDraft {
    t.record.scratch.viral.get_or_insert_with(ViralDraft::default)
}

fn short_id(deal_id: &str) -> &str {
    deal_id.split('-').next().unwrap_or(deal_id)
}
