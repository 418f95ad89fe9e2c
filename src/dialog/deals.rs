//! Deals tenant: location, category, nearby search, alerts.

use super::state::{DealsState, DialogState};
use super::{DialogEngine, TurnCtx};
use crate::errors::WahubError;
use crate::places::{MAX_RESULTS, Place};
use crate::session::record::DealSearchDraft;
use crate::utils::normalize_phrase;
use crate::whatsapp::{Button, InboundKind, ListRow, ListSection, OutboundItem};
use tracing::{debug, info};

/// `(action id, list title, search term)`.
const CATEGORIES: &[(&str, &str, &str)] = &[
    ("deal_cat_food", "Food & Drinks", "food"),
    ("deal_cat_groceries", "Groceries", "groceries"),
    ("deal_cat_fashion", "Fashion", "fashion"),
    ("deal_cat_beauty", "Beauty & Wellness", "beauty"),
    ("deal_cat_electronics", "Electronics", "electronics"),
    ("deal_cat_entertainment", "Entertainment", "entertainment"),
];

const RESTART_WORDS: &[&str] = &["restart", "start over", "reset"];
const NEW_SEARCH_WORDS: &[&str] = &["new search", "search again", "another category"];
const CHANGE_LOCATION_WORDS: &[&str] = &["change location", "new location"];

fn deals_state(state: DealsState) -> DialogState {
    DialogState::Deals(state)
}

/// What the user did this turn, reduced to the inputs the machine reacts to.
#[derive(Debug, Clone, PartialEq)]
enum DealsInput {
    Restart,
    Location {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },
    Action(String),
    Text(String),
    Other,
}

impl DealsInput {
    fn from_kind(kind: &InboundKind) -> Self {
        match kind {
            InboundKind::Text { body } => {
                let phrase = normalize_phrase(body);
                if RESTART_WORDS.contains(&phrase.as_str()) {
                    Self::Restart
                } else {
                    Self::Text(body.trim().to_string())
                }
            }
            InboundKind::Interactive { action_id, .. } => Self::Action(action_id.clone()),
            InboundKind::Location {
                latitude,
                longitude,
                name,
                address,
            } => Self::Location {
                latitude: *latitude,
                longitude: *longitude,
                label: name.clone().or_else(|| address.clone()),
            },
            _ => Self::Other,
        }
    }

    fn phrase(&self) -> Option<String> {
        match self {
            Self::Text(t) => Some(normalize_phrase(t)),
            _ => None,
        }
    }

    fn is_one_of(&self, words: &[&str]) -> bool {
        self.phrase().is_some_and(|p| words.contains(&p.as_str()))
    }
}

fn category_list() -> OutboundItem {
    OutboundItem::List {
        header: None,
        body: "What kind of deals are you looking for? Pick a category or just type one."
            .to_string(),
        footer: None,
        button: "Categories".to_string(),
        sections: vec![ListSection {
            title: Some("Categories".to_string()),
            rows: CATEGORIES
                .iter()
                .map(|(id, title, _)| ListRow::new(*id, *title))
                .collect(),
        }],
    }
}

/// Search term for a category pick, or the typed text itself.
fn category_term(input: &DealsInput) -> Option<String> {
    match input {
        DealsInput::Action(id) => CATEGORIES
            .iter()
            .find(|(cid, _, _)| *cid == id.as_str())
            .map(|(_, _, term)| (*term).to_string()),
        DealsInput::Text(text) if !text.is_empty() => {
            let phrase = normalize_phrase(text);
            let known = CATEGORIES
                .iter()
                .find(|(_, title, term)| phrase == *term || phrase == title.to_lowercase());
            Some(known.map_or(phrase, |(_, _, term)| (*term).to_string()))
        }
        _ => None,
    }
}

fn results_list(results: &[Place], category: &str) -> OutboundItem {
    let rows = results
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut row = ListRow::new(format!("deal_{}", i), &p.name);
            if !p.formatted_address.is_empty() {
                row = row.with_description(&p.formatted_address);
            }
            row
        })
        .collect();
    OutboundItem::List {
        header: None,
        body: format!(
            "Here are {} {} spot(s) near you. Tap one for details.",
            results.len(),
            category
        ),
        footer: Some("Type *new search* to try another category".to_string()),
        button: "View Deals".to_string(),
        sections: vec![ListSection {
            title: Some("Nearby".to_string()),
            rows,
        }],
    }
}

fn place_detail(place: &Place) -> String {
    let mut out = format!("*{}*", place.name);
    if !place.formatted_address.is_empty() {
        out.push_str(&format!("\n📍 {}", place.formatted_address));
    }
    if let Some(rating) = place.rating {
        out.push_str(&format!("\n⭐ {:.1}", rating));
    }
    if let Some(phone) = &place.phone {
        out.push_str(&format!("\n📞 {}", phone));
    }
    if let Some(site) = &place.website {
        out.push_str(&format!("\n🌐 {}", site));
    }
    out
}

fn interaction_buttons() -> OutboundItem {
    OutboundItem::Buttons {
        header: None,
        body: "Want me to keep an eye out for deals like this?".to_string(),
        footer: None,
        buttons: vec![
            Button::new("deal_alert", "Set Alert"),
            Button::new("deal_more", "More Deals"),
            Button::new("deal_done", "Done"),
        ],
    }
}

/// Index picked from the results list, by row id or typed number (1-based).
fn selected_index(input: &DealsInput, count: usize) -> Option<usize> {
    let index = match input {
        DealsInput::Action(id) => id.strip_prefix("deal_")?.parse::<usize>().ok()?,
        DealsInput::Text(text) => text.trim().parse::<usize>().ok()?.checked_sub(1)?,
        _ => return None,
    };
    (index < count).then_some(index)
}

impl DialogEngine {
    pub(super) async fn deals_turn(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let input = DealsInput::from_kind(&t.inbound.kind);
        let state = t.record.state.deals().unwrap_or(DealsState::Start);

        if input == DealsInput::Restart {
            t.record.scratch.deal = None;
            t.set_state(deals_state(DealsState::Start));
            self.deals_welcome(t);
            return Ok(());
        }

        match state {
            DealsState::Start => {
                self.deals_welcome(t);
                Ok(())
            }
            DealsState::End => {
                t.record.scratch.deal = None;
                t.set_state(deals_state(DealsState::Start));
                self.deals_welcome(t);
                Ok(())
            }
            DealsState::AskLocation => {
                self.receive_location(t, &input);
                Ok(())
            }
            DealsState::LocationReceived => {
                t.set_state(deals_state(DealsState::AskCategory));
                t.reply(category_list());
                Ok(())
            }
            DealsState::AskCategory => match category_term(&input) {
                Some(category) => self.search_deals(t, category).await,
                None => {
                    t.reply(category_list());
                    Ok(())
                }
            },
            DealsState::SearchingDeals => {
                let category = t
                    .record
                    .scratch
                    .deal
                    .as_ref()
                    .and_then(|d| d.category.clone());
                match category {
                    Some(category) => self.search_deals(t, category).await,
                    None => {
                        t.set_state(deals_state(DealsState::AskCategory));
                        t.reply(category_list());
                        Ok(())
                    }
                }
            }
            DealsState::ShowingDeals => {
                self.showing_deals(t, &input);
                Ok(())
            }
            DealsState::DealInteraction => {
                self.deal_interaction(t, &input);
                Ok(())
            }
            DealsState::AlertSetup => {
                self.alert_setup(t, &input);
                Ok(())
            }
        }
    }

    fn deals_welcome(&self, t: &mut TurnCtx<'_>) {
        t.set_state(deals_state(DealsState::AskLocation));
        t.reply_text(format!(
            "👋 Welcome to {}! I find the best deals near you.\n\nShare your location (📎 → Location) or type the area you're in.",
            t.tenant.display_name()
        ));
    }

    fn receive_location(&self, t: &mut TurnCtx<'_>, input: &DealsInput) {
        let draft = match input {
            DealsInput::Location {
                latitude,
                longitude,
                label,
            } => DealSearchDraft {
                latitude: Some(*latitude),
                longitude: Some(*longitude),
                area: label.clone(),
                ..DealSearchDraft::default()
            },
            DealsInput::Text(area) if !area.is_empty() => DealSearchDraft {
                area: Some(area.clone()),
                ..DealSearchDraft::default()
            },
            _ => {
                t.reply_text(
                    "Please share your location or type the area you're in, e.g. *Tampines*.",
                );
                return;
            }
        };
        debug!(
            "tenant {}: deals location for {}: {:?}",
            t.tenant.tenant_id, t.record.user, draft.area
        );
        t.record.scratch.deal = Some(draft);
        t.set_state(deals_state(DealsState::LocationReceived));
        t.set_state(deals_state(DealsState::AskCategory));
        t.reply_text("📍 Got it!");
        t.reply(category_list());
    }

    /// Search failures return to category selection before propagating.
    async fn search_deals(&self, t: &mut TurnCtx<'_>, category: String) -> Result<(), WahubError> {
        t.set_state(deals_state(DealsState::SearchingDeals));
        let draft = t.record.scratch.deal.get_or_insert_with(DealSearchDraft::default);
        draft.category = Some(category.clone());
        draft.results.clear();
        draft.selected = None;
        let near = draft.latitude.zip(draft.longitude);
        let query = match draft.area.as_deref() {
            Some(area) => format!("{} deals near {}", category, area),
            None => format!("{} deals", category),
        };

        let api_key = t.tenant.maps_api_key.as_deref().unwrap_or("");
        let results = match self.places.search(api_key, &query, near).await {
            Ok(r) => r,
            Err(e) => {
                t.set_state(deals_state(DealsState::AskCategory));
                return Err(e);
            }
        };
        let results: Vec<Place> = results.into_iter().take(MAX_RESULTS).collect();
        info!(
            "tenant {}: '{}' returned {} place(s)",
            t.tenant.tenant_id,
            query,
            results.len()
        );

        if results.is_empty() {
            t.set_state(deals_state(DealsState::AskCategory));
            t.reply_text(format!(
                "I couldn't find any {} deals nearby. Try another category?",
                category
            ));
            t.reply(category_list());
            return Ok(());
        }

        let list = results_list(&results, &category);
        if let Some(draft) = t.record.scratch.deal.as_mut() {
            draft.results = results;
        }
        t.set_state(deals_state(DealsState::ShowingDeals));
        t.reply(list);
        Ok(())
    }

    fn showing_deals(&self, t: &mut TurnCtx<'_>, input: &DealsInput) {
        if input.is_one_of(NEW_SEARCH_WORDS) {
            t.set_state(deals_state(DealsState::AskCategory));
            t.reply(category_list());
            return;
        }
        if input.is_one_of(CHANGE_LOCATION_WORDS) {
            t.set_state(deals_state(DealsState::AskLocation));
            t.reply_text("Sure, share your new location or type the area.");
            return;
        }
        let results = t
            .record
            .scratch
            .deal
            .as_ref()
            .map(|d| d.results.clone())
            .unwrap_or_default();
        let Some(index) = selected_index(input, results.len()) else {
            if results.is_empty() {
                t.set_state(deals_state(DealsState::AskCategory));
                t.reply(category_list());
            } else {
                t.reply_text(format!(
                    "Please pick one of the deals above (1-{}), or type *new search*.",
                    results.len()
                ));
            }
            return;
        };
        if let Some(draft) = t.record.scratch.deal.as_mut() {
            draft.selected = Some(index);
        }
        t.set_state(deals_state(DealsState::DealInteraction));
        t.reply_text(place_detail(&results[index]));
        t.reply(interaction_buttons());
    }

    fn deal_interaction(&self, t: &mut TurnCtx<'_>, input: &DealsInput) {
        let action = match input {
            DealsInput::Action(id) => Some(id.as_str()),
            _ => None,
        };
        let phrase = input.phrase();
        match (action, phrase.as_deref()) {
            (Some("deal_alert"), _) | (_, Some("alert" | "set alert")) => {
                t.set_state(deals_state(DealsState::AlertSetup));
                t.reply(OutboundItem::Buttons {
                    header: None,
                    body: "How often should I send you new deals like this?".to_string(),
                    footer: None,
                    buttons: vec![
                        Button::new("alert_daily", "Daily"),
                        Button::new("alert_weekly", "Weekly"),
                    ],
                });
            }
            (Some("deal_more"), _) | (_, Some("more" | "more deals")) => {
                let draft = t.record.scratch.deal.clone().unwrap_or_default();
                let category = draft.category.unwrap_or_else(|| "nearby".to_string());
                t.set_state(deals_state(DealsState::ShowingDeals));
                t.reply(results_list(&draft.results, &category));
            }
            (Some("deal_done"), _) | (_, Some("done" | "bye" | "thanks" | "thank you")) => {
                t.set_state(deals_state(DealsState::End));
                t.reply_text("Happy deal hunting! 🛍️ Message me anytime to search again.");
            }
            _ if input.is_one_of(NEW_SEARCH_WORDS) => {
                t.set_state(deals_state(DealsState::AskCategory));
                t.reply(category_list());
            }
            _ => {
                t.reply_text("Sorry, I didn't get that.");
                t.reply(interaction_buttons());
            }
        }
    }

    fn alert_setup(&self, t: &mut TurnCtx<'_>, input: &DealsInput) {
        let frequency = match (input, input.phrase().as_deref()) {
            (DealsInput::Action(id), _) if id == "alert_daily" => "daily",
            (DealsInput::Action(id), _) if id == "alert_weekly" => "weekly",
            (_, Some("daily")) => "daily",
            (_, Some("weekly")) => "weekly",
            _ => {
                t.reply_text("Please choose *Daily* or *Weekly*.");
                return;
            }
        };
        let category = match t.record.scratch.deal.as_mut() {
            Some(draft) => {
                draft.alert_frequency = Some(frequency.to_string());
                draft.category.clone()
            }
            None => None,
        };
        info!(
            "tenant {}: {} alert set for {}",
            t.tenant.tenant_id, frequency, t.record.user
        );
        t.set_state(deals_state(DealsState::End));
        t.reply_text(format!(
            "🔔 Done! I'll send you {} {} deals near you.",
            frequency,
            category.as_deref().unwrap_or("new")
        ));
    }
}
