//! Ordered keyword rules for POS text messages. The first matching rule wins
//! and the LLM is the default branch.

use crate::dialog::actions::PosAction;
use crate::pos::MAX_QUANTITY;
use crate::session::record::{RelayTarget, Scratch};
use crate::utils::normalize_phrase;
use crate::utils::regex::RegexPatterns;

const PRODUCT_KEYWORDS: &[&str] = &[
    "products",
    "product",
    "menu",
    "catalog",
    "catalogue",
    "show menu",
    "view products",
    "show products",
];

const HISTORY_KEYWORDS: &[&str] = &["order history", "my orders", "past orders", "orders"];

/// Where a POS text message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRoute {
    /// Forward verbatim to the counterparty waiting for it.
    Relay(RelayTarget),
    Action(PosAction),
    Llm,
}

pub fn route_text(text: &str, scratch: &Scratch, is_owner: bool) -> TextRoute {
    if let Some(target) = &scratch.relay_to {
        return TextRoute::Relay(target.clone());
    }

    let phrase = normalize_phrase(text);
    if phrase.is_empty() {
        return TextRoute::Llm;
    }

    if is_owner && phrase == "dashboard" {
        return TextRoute::Action(PosAction::DashboardMenu);
    }
    if PRODUCT_KEYWORDS.contains(&phrase.as_str()) {
        return TextRoute::Action(PosAction::ViewProducts);
    }
    if HISTORY_KEYWORDS.contains(&phrase.as_str()) {
        return TextRoute::Action(PosAction::OrderHistory);
    }

    if let Some(caps) = RegexPatterns::buy_command().captures(&phrase) {
        let quantity = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|q| (1..=MAX_QUANTITY).contains(q))
            .unwrap_or(1);
        if let Some(name) = caps.get(2).map(|m| m.as_str().trim()).filter(|n| !n.is_empty()) {
            return TextRoute::Action(PosAction::BuyByName {
                name: name.to_string(),
                quantity,
            });
        }
    }
    if let Some(name) = RegexPatterns::product_command()
        .captures(&phrase)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|n| !n.is_empty())
    {
        return TextRoute::Action(PosAction::ShowProductByName(name.to_string()));
    }

    if scratch.cart.is_some() && RegexPatterns::price_sensitive().is_match(&phrase) {
        return TextRoute::Action(PosAction::RequestDiscount);
    }

    TextRoute::Llm
}

#[cfg(test)]
mod tests;
