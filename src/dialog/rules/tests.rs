use super::*;
use crate::session::record::CartDraft;

fn route(text: &str) -> TextRoute {
    route_text(text, &Scratch::default(), false)
}

#[test]
fn test_product_keywords() {
    for text in ["products", "Menu", "  catalog ", "show menu!", "View products"] {
        assert_eq!(route(text), TextRoute::Action(PosAction::ViewProducts), "{}", text);
    }
}

#[test]
fn test_history_keywords_are_exact() {
    assert_eq!(route("my orders"), TextRoute::Action(PosAction::OrderHistory));
    assert_eq!(route("Order history?"), TextRoute::Action(PosAction::OrderHistory));
    assert_eq!(route("where are my orders going"), TextRoute::Llm);
}

#[test]
fn test_buy_command() {
    assert_eq!(
        route("buy chicken"),
        TextRoute::Action(PosAction::BuyByName {
            name: "chicken".into(),
            quantity: 1
        })
    );
    assert_eq!(
        route("Order 3x Teh Tarik"),
        TextRoute::Action(PosAction::BuyByName {
            name: "teh tarik".into(),
            quantity: 3
        })
    );
    assert_eq!(route("buy"), TextRoute::Llm);
}

#[test]
fn test_product_command() {
    assert_eq!(
        route("product kaya toast"),
        TextRoute::Action(PosAction::ShowProductByName("kaya toast".into()))
    );
}

#[test]
fn test_price_sensitive_needs_open_cart() {
    assert_eq!(route("so expensive leh"), TextRoute::Llm);
    let scratch = Scratch {
        cart: Some(CartDraft {
            order_id: "o1".into(),
            product_id: "p1".into(),
        }),
        ..Scratch::default()
    };
    assert_eq!(
        route_text("so expensive leh, any discount?", &scratch, false),
        TextRoute::Action(PosAction::RequestDiscount)
    );
}

#[test]
fn test_relay_takes_precedence() {
    let target = RelayTarget {
        contact: "6591234567".into(),
        order_id: Some("o1".into()),
    };
    let scratch = Scratch {
        relay_to: Some(target.clone()),
        ..Scratch::default()
    };
    assert_eq!(route_text("products", &scratch, true), TextRoute::Relay(target));
}

#[test]
fn test_owner_dashboard_keyword() {
    assert_eq!(
        route_text("Dashboard", &Scratch::default(), true),
        TextRoute::Action(PosAction::DashboardMenu)
    );
    assert_eq!(route("dashboard"), TextRoute::Llm);
}

#[test]
fn test_everything_else_goes_to_llm() {
    assert_eq!(route("what time do you close?"), TextRoute::Llm);
    assert_eq!(route(""), TextRoute::Llm);
}
