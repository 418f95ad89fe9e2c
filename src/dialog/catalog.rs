//! Product lookup by name plus the catalog and order messages shared by the
//! POS dialog and the agent tools.

use crate::errors::WahubError;
use crate::pos::{Money, Order, OrderStatus, PosService, Product, QUANTITY_CHOICES};
use crate::tenants::TenantConfig;
use crate::whatsapp::{Button, InteractiveHeader, ListRow, ListSection, MediaSource, OutboundItem};

/// Rows shown in the product list.
pub const PRODUCT_LIST_ROWS: usize = 5;
/// Candidates named in an ambiguity clarification.
pub const MAX_CLARIFY_CANDIDATES: usize = 3;
/// Orders shown in the history list.
pub const ORDER_HISTORY_ROWS: usize = 10;

/// Outcome of resolving a product from free text.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductMatch {
    Found(Product),
    Ambiguous(Vec<Product>),
    NotFound,
}

/// Exact name match first (case-insensitive), then substring match. Two or
/// more substring hits are ambiguous.
pub fn match_product_name(candidates: Vec<Product>, query: &str) -> ProductMatch {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return ProductMatch::NotFound;
    }
    if let Some(exact) = candidates
        .iter()
        .find(|p| p.name.trim().to_lowercase() == needle)
    {
        return ProductMatch::Found(exact.clone());
    }
    let mut hits: Vec<Product> = candidates
        .into_iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect();
    match hits.len() {
        0 => ProductMatch::NotFound,
        1 => ProductMatch::Found(hits.remove(0)),
        _ => ProductMatch::Ambiguous(hits),
    }
}

pub async fn resolve_product_by_name(
    pos: &dyn PosService,
    store_id: &str,
    name: &str,
) -> Result<ProductMatch, WahubError> {
    let candidates = pos.search_products(store_id, name.trim()).await?;
    Ok(match_product_name(candidates, name))
}

/// Clarification listing up to three candidates.
pub fn clarification(query: &str, candidates: &[Product]) -> String {
    let mut text = format!("I found a few products matching \"{}\":", query.trim());
    for p in candidates.iter().take(MAX_CLARIFY_CANDIDATES) {
        text.push_str(&format!("\n• {}", p.name));
    }
    if let Some(first) = candidates.first() {
        text.push_str(&format!(
            "\n\nPlease be more specific, e.g. \"buy {}\".",
            first.name
        ));
    }
    text
}

/// Currency for a product, falling back to the store's.
pub fn currency_for<'a>(product: &'a Product, tenant: &'a TenantConfig) -> &'a str {
    product
        .currency
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(&tenant.store.currency)
}

fn price_label(raw: &str, currency: &str) -> String {
    raw.parse::<Money>()
        .map_or_else(|_| format!("{} {}", currency, raw), |m| m.display_with(currency))
}

pub fn product_list(products: &[Product], tenant: &TenantConfig) -> Option<OutboundItem> {
    if products.is_empty() {
        return None;
    }
    let rows = products
        .iter()
        .take(PRODUCT_LIST_ROWS)
        .map(|p| {
            let mut description = price_label(&p.price, currency_for(p, tenant));
            if !p.in_stock() {
                description.push_str(" · sold out");
            }
            ListRow::new(format!("select_product_{}", p.id), &p.name).with_description(description)
        })
        .collect();
    Some(OutboundItem::List {
        header: Some(format!("{} Products", tenant.display_name())),
        body: "Tap a product to see details and order.".to_string(),
        footer: None,
        button: "View Products".to_string(),
        sections: vec![ListSection {
            title: Some("Products".to_string()),
            rows,
        }],
    })
}

pub fn product_card(product: &Product, currency: &str, intro: Option<&str>) -> OutboundItem {
    let mut body = String::new();
    if let Some(intro) = intro.filter(|i| !i.trim().is_empty()) {
        body.push_str(intro.trim());
        body.push_str("\n\n");
    }
    body.push_str(&format!("*{}*", product.name));
    if let Some(desc) = product.description.as_deref().filter(|d| !d.is_empty()) {
        body.push('\n');
        body.push_str(desc);
    }
    body.push_str(&format!("\nPrice: {}", price_label(&product.price, currency)));

    let mut buttons = Vec::with_capacity(3);
    if product.in_stock() {
        buttons.push(Button::new(format!("buy_product_{}", product.id), "Buy Now"));
    } else {
        body.push_str("\nCurrently sold out.");
    }
    buttons.push(Button::new(format!("ask_product_{}", product.id), "Ask a Question"));
    buttons.push(Button::new("view_products", "View All"));

    OutboundItem::Buttons {
        header: product
            .image_url
            .as_ref()
            .map(|url| InteractiveHeader::Image(MediaSource::Link(url.clone()))),
        body,
        footer: None,
        buttons,
    }
}

fn line_summary(order: &Order, currency: &str) -> String {
    let mut text = String::new();
    for line in &order.items {
        let unit = line
            .unit_price
            .as_deref()
            .map_or_else(|| "?".to_string(), |u| price_label(u, currency));
        let total = line
            .line_total
            .as_deref()
            .map_or_else(|| "?".to_string(), |t| price_label(t, currency));
        text.push_str(&format!(
            "\n• {} x {} @ {} = {}",
            line.quantity, line.name, unit, total
        ));
    }
    text
}

/// Order summary with Confirm & Pay / Change Quantity / Cancel Order.
pub fn order_summary(order: &Order, image_url: Option<&str>, currency: &str) -> OutboundItem {
    let mut body = format!("Order #{}", order.number());
    body.push_str(&line_summary(order, currency));
    if let Some(pct) = order.discount_percent.filter(|p| *p > 0) {
        body.push_str(&format!("\nDiscount: {}% off", pct));
    }
    body.push_str(&format!(
        "\n\nTotal: {}",
        price_label(&order.total_amount, currency)
    ));

    let product_id = order
        .items
        .first()
        .map_or("", |l| l.product_id.as_str());
    OutboundItem::Buttons {
        header: image_url.map(|url| InteractiveHeader::Image(MediaSource::Link(url.to_string()))),
        body,
        footer: None,
        buttons: vec![
            Button::new(format!("confirm_order_{}", order.id), "Confirm & Pay"),
            Button::new(
                format!("change_quantity_{}_{}", order.id, product_id),
                "Change Quantity",
            ),
            Button::new(format!("cancel_order_{}", order.id), "Cancel Order"),
        ],
    }
}

pub fn quantity_picker(order_id: &str, product_id: &str, product_name: &str) -> OutboundItem {
    let rows = QUANTITY_CHOICES
        .map(|n| ListRow::new(format!("update_quantity_{}_{}_{}", order_id, product_id, n), n.to_string()))
        .collect();
    OutboundItem::List {
        header: None,
        body: format!("How many {} would you like?", product_name),
        footer: None,
        button: "Choose Quantity".to_string(),
        sections: vec![ListSection {
            title: Some("Quantity".to_string()),
            rows,
        }],
    }
}

pub fn order_history_list(orders: &[Order], currency: &str) -> Option<OutboundItem> {
    if orders.is_empty() {
        return None;
    }
    let rows = orders
        .iter()
        .take(ORDER_HISTORY_ROWS)
        .map(|o| {
            ListRow::new(format!("order_detail_{}", o.id), format!("#{}", o.number()))
                .with_description(format!(
                    "{} · {}",
                    o.status.label(),
                    price_label(&o.total_amount, o.currency.as_deref().unwrap_or(currency))
                ))
        })
        .collect();
    Some(OutboundItem::List {
        header: Some("Your Orders".to_string()),
        body: "Here are your recent orders. Tap one for details.".to_string(),
        footer: None,
        button: "View Orders".to_string(),
        sections: vec![ListSection {
            title: Some("Recent".to_string()),
            rows,
        }],
    })
}

/// Plain-text order detail.
pub fn order_detail(order: &Order, currency: &str) -> String {
    let mut text = format!("Order #{}\nStatus: {}", order.number(), order.status.label());
    text.push_str(&line_summary(order, currency));
    text.push_str(&format!(
        "\n\nTotal: {}",
        price_label(&order.total_amount, order.currency.as_deref().unwrap_or(currency))
    ));
    if order.status == OrderStatus::Paid && order.invoice_url.is_some() {
        text.push_str("\nInvoice available.");
    }
    text
}

/// `Invoice-<ORDERNUM>.pdf`.
pub fn invoice_filename(order: &Order) -> String {
    format!("Invoice-{}.pdf", order.number())
}

pub fn invoice_document(order: &Order, url: &str) -> OutboundItem {
    OutboundItem::Document {
        source: MediaSource::Link(url.to_string()),
        caption: Some(format!("Invoice for order #{}", order.number())),
        filename: Some(invoice_filename(order)),
    }
}
