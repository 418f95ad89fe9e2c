//! Owner dashboard views computed from the store's recent orders.

use crate::pos::{Money, Order, OrderStatus};
use crate::whatsapp::{Button, OutboundItem};
use std::collections::HashMap;

/// Orders fetched to build a dashboard view.
pub const DASHBOARD_ORDER_WINDOW: usize = 50;
const ROWS: usize = 10;

pub fn menu() -> OutboundItem {
    OutboundItem::Buttons {
        header: None,
        body: "📊 Store dashboard. What would you like to see?".to_string(),
        footer: None,
        buttons: vec![
            Button::new("dashboard_orders", "Orders"),
            Button::new("dashboard_customers", "Customers"),
            Button::new("dashboard_stats", "Stats"),
        ],
    }
}

fn total(order: &Order) -> Money {
    order.total().unwrap_or(Money::ZERO)
}

fn who(order: &Order) -> &str {
    order
        .customer_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(&order.customer)
}

pub fn orders_view(orders: &[Order], currency: &str) -> String {
    if orders.is_empty() {
        return "No orders yet.".to_string();
    }
    let mut text = "🧾 Recent orders".to_string();
    for o in orders.iter().take(ROWS) {
        text.push_str(&format!(
            "\n#{} · {} · {} · {}",
            o.number(),
            o.status.label(),
            total(o).display_with(currency),
            who(o)
        ));
    }
    text
}

pub fn customers_view(orders: &[Order], currency: &str) -> String {
    let mut by_customer: HashMap<&str, (String, usize, Money)> = HashMap::new();
    for o in orders.iter().filter(|o| o.status == OrderStatus::Paid) {
        let entry = by_customer
            .entry(o.customer.as_str())
            .or_insert_with(|| (who(o).to_string(), 0, Money::ZERO));
        entry.1 += 1;
        entry.2 = entry.2.checked_add(total(o)).unwrap_or(entry.2);
    }
    if by_customer.is_empty() {
        return "No paying customers yet.".to_string();
    }
    let mut rows: Vec<_> = by_customer.into_values().collect();
    rows.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
    let mut text = "👥 Top customers".to_string();
    for (name, count, spent) in rows.into_iter().take(ROWS) {
        text.push_str(&format!(
            "\n{} · {} order{} · {}",
            name,
            count,
            if count == 1 { "" } else { "s" },
            spent.display_with(currency)
        ));
    }
    text
}

pub fn stats_view(orders: &[Order], currency: &str) -> String {
    let paid: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Paid)
        .collect();
    let revenue = paid
        .iter()
        .fold(Money::ZERO, |acc, o| acc.checked_add(total(o)).unwrap_or(acc));
    let pending = orders
        .iter()
        .filter(|o| {
            matches!(
                o.status,
                OrderStatus::AwaitingPayment | OrderStatus::PaymentSubmitted
            )
        })
        .count();
    let average = i64::try_from(paid.len())
        .ok()
        .filter(|n| *n > 0)
        .map_or(Money::ZERO, |n| Money::from_minor(revenue.minor() / n));
    format!(
        "📈 Last {} orders\nPaid: {}\nAwaiting payment: {}\nRevenue: {}\nAverage order: {}",
        orders.len(),
        paid.len(),
        pending,
        revenue.display_with(currency),
        average.display_with(currency)
    )
}

#[cfg(test)]
mod tests;
