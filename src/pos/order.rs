use crate::pos::money::{Money, MoneyError};
use crate::pos::{NewOrder, Order, OrderLine, OrderStatus, Product};
use thiserror::Error;

/// Largest quantity accepted for one line.
pub const MAX_QUANTITY: u32 = 99;

/// Quantities offered by the change-quantity list.
pub const QUANTITY_CHOICES: std::ops::RangeInclusive<u32> = 1..=5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    Empty,
    #[error("invalid quantity {quantity} for {product_id}")]
    InvalidQuantity { product_id: String, quantity: u32 },
    #[error("invalid price for {product_id}: {reason}")]
    InvalidPrice { product_id: String, reason: String },
    #[error("order has no line for {0}")]
    UnknownLine(String),
    #[error("order total out of range")]
    Overflow,
}

fn check_quantity(product_id: &str, quantity: u32) -> Result<(), OrderError> {
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(OrderError::InvalidQuantity {
            product_id: product_id.to_string(),
            quantity,
        });
    }
    Ok(())
}

fn parse_unit_price(product_id: &str, raw: &str) -> Result<Money, OrderError> {
    let price: Money = raw.parse().map_err(|e: MoneyError| OrderError::InvalidPrice {
        product_id: product_id.to_string(),
        reason: e.to_string(),
    })?;
    if price.is_negative() {
        return Err(OrderError::InvalidPrice {
            product_id: product_id.to_string(),
            reason: "negative".into(),
        });
    }
    Ok(price)
}

/// Validate the requested items and price them into a new order with
/// status `PendingConfirmation`.
pub fn build_order(
    store_id: &str,
    customer: &str,
    customer_name: Option<String>,
    currency: &str,
    items: &[(Product, u32)],
) -> Result<NewOrder, OrderError> {
    if items.is_empty() {
        return Err(OrderError::Empty);
    }
    let mut lines = Vec::with_capacity(items.len());
    let mut total = Money::ZERO;
    for (product, quantity) in items {
        check_quantity(&product.id, *quantity)?;
        let unit = parse_unit_price(&product.id, &product.price)?;
        let line_total = unit.checked_mul(*quantity).ok_or(OrderError::Overflow)?;
        total = total.checked_add(line_total).ok_or(OrderError::Overflow)?;
        lines.push(OrderLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: *quantity,
            unit_price: Some(unit.to_string()),
            line_total: Some(line_total.to_string()),
        });
    }
    Ok(NewOrder {
        store_id: store_id.to_string(),
        customer: customer.to_string(),
        customer_name,
        items: lines,
        total_amount: total.to_string(),
        currency: currency.to_string(),
        status: OrderStatus::PendingConfirmation,
    })
}

/// Product ids whose stored unit price is missing or unparsable.
pub fn lines_missing_price(order: &Order) -> Vec<String> {
    order
        .items
        .iter()
        .filter(|l| {
            l.unit_price
                .as_deref()
                .is_none_or(|p| parse_unit_price(&l.product_id, p).is_err())
        })
        .map(|l| l.product_id.clone())
        .collect()
}

/// Recompute every line total and the order total.
///
/// A line whose unit price is missing or invalid takes the product's current
/// price from `current_price`, and that price is written back to the line.
pub fn recompute(
    order: &mut Order,
    current_price: impl Fn(&str) -> Option<Money>,
) -> Result<Money, OrderError> {
    if order.items.is_empty() {
        return Err(OrderError::Empty);
    }
    let mut total = Money::ZERO;
    for line in &mut order.items {
        check_quantity(&line.product_id, line.quantity)?;
        let stored = line
            .unit_price
            .as_deref()
            .and_then(|p| parse_unit_price(&line.product_id, p).ok());
        let unit = match stored {
            Some(unit) => unit,
            None => {
                let unit = current_price(&line.product_id).ok_or_else(|| {
                    OrderError::InvalidPrice {
                        product_id: line.product_id.clone(),
                        reason: "no stored or current price".into(),
                    }
                })?;
                line.unit_price = Some(unit.to_string());
                unit
            }
        };
        let line_total = unit.checked_mul(line.quantity).ok_or(OrderError::Overflow)?;
        line.line_total = Some(line_total.to_string());
        total = total.checked_add(line_total).ok_or(OrderError::Overflow)?;
    }
    order.total_amount = total.to_string();
    Ok(total)
}

/// Set one line's quantity and recompute totals. Quantities below 1 are rejected.
pub fn set_quantity(
    order: &mut Order,
    product_id: &str,
    quantity: u32,
    current_price: impl Fn(&str) -> Option<Money>,
) -> Result<Money, OrderError> {
    check_quantity(product_id, quantity)?;
    let line = order
        .items
        .iter_mut()
        .find(|l| l.product_id == product_id)
        .ok_or_else(|| OrderError::UnknownLine(product_id.to_string()))?;
    line.quantity = quantity;
    recompute(order, current_price)
}

/// Reduce every unit price by `percent` and recompute totals.
pub fn apply_discount(
    order: &mut Order,
    percent: u32,
    current_price: impl Fn(&str) -> Option<Money>,
) -> Result<Money, OrderError> {
    recompute(order, &current_price)?;
    for line in &mut order.items {
        if let Some(unit) = line
            .unit_price
            .as_deref()
            .and_then(|p| p.parse::<Money>().ok())
        {
            line.unit_price = Some(unit.discounted(percent).to_string());
        }
    }
    order.discount_percent = Some(percent);
    recompute(order, current_price)
}
