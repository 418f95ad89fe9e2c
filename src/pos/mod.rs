//! Point-of-sale service collaborator: catalog, orders, payments.

pub mod client;
pub mod money;
pub mod order;

pub use client::HttpPosService;
pub use money::{Money, MoneyError};
pub use order::{
    MAX_QUANTITY, OrderError, QUANTITY_CHOICES, apply_discount, build_order, lines_missing_price,
    recompute, set_quantity,
};

use crate::errors::WahubError;
use async_trait::async_trait;
use money::decimal_string;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "decimal_string::deserialize")]
    pub price: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Units on hand; `None` when the store does not track stock.
    #[serde(default)]
    pub stock: Option<i64>,
}

impl Product {
    pub fn price(&self) -> Result<Money, MoneyError> {
        self.price.parse()
    }

    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|s| s > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingConfirmation,
    AwaitingPayment,
    PaymentSubmitted,
    Paid,
    PaymentRejected,
    Cancelled,
    StockUpdateFailed,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::PendingConfirmation => "Pending confirmation",
            Self::AwaitingPayment => "Awaiting payment",
            Self::PaymentSubmitted => "Payment submitted",
            Self::Paid => "Paid",
            Self::PaymentRejected => "Payment rejected",
            Self::Cancelled => "Cancelled",
            Self::StockUpdateFailed => "Stock update failed",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the customer may still change or cancel the order.
    pub fn is_open(self) -> bool {
        matches!(self, Self::PendingConfirmation | Self::AwaitingPayment)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
    #[serde(default, deserialize_with = "decimal_string::deserialize_option")]
    pub unit_price: Option<String>,
    #[serde(default, deserialize_with = "decimal_string::deserialize_option")]
    pub line_total: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default, deserialize_with = "decimal_string::deserialize")]
    pub total_amount: String,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub discount_percent: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Set once payment is confirmed and the invoice has been generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
}

impl Order {
    /// Human-facing order number, falling back to the id.
    pub fn number(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.id)
    }

    pub fn total(&self) -> Result<Money, MoneyError> {
        self.total_amount.parse()
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub store_id: String,
    pub customer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub items: Vec<OrderLine>,
    pub total_amount: String,
    pub currency: String,
    pub status: OrderStatus,
}

/// Response of `POST /orders/{id}/confirm-payment`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceReceipt {
    pub order: Order,
    pub invoice_url: String,
}

/// POS microservice operations used by the dialog engine and tools.
#[async_trait]
pub trait PosService: Send + Sync {
    async fn list_products(
        &self,
        store_id: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Product>, WahubError>;

    async fn get_product(&self, store_id: &str, product_id: &str) -> Result<Product, WahubError>;

    /// Products whose name contains `name` (service-side, case-insensitive).
    async fn search_products(&self, store_id: &str, name: &str) -> Result<Vec<Product>, WahubError>;

    async fn adjust_stock(
        &self,
        store_id: &str,
        product_id: &str,
        delta: i64,
    ) -> Result<(), WahubError>;

    async fn create_order(&self, order: &NewOrder) -> Result<Order, WahubError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, WahubError>;

    async fn update_order(&self, order: &Order) -> Result<Order, WahubError>;

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, WahubError>;

    async fn initiate_payment(&self, order_id: &str) -> Result<Order, WahubError>;

    async fn confirm_payment(&self, order_id: &str) -> Result<InvoiceReceipt, WahubError>;

    /// Most recent orders first. `customer = None` lists the whole store.
    async fn order_history(
        &self,
        store_id: &str,
        customer: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Order>, WahubError>;
}

#[cfg(test)]
pub(crate) mod testing;
