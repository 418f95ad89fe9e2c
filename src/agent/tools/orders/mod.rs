use crate::agent::tools::base::{Tool, ToolContext, ToolResult, require_str};
use crate::dialog::catalog::{ORDER_HISTORY_ROWS, invoice_document, order_history_list};
use crate::pos::{OrderStatus, PosService};
use crate::tenants::normalize_contact;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// Sends the customer's recent orders as a list.
pub struct OrderHistoryTool {
    pos: Arc<dyn PosService>,
}

impl OrderHistoryTool {
    pub fn new(pos: Arc<dyn PosService>) -> Self {
        Self { pos }
    }
}

#[async_trait]
impl Tool for OrderHistoryTool {
    fn name(&self) -> &str {
        "execute_get_order_history"
    }

    fn description(&self) -> &str {
        "Show the customer their recent orders with status and totals."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let orders = match self
            .pos
            .order_history(
                &ctx.tenant.store.store_id,
                Some(&ctx.user),
                ORDER_HISTORY_ROWS,
            )
            .await
        {
            Ok(o) => o,
            Err(e) => return Ok(ToolResult::error(format!("Error loading orders: {}", e))),
        };
        let Some(list) = order_history_list(&orders, &ctx.tenant.store.currency) else {
            return Ok(ToolResult::new("The customer has no orders yet."));
        };
        ctx.reply(list);
        let summary: Vec<Value> = orders
            .iter()
            .map(|o| {
                json!({
                    "orderId": o.id,
                    "orderNumber": o.number(),
                    "status": o.status.label(),
                    "total": o.total_amount,
                })
            })
            .collect();
        Ok(ToolResult::new(
            json!({"sent": true, "orders": summary}).to_string(),
        ))
    }
}

/// Sends the invoice PDF for a paid order belonging to the customer.
pub struct InvoiceTool {
    pos: Arc<dyn PosService>,
}

impl InvoiceTool {
    pub fn new(pos: Arc<dyn PosService>) -> Self {
        Self { pos }
    }
}

#[async_trait]
impl Tool for InvoiceTool {
    fn name(&self) -> &str {
        "execute_get_invoice"
    }

    fn description(&self) -> &str {
        "Send the customer the invoice PDF for one of their paid orders."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "orderId": {"type": "string", "description": "Order id"}
            },
            "required": ["orderId"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let order_id = require_str(&params, "orderId")?;
        let order = match self.pos.get_order(order_id).await {
            Ok(o) => o,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Error loading order {}: {}",
                    order_id, e
                )));
            }
        };
        if normalize_contact(&order.customer) != normalize_contact(&ctx.user) {
            return Ok(ToolResult::error(format!(
                "Error: order {} does not belong to this customer",
                order_id
            )));
        }
        match (&order.invoice_url, order.status) {
            (Some(url), _) => {
                ctx.reply(invoice_document(&order, url));
                Ok(ToolResult::new(format!(
                    "Invoice for order #{} sent.",
                    order.number()
                )))
            }
            (None, OrderStatus::Paid) => Ok(ToolResult::new(format!(
                "Order #{} is paid but its invoice is not ready yet.",
                order.number()
            ))),
            (None, status) => Ok(ToolResult::new(format!(
                "Order #{} has no invoice; its status is '{}'.",
                order.number(),
                status.label()
            ))),
        }
    }
}
