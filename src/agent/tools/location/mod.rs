use crate::agent::tools::base::{Tool, ToolContext, ToolResult, optional_f64, optional_str};
use crate::whatsapp::OutboundItem;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Sends a location pin, defaulting to the store's own address.
pub struct SendLocationTool;

#[async_trait]
impl Tool for SendLocationTool {
    fn name(&self) -> &str {
        "send_location_message"
    }

    fn description(&self) -> &str {
        "Send the customer a map pin. Without coordinates the store's own location is sent."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "latitude": {"type": "number"},
                "longitude": {"type": "number"},
                "name": {"type": "string", "description": "Place name"},
                "address": {"type": "string", "description": "Street address"}
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let store = ctx.tenant.store.location.as_ref();
        let coords = match (
            optional_f64(&params, "latitude"),
            optional_f64(&params, "longitude"),
        ) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => store.map(|s| (s.latitude, s.longitude)),
        };
        let Some((latitude, longitude)) = coords else {
            return Ok(ToolResult::error(
                "Error: no coordinates given and the store has no location configured",
            ));
        };
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Ok(ToolResult::error(format!(
                "Error: coordinates out of range ({}, {})",
                latitude, longitude
            )));
        }

        let name = optional_str(&params, "name")
            .map(str::to_string)
            .or_else(|| store.map(|s| s.name.clone()));
        let address = optional_str(&params, "address")
            .map(str::to_string)
            .or_else(|| store.map(|s| s.address.clone()));
        let label = name.clone().unwrap_or_else(|| "the location".to_string());

        ctx.reply(OutboundItem::Location {
            latitude,
            longitude,
            name,
            address,
        });
        Ok(ToolResult::new(format!("Location of {} sent.", label)))
    }
}
