use crate::agent::tools::ToolRegistry;
use crate::agent::tools::catalog::{
    DisplayProductInfoTool, GetStoreProductsTool, InitiatePurchaseTool,
    SuggestViewAllProductsTool,
};
use crate::agent::tools::location::SendLocationTool;
use crate::agent::tools::orders::{InvoiceTool, OrderHistoryTool};
use crate::config::AgentConfig;
use crate::pos::PosService;
use std::sync::Arc;
use tracing::info;

/// Build the registry holding the POS tool set.
pub fn register_pos_tools(pos: &Arc<dyn PosService>, config: &AgentConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::with_limits(
        config.tool_timeout(),
        config.max_tool_result_chars,
    );

    tools.register(Arc::new(GetStoreProductsTool::new(pos.clone())));
    tools.register(Arc::new(DisplayProductInfoTool::new(pos.clone())));
    tools.register(Arc::new(SuggestViewAllProductsTool::new(pos.clone())));
    tools.register(Arc::new(InitiatePurchaseTool::new(pos.clone())));
    tools.register(Arc::new(OrderHistoryTool::new(pos.clone())));
    tools.register(Arc::new(InvoiceTool::new(pos.clone())));
    tools.register(Arc::new(SendLocationTool));

    info!("registered {} POS tools", tools.tool_names().len());
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::testing::InMemoryPos;

    #[test]
    fn test_registers_all_seven_tools() {
        let pos: Arc<dyn PosService> = Arc::new(InMemoryPos::kopi());
        let tools = register_pos_tools(&pos, &AgentConfig::default());
        assert_eq!(
            tools.tool_names(),
            vec![
                "display_product_info",
                "execute_get_invoice",
                "execute_get_order_history",
                "get_store_products",
                "initiate_purchase",
                "send_location_message",
                "suggest_view_all_products",
            ]
        );
    }
}
