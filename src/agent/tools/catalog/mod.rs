use crate::agent::tools::base::{
    Tool, ToolContext, ToolResult, optional_str, optional_u64, require_str,
};
use crate::dialog::catalog::{
    ProductMatch, clarification, currency_for, product_card, product_list,
    resolve_product_by_name,
};
use crate::pos::{MAX_QUANTITY, PosService, Product};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

const DEFAULT_PRODUCT_LIMIT: u64 = 10;
const MAX_PRODUCT_LIMIT: u64 = 20;

fn summarize(product: &Product, currency: &str) -> Value {
    json!({
        "id": product.id,
        "name": product.name,
        "price": product.price,
        "currency": currency,
        "category": product.category,
        "inStock": product.in_stock(),
        "description": product.description,
    })
}

/// Catalog lookup for the model; nothing is sent to the user.
pub struct GetStoreProductsTool {
    pos: Arc<dyn PosService>,
}

impl GetStoreProductsTool {
    pub fn new(pos: Arc<dyn PosService>) -> Self {
        Self { pos }
    }
}

#[async_trait]
impl Tool for GetStoreProductsTool {
    fn name(&self) -> &str {
        "get_store_products"
    }

    fn description(&self) -> &str {
        "List products sold by this store with prices and stock. Use this to answer questions \
         about what the store sells before recommending anything."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "Only return products in this category"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_PRODUCT_LIMIT,
                    "description": "Maximum number of products (default 10)"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let category = optional_str(&params, "category");
        let limit = optional_u64(&params, "limit")
            .unwrap_or(DEFAULT_PRODUCT_LIMIT)
            .clamp(1, MAX_PRODUCT_LIMIT);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let products = match self
            .pos
            .list_products(&ctx.tenant.store.store_id, category, limit)
            .await
        {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(format!("Error loading products: {}", e))),
        };
        if products.is_empty() {
            return Ok(ToolResult::new(match category {
                Some(c) => format!("No products found in category '{}'.", c),
                None => "This store has no products listed.".to_string(),
            }));
        }
        let items: Vec<Value> = products
            .iter()
            .map(|p| summarize(p, currency_for(p, &ctx.tenant)))
            .collect();
        Ok(ToolResult::new(
            json!({"count": items.len(), "products": items}).to_string(),
        ))
    }
}

/// Sends a product card with Buy Now / Ask a Question / View All buttons.
pub struct DisplayProductInfoTool {
    pos: Arc<dyn PosService>,
}

impl DisplayProductInfoTool {
    pub fn new(pos: Arc<dyn PosService>) -> Self {
        Self { pos }
    }
}

#[async_trait]
impl Tool for DisplayProductInfoTool {
    fn name(&self) -> &str {
        "display_product_info"
    }

    fn description(&self) -> &str {
        "Show the customer a product card with its image, price and a Buy Now button. \
         Use the product id from get_store_products."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "productId": {"type": "string", "description": "Product id"},
                "intro": {
                    "type": "string",
                    "description": "Optional short sentence shown above the product"
                }
            },
            "required": ["productId"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let product_id = require_str(&params, "productId")?;
        let intro = optional_str(&params, "intro");
        let product = match self
            .pos
            .get_product(&ctx.tenant.store.store_id, product_id)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Error loading product {}: {}",
                    product_id, e
                )));
            }
        };
        ctx.reply(product_card(
            &product,
            currency_for(&product, &ctx.tenant),
            intro,
        ));
        Ok(ToolResult::new(format!(
            "Product card for '{}' sent to the customer.",
            product.name
        )))
    }
}

/// Sends the product list message.
pub struct SuggestViewAllProductsTool {
    pos: Arc<dyn PosService>,
}

impl SuggestViewAllProductsTool {
    pub fn new(pos: Arc<dyn PosService>) -> Self {
        Self { pos }
    }
}

#[async_trait]
impl Tool for SuggestViewAllProductsTool {
    fn name(&self) -> &str {
        "suggest_view_all_products"
    }

    fn description(&self) -> &str {
        "Send the customer a tappable list of the store's products."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let products = match self
            .pos
            .list_products(
                &ctx.tenant.store.store_id,
                None,
                crate::dialog::catalog::PRODUCT_LIST_ROWS,
            )
            .await
        {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(format!("Error loading products: {}", e))),
        };
        match product_list(&products, &ctx.tenant) {
            Some(item) => {
                ctx.reply(item);
                Ok(ToolResult::new(format!(
                    "Product list with {} items sent to the customer.",
                    products.len()
                )))
            }
            None => Ok(ToolResult::new("This store has no products listed.")),
        }
    }
}

/// Starts a purchase from a product name.
pub struct InitiatePurchaseTool {
    pos: Arc<dyn PosService>,
}

impl InitiatePurchaseTool {
    pub fn new(pos: Arc<dyn PosService>) -> Self {
        Self { pos }
    }
}

#[async_trait]
impl Tool for InitiatePurchaseTool {
    fn name(&self) -> &str {
        "initiate_purchase"
    }

    fn description(&self) -> &str {
        "Start buying a product by name when the customer clearly wants to order it. \
         Sends the product with a Buy Now button, or asks the customer to pick when the \
         name matches several products."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "productName": {"type": "string", "description": "Name of the product"},
                "quantity": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_QUANTITY,
                    "description": "How many (default 1)"
                }
            },
            "required": ["productName"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let name = require_str(&params, "productName")?;
        let quantity = optional_u64(&params, "quantity").unwrap_or(1);
        if quantity == 0 || quantity > u64::from(MAX_QUANTITY) {
            return Ok(ToolResult::error(format!(
                "Error: quantity must be between 1 and {}",
                MAX_QUANTITY
            )));
        }

        let found =
            match resolve_product_by_name(self.pos.as_ref(), &ctx.tenant.store.store_id, name)
                .await
            {
                Ok(m) => m,
                Err(e) => return Ok(ToolResult::error(format!("Error searching products: {}", e))),
            };
        match found {
            ProductMatch::Found(product) => {
                if !product.in_stock() {
                    return Ok(ToolResult::new(format!(
                        "'{}' is sold out. Tell the customer and suggest something else.",
                        product.name
                    )));
                }
                let intro = (quantity > 1)
                    .then(|| format!("You asked for {} x {}.", quantity, product.name));
                ctx.reply(product_card(
                    &product,
                    currency_for(&product, &ctx.tenant),
                    intro.as_deref(),
                ));
                Ok(ToolResult::new(format!(
                    "Sent '{}' with a Buy Now button. The customer taps it to place the order.",
                    product.name
                )))
            }
            ProductMatch::Ambiguous(candidates) => {
                ctx.outbox
                    .push_text(&ctx.user, clarification(name, &candidates));
                Ok(ToolResult::new(format!(
                    "Several products match '{}'; asked the customer to choose.",
                    name
                )))
            }
            ProductMatch::NotFound => Ok(ToolResult::new(format!(
                "No product named '{}' was found.",
                name
            ))),
        }
    }
}
