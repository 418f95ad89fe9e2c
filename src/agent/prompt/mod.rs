use crate::dialog::catalog::currency_for;
use crate::pos::Product;
use crate::tenants::TenantConfig;
use chrono::Utc;
use std::fmt::Write as _;

/// Products listed in the system prompt.
pub const PRODUCT_SNAPSHOT_LIMIT: usize = 20;

const RULES: &str = "\
## How to help
- Reply in the customer's language, in at most a few short sentences. This is WhatsApp.
- Only recommend products from the catalog below or returned by get_store_products.
- Never invent prices, stock or order numbers.
- To show a product, call display_product_info with its id.
- When the customer clearly wants to buy, call initiate_purchase with the product name.
- For past orders call execute_get_order_history; for an invoice call execute_get_invoice.
- If the customer asks where the store is, call send_location_message.
- If a tool returns an error, apologise briefly and suggest what the customer can do next.";

/// System prompt for one tenant: identity, business context, product
/// snapshot and tool rules.
pub fn build_system_prompt(tenant: &TenantConfig, products: &[Product]) -> String {
    let mut prompt = format!(
        "You are the WhatsApp assistant for {}. Today is {}.\n",
        tenant.display_name(),
        Utc::now().format("%A, %d %B %Y")
    );

    if let Some(context) = tenant
        .business_context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        prompt.push_str("\n## About the business\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    if let Some(location) = &tenant.store.location {
        let _ = writeln!(prompt, "\nStore address: {}", location.address);
    }

    prompt.push_str("\n## Catalog\n");
    if products.is_empty() {
        prompt.push_str("(catalog unavailable; use get_store_products)\n");
    } else {
        for (i, p) in products.iter().take(PRODUCT_SNAPSHOT_LIMIT).enumerate() {
            let _ = write!(
                prompt,
                "{}. {} (id {}): {} {}",
                i + 1,
                p.name,
                p.id,
                currency_for(p, tenant),
                p.price
            );
            if !p.in_stock() {
                prompt.push_str(" [sold out]");
            }
            prompt.push('\n');
        }
        if products.len() > PRODUCT_SNAPSHOT_LIMIT {
            let _ = writeln!(
                prompt,
                "...and {} more, see get_store_products.",
                products.len() - PRODUCT_SNAPSHOT_LIMIT
            );
        }
    }

    prompt.push('\n');
    prompt.push_str(RULES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::testing::product;
    use crate::tenants::TenantKind;

    #[test]
    fn test_prompt_contains_identity_context_and_catalog() {
        let mut tenant = TenantConfig::sample("t1", TenantKind::Pos);
        tenant.business_context = Some("Family kopitiam since 1968.".to_string());
        let mut sold_out = product("p2", "Kaya Toast", "3.20");
        sold_out.stock = Some(0);
        let prompt = build_system_prompt(&tenant, &[product("p1", "Kopi O", "1.80"), sold_out]);

        assert!(prompt.starts_with("You are the WhatsApp assistant for Ah Seng Kopi."));
        assert!(prompt.contains("Family kopitiam since 1968."));
        assert!(prompt.contains("1. Kopi O (id p1): SGD 1.80"));
        assert!(prompt.contains("2. Kaya Toast (id p2): SGD 3.20 [sold out]"));
        assert!(prompt.contains("initiate_purchase"));
    }

    #[test]
    fn test_prompt_caps_snapshot() {
        let tenant = TenantConfig::sample("t1", TenantKind::Pos);
        let products: Vec<Product> = (0..25)
            .map(|i| product(&format!("p{}", i), &format!("Item {}", i), "1.00"))
            .collect();
        let prompt = build_system_prompt(&tenant, &products);
        assert!(prompt.contains("20. Item 19"));
        assert!(!prompt.contains("Item 20 "));
        assert!(prompt.contains("...and 5 more"));
    }

    #[test]
    fn test_prompt_without_catalog() {
        let tenant = TenantConfig::sample("t1", TenantKind::Pos);
        assert!(build_system_prompt(&tenant, &[]).contains("catalog unavailable"));
    }
}
