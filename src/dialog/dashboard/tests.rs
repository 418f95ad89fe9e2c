use super::*;

fn order(id: &str, customer: &str, total: &str, status: OrderStatus) -> Order {
    Order {
        id: id.to_string(),
        order_number: Some(id.to_uppercase()),
        store_id: "store-1".to_string(),
        customer: customer.to_string(),
        customer_name: None,
        items: Vec::new(),
        total_amount: total.to_string(),
        currency: Some("SGD".to_string()),
        status,
        discount_percent: None,
        created_at: None,
        invoice_url: None,
    }
}

fn sample() -> Vec<Order> {
    vec![
        order("o1", "6511111111", "3.50", OrderStatus::Paid),
        order("o2", "6522222222", "10.00", OrderStatus::Paid),
        order("o3", "6511111111", "4.00", OrderStatus::Paid),
        order("o4", "6533333333", "2.00", OrderStatus::AwaitingPayment),
        order("o5", "6533333333", "2.00", OrderStatus::Cancelled),
    ]
}

#[test]
fn test_stats() {
    let text = stats_view(&sample(), "SGD");
    assert!(text.contains("Paid: 3"));
    assert!(text.contains("Awaiting payment: 1"));
    assert!(text.contains("Revenue: SGD 17.50"));
    assert!(text.contains("Average order: SGD 5.83"));
}

#[test]
fn test_customers_ranked_by_spend() {
    let text = customers_view(&sample(), "SGD");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], "6522222222 · 1 order · SGD 10.00");
    assert_eq!(lines[2], "6511111111 · 2 orders · SGD 7.50");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_orders_view() {
    let text = orders_view(&sample(), "SGD");
    assert!(text.contains("#O1 · Paid · SGD 3.50 · 6511111111"));
    assert_eq!(orders_view(&[], "SGD"), "No orders yet.");
}

#[test]
fn test_empty_views() {
    assert_eq!(customers_view(&[], "SGD"), "No paying customers yet.");
    assert!(stats_view(&[], "SGD").contains("Average order: SGD 0.00"));
}
