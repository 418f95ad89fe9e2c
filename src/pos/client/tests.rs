use super::*;
use crate::errors::ErrorKind;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer, api_key: &str) -> HttpPosService {
    HttpPosService::new(&ServicesConfig {
        pos_base_url: server.uri(),
        pos_api_key: api_key.into(),
        ..ServicesConfig::default()
    })
}

fn order_json(status: &str) -> Value {
    json!({
        "id": "O1",
        "orderNumber": "1001",
        "storeId": "store-1",
        "customer": "6591234567",
        "items": [{"productId": "P1", "name": "Kaya Toast", "quantity": 1, "unitPrice": "3.50", "lineTotal": "3.50"}],
        "totalAmount": "3.50",
        "currency": "SGD",
        "status": status
    })
}

#[tokio::test]
async fn test_list_products_with_auth_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stores/store-1/products"))
        .and(query_param("limit", "5"))
        .and(query_param("category", "drinks"))
        .and(header("authorization", "Bearer pos-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [
                {"id": "P1", "name": "Kopi O", "price": 1.8, "stock": 3},
                {"id": "P2", "name": "Teh C", "price": "2.00"}
            ]
        })))
        .mount(&server)
        .await;

    let products = service(&server, "pos-key")
        .list_products("store-1", Some("drinks"), 5)
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].price, "1.8");
    assert_eq!(products[0].price().unwrap().to_string(), "1.80");
    assert!(products[1].in_stock());
}

#[tokio::test]
async fn test_search_products_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stores/store-1/products/search"))
        .and(query_param("name", "chicken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "P3", "name": "Chicken Rice", "price": "5.00"},
            {"id": "P4", "name": "Chicken Wings", "price": "6.50"}
        ])))
        .mount(&server)
        .await;

    let found = service(&server, "")
        .search_products("store-1", "chicken")
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_create_order_posts_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(json!({
            "storeId": "store-1",
            "customer": "6591234567",
            "items": [{"productId": "P1", "name": "Kaya Toast", "quantity": 1, "unitPrice": "3.50", "lineTotal": "3.50"}],
            "totalAmount": "3.50",
            "currency": "SGD",
            "status": "PENDING_CONFIRMATION"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(order_json("PENDING_CONFIRMATION")))
        .expect(1)
        .mount(&server)
        .await;

    let new_order = NewOrder {
        store_id: "store-1".into(),
        customer: "6591234567".into(),
        customer_name: None,
        items: vec![crate::pos::OrderLine {
            product_id: "P1".into(),
            name: "Kaya Toast".into(),
            quantity: 1,
            unit_price: Some("3.50".into()),
            line_total: Some("3.50".into()),
        }],
        total_amount: "3.50".into(),
        currency: "SGD".into(),
        status: OrderStatus::PendingConfirmation,
    };
    let order = service(&server, "").create_order(&new_order).await.unwrap();
    assert_eq!(order.id, "O1");
    assert_eq!(order.number(), "1001");
}

#[tokio::test]
async fn test_get_order_retries_once_on_5xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/O1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/O1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("AWAITING_PAYMENT")))
        .mount(&server)
        .await;

    let order = service(&server, "").get_order("O1").await.unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
}

#[tokio::test]
async fn test_create_order_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let new_order = NewOrder {
        store_id: "s".into(),
        customer: "c".into(),
        customer_name: None,
        items: vec![],
        total_amount: "0.00".into(),
        currency: "SGD".into(),
        status: OrderStatus::PendingConfirmation,
    };
    let err = service(&server, "").create_order(&new_order).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientExternal);
}

#[tokio::test]
async fn test_4xx_carries_truncated_detail() {
    let server = MockServer::start().await;
    let long = "x".repeat(3000);
    Mock::given(method("PATCH"))
        .and(path("/orders/O1/status"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": long})))
        .expect(1)
        .mount(&server)
        .await;

    let err = service(&server, "")
        .update_order_status("O1", OrderStatus::PaymentRejected)
        .await
        .unwrap_err();
    match err {
        WahubError::Permanent { status, detail, .. } => {
            assert_eq!(status, 422);
            assert_eq!(detail.chars().count(), crate::errors::MAX_DETAIL_CHARS);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_confirm_payment_returns_invoice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/O1/confirm-payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order": order_json("PAID"),
            "invoiceUrl": "https://pos.example.com/invoices/1001.pdf"
        })))
        .mount(&server)
        .await;

    let receipt = service(&server, "").confirm_payment("O1").await.unwrap();
    assert_eq!(receipt.order.status, OrderStatus::Paid);
    assert!(receipt.invoice_url.ends_with("1001.pdf"));
}

#[tokio::test]
async fn test_confirm_payment_without_invoice_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/O1/confirm-payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order": order_json("PAID"),
            "invoiceUrl": ""
        })))
        .mount(&server)
        .await;

    let err = service(&server, "").confirm_payment("O1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermanentExternal);
}

#[tokio::test]
async fn test_adjust_stock_sends_delta() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/stores/store-1/products/P1/stock"))
        .and(body_json(json!({"delta": -2})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    service(&server, "")
        .adjust_stock("store-1", "P1", -2)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_order_history_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stores/store-1/orders"))
        .and(query_param("customer", "6591234567"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": [order_json("PAID")]})))
        .mount(&server)
        .await;

    let orders = service(&server, "")
        .order_history("store-1", Some("6591234567"), 10)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}
