use crate::config::ServicesConfig;
use crate::errors::WahubError;
use crate::pos::{InvoiceReceipt, NewOrder, Order, OrderStatus, PosService, Product};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "pos";

/// JSON/HTTP client for the POS microservice.
pub struct HttpPosService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPosService {
    pub fn new(config: &ServicesConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.pos_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: config.pos_base_url.trim_end_matches('/').to_string(),
            api_key: config.pos_api_key.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, WahubError> {
        let resp = req
            .send()
            .await
            .map_err(|e| WahubError::transient(SERVICE, e))?;
        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let text = resp
            .text()
            .await
            .map_err(|e| WahubError::transient(SERVICE, e))?;
        if !status.is_success() {
            let detail = error_detail(&text);
            warn!("pos request failed ({}): {}", status, detail);
            return Err(WahubError::from_status(
                SERVICE,
                status.as_u16(),
                retry_after,
                &detail,
            ));
        }
        let body = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(body)
            .map_err(|e| WahubError::transient(SERVICE, format!("unexpected response: {}", e)))
    }

    /// Send an idempotent request, retrying once on a transient failure.
    async fn send_idempotent<T: DeserializeOwned>(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, WahubError> {
        match self.execute(build()).await {
            Err(e) if e.is_retryable() => {
                debug!("retrying pos request after transient error: {}", e);
                self.execute(build()).await
            }
            other => other,
        }
    }
}

/// Backend detail from `{"message": ...}` / `{"error": ...}` bodies, else the raw text.
fn error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .or_else(|| v.get("detail"))
        })
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Lists come back either bare or wrapped as `{"products": [...]}` / `{"orders": [...]}`.
fn unwrap_list<T: DeserializeOwned>(value: Value, key: &str) -> Result<Vec<T>, WahubError> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => {
            return Err(WahubError::transient(
                SERVICE,
                format!("unexpected list response: {}", other),
            ));
        }
    };
    serde_json::from_value(list)
        .map_err(|e| WahubError::transient(SERVICE, format!("unexpected {}: {}", key, e)))
}

fn encode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[async_trait]
impl PosService for HttpPosService {
    async fn list_products(
        &self,
        store_id: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Product>, WahubError> {
        let path = format!("/stores/{}/products", encode(store_id));
        let value: Value = self
            .send_idempotent(|| {
                let mut req = self
                    .request(Method::GET, &path)
                    .query(&[("limit", limit.to_string())]);
                if let Some(category) = category {
                    req = req.query(&[("category", category)]);
                }
                req
            })
            .await?;
        unwrap_list(value, "products")
    }

    async fn get_product(&self, store_id: &str, product_id: &str) -> Result<Product, WahubError> {
        let path = format!(
            "/stores/{}/products/{}",
            encode(store_id),
            encode(product_id)
        );
        self.send_idempotent(|| self.request(Method::GET, &path))
            .await
    }

    async fn search_products(&self, store_id: &str, name: &str) -> Result<Vec<Product>, WahubError> {
        let path = format!("/stores/{}/products/search", encode(store_id));
        let value: Value = self
            .send_idempotent(|| self.request(Method::GET, &path).query(&[("name", name)]))
            .await?;
        unwrap_list(value, "products")
    }

    async fn adjust_stock(
        &self,
        store_id: &str,
        product_id: &str,
        delta: i64,
    ) -> Result<(), WahubError> {
        let path = format!(
            "/stores/{}/products/{}/stock",
            encode(store_id),
            encode(product_id)
        );
        let _: Value = self
            .execute(
                self.request(Method::PATCH, &path)
                    .json(&json!({ "delta": delta })),
            )
            .await?;
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<Order, WahubError> {
        self.execute(self.request(Method::POST, "/orders").json(order))
            .await
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, WahubError> {
        let path = format!("/orders/{}", encode(order_id));
        self.send_idempotent(|| self.request(Method::GET, &path))
            .await
    }

    async fn update_order(&self, order: &Order) -> Result<Order, WahubError> {
        let path = format!("/orders/{}", encode(&order.id));
        self.send_idempotent(|| self.request(Method::PUT, &path).json(order))
            .await
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, WahubError> {
        let path = format!("/orders/{}/status", encode(order_id));
        self.send_idempotent(|| {
            self.request(Method::PATCH, &path)
                .json(&json!({ "status": status }))
        })
        .await
    }

    async fn initiate_payment(&self, order_id: &str) -> Result<Order, WahubError> {
        let path = format!("/orders/{}/payment", encode(order_id));
        self.send_idempotent(|| self.request(Method::POST, &path))
            .await
    }

    async fn confirm_payment(&self, order_id: &str) -> Result<InvoiceReceipt, WahubError> {
        let path = format!("/orders/{}/confirm-payment", encode(order_id));
        let receipt: InvoiceReceipt = self
            .send_idempotent(|| self.request(Method::POST, &path))
            .await?;
        if receipt.invoice_url.trim().is_empty() {
            return Err(WahubError::permanent(
                SERVICE,
                200,
                "confirm-payment returned no invoice URL",
            ));
        }
        Ok(receipt)
    }

    async fn order_history(
        &self,
        store_id: &str,
        customer: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Order>, WahubError> {
        let path = format!("/stores/{}/orders", encode(store_id));
        let value: Value = self
            .send_idempotent(|| {
                let mut req = self
                    .request(Method::GET, &path)
                    .query(&[("limit", limit.to_string())]);
                if let Some(customer) = customer {
                    req = req.query(&[("customer", customer)]);
                }
                req
            })
            .await?;
        unwrap_list(value, "orders")
    }
}

#[cfg(test)]
mod tests;
