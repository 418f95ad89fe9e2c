//! In-memory POS double for unit tests.

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    products: Vec<Product>,
    orders: HashMap<String, Order>,
    next_order: u32,
    stock_calls: Vec<(String, i64)>,
}

#[derive(Default)]
pub(crate) struct InMemoryPos {
    state: Mutex<State>,
    pub fail_stock: std::sync::atomic::AtomicBool,
    pub fail_all: std::sync::atomic::AtomicBool,
}

pub(crate) fn product(id: &str, name: &str, price: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(format!("Freshly made {}", name.to_lowercase())),
        price: price.to_string(),
        currency: None,
        image_url: Some(format!("https://img.example/{}.jpg", id)),
        category: Some("drinks".to_string()),
        stock: Some(10),
    }
}

impl InMemoryPos {
    pub fn with_products(products: Vec<Product>) -> Self {
        let pos = Self::default();
        pos.state.lock().unwrap().products = products;
        pos
    }

    /// Kopi shop catalog used across dialog and tool tests.
    pub fn kopi() -> Self {
        Self::with_products(vec![
            product("p1", "Kopi O", "1.80"),
            product("p2", "Kopi C", "2.00"),
            product("p3", "Teh Tarik", "2.50"),
            product("p4", "Kaya Toast", "3.20"),
        ])
    }

    pub fn insert_order(&self, order: Order) {
        self.state
            .lock()
            .unwrap()
            .orders
            .insert(order.id.clone(), order);
    }

    pub fn order(&self, id: &str) -> Option<Order> {
        self.state.lock().unwrap().orders.get(id).cloned()
    }

    pub fn stock_calls(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().stock_calls.clone()
    }

    pub fn stock_of(&self, product_id: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .and_then(|p| p.stock)
    }

    fn check(&self) -> Result<(), WahubError> {
        if self.fail_all.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(WahubError::transient("pos", "connection refused"));
        }
        Ok(())
    }

    fn not_found(what: &str) -> WahubError {
        WahubError::permanent("pos", 404, &format!("{} not found", what))
    }
}

#[async_trait]
impl PosService for InMemoryPos {
    async fn list_products(
        &self,
        _store_id: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Product>, WahubError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .products
            .iter()
            .filter(|p| category.is_none_or(|c| p.category.as_deref() == Some(c)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_product(&self, _store_id: &str, product_id: &str) -> Result<Product, WahubError> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| Self::not_found("product"))
    }

    async fn search_products(&self, _store_id: &str, name: &str) -> Result<Vec<Product>, WahubError> {
        self.check()?;
        let needle = name.to_lowercase();
        Ok(self
            .state
            .lock()
            .unwrap()
            .products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn adjust_stock(
        &self,
        _store_id: &str,
        product_id: &str,
        delta: i64,
    ) -> Result<(), WahubError> {
        self.check()?;
        if self.fail_stock.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(WahubError::transient("pos", "stock service unavailable"));
        }
        let mut state = self.state.lock().unwrap();
        state.stock_calls.push((product_id.to_string(), delta));
        if let Some(p) = state.products.iter_mut().find(|p| p.id == product_id)
            && let Some(stock) = p.stock.as_mut()
        {
            *stock += delta;
        }
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<Order, WahubError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.next_order += 1;
        let id = format!("o{}", state.next_order);
        let created = Order {
            id: id.clone(),
            order_number: Some(format!("{}", 1000 + state.next_order)),
            store_id: order.store_id.clone(),
            customer: order.customer.clone(),
            customer_name: order.customer_name.clone(),
            items: order.items.clone(),
            total_amount: order.total_amount.clone(),
            currency: Some(order.currency.clone()),
            status: order.status,
            discount_percent: None,
            created_at: None,
            invoice_url: None,
        };
        state.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, WahubError> {
        self.check()?;
        self.order(order_id).ok_or_else(|| Self::not_found("order"))
    }

    async fn update_order(&self, order: &Order) -> Result<Order, WahubError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if !state.orders.contains_key(&order.id) {
            return Err(Self::not_found("order"));
        }
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order.clone())
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, WahubError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| Self::not_found("order"))?;
        order.status = status;
        Ok(order.clone())
    }

    async fn initiate_payment(&self, order_id: &str) -> Result<Order, WahubError> {
        self.update_order_status(order_id, OrderStatus::AwaitingPayment)
            .await
    }

    async fn confirm_payment(&self, order_id: &str) -> Result<InvoiceReceipt, WahubError> {
        let mut order = self.update_order_status(order_id, OrderStatus::Paid).await?;
        let url = format!("https://pos.example/invoices/{}.pdf", order_id);
        order.invoice_url = Some(url.clone());
        self.insert_order(order.clone());
        Ok(InvoiceReceipt {
            order,
            invoice_url: url,
        })
    }

    async fn order_history(
        &self,
        _store_id: &str,
        customer: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Order>, WahubError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| customer.is_none_or(|c| o.customer == c))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        orders.truncate(limit);
        Ok(orders)
    }
}
