//! POS actions and the interactive action-id grammar that selects them.

/// Owner dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Orders,
    Customers,
    Stats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosAction {
    ViewProducts,
    SelectProduct(String),
    AskProduct(String),
    BuyProduct(String),
    /// `buy <name>` typed by the customer.
    BuyByName {
        name: String,
        quantity: u32,
    },
    /// `product <name>` typed by the customer.
    ShowProductByName(String),
    ConfirmOrder(String),
    ChangeQuantity {
        order_id: String,
        product_id: String,
    },
    UpdateQuantity {
        order_id: String,
        product_id: String,
        quantity: u32,
    },
    OrderHistory,
    OrderDetail(String),
    CancelOrder(String),
    PaymentDone(String),
    OwnerConfirmPayment(String),
    OwnerRejectPayment(String),
    /// Owner wants to write to this customer contact.
    OwnerReply(String),
    /// Customer wants to answer the owner, optionally about an order.
    CustomerResponse(Option<String>),
    DashboardMenu,
    Dashboard(DashboardView),
    RequestDiscount,
    DiscountApprove(String),
    DiscountReject(String),
    TodaysOffer,
    SendGreeting(String),
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl PosAction {
    /// Parse an interactive reply id. Order ids never contain `_`, product
    /// ids and contacts may.
    pub fn from_action_id(id: &str) -> Option<Self> {
        let id = id.trim();
        match id {
            "view_products" => return Some(Self::ViewProducts),
            "order_history" => return Some(Self::OrderHistory),
            "dashboard_orders" => return Some(Self::Dashboard(DashboardView::Orders)),
            "dashboard_customers" => return Some(Self::Dashboard(DashboardView::Customers)),
            "dashboard_stats" => return Some(Self::Dashboard(DashboardView::Stats)),
            "todays_offer" => return Some(Self::TodaysOffer),
            _ => {}
        }

        if let Some(rest) = id.strip_prefix("update_quantity_") {
            let (head, n) = rest.rsplit_once('_')?;
            let (order_id, product_id) = head.split_once('_')?;
            let quantity = n.parse().ok()?;
            if order_id.is_empty() || product_id.is_empty() {
                return None;
            }
            return Some(Self::UpdateQuantity {
                order_id: order_id.to_string(),
                product_id: product_id.to_string(),
                quantity,
            });
        }
        if let Some(rest) = id.strip_prefix("change_quantity_") {
            let (order_id, product_id) = rest.split_once('_')?;
            if order_id.is_empty() || product_id.is_empty() {
                return None;
            }
            return Some(Self::ChangeQuantity {
                order_id: order_id.to_string(),
                product_id: product_id.to_string(),
            });
        }
        if let Some(rest) = id.strip_prefix("customer_response_") {
            return Some(Self::CustomerResponse(
                non_empty(rest).filter(|o| o != "none"),
            ));
        }

        let prefixed: [(&str, fn(String) -> Self); 13] = [
            ("select_product_", Self::SelectProduct),
            ("ask_product_", Self::AskProduct),
            ("buy_product_", Self::BuyProduct),
            ("confirm_order_", Self::ConfirmOrder),
            ("order_detail_", Self::OrderDetail),
            ("cancel_order_", Self::CancelOrder),
            ("payment_done_", Self::PaymentDone),
            ("owner_confirm_payment_", Self::OwnerConfirmPayment),
            ("owner_reject_payment_", Self::OwnerRejectPayment),
            ("owner_reply_", Self::OwnerReply),
            ("discount_approve_", Self::DiscountApprove),
            ("discount_reject_", Self::DiscountReject),
            ("send_greeting_", Self::SendGreeting),
        ];
        prefixed.iter().find_map(|(prefix, make)| {
            id.strip_prefix(prefix).and_then(non_empty).map(make)
        })
    }

    /// Actions only the tenant owner may trigger.
    pub fn owner_only(&self) -> bool {
        matches!(
            self,
            Self::OwnerConfirmPayment(_)
                | Self::OwnerRejectPayment(_)
                | Self::OwnerReply(_)
                | Self::DashboardMenu
                | Self::Dashboard(_)
                | Self::DiscountApprove(_)
                | Self::DiscountReject(_)
                | Self::SendGreeting(_)
        )
    }
}
