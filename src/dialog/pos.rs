//! POS tenant: interactive actions, keyword shortcuts and the LLM fallback.

use super::actions::{DashboardView, PosAction};
use super::catalog::{
    ORDER_HISTORY_ROWS, PRODUCT_LIST_ROWS, ProductMatch, clarification, currency_for,
    invoice_document, order_detail, order_history_list, order_summary, product_card,
    product_list, quantity_picker, resolve_product_by_name,
};
use super::dashboard::{self, DASHBOARD_ORDER_WINDOW};
use super::rules::{TextRoute, route_text};
use super::state::{DialogState, PosState};
use super::{DialogEngine, PeerUpdate, TurnCtx};
use crate::agent::prompt::PRODUCT_SNAPSHOT_LIMIT;
use crate::errors::WahubError;
use crate::pos::{
    Money, Order, OrderStatus, Product, apply_discount, build_order, lines_missing_price,
    set_quantity,
};
use crate::session::record::{CartDraft, RelayTarget};
use crate::tenants::normalize_contact;
use crate::utils::truncate_chars;
use crate::whatsapp::{Button, InboundKind, MAX_BODY_CHARS, OutboundItem};
use std::collections::HashMap;
use tracing::{info, warn};

const UNKNOWN_CHOICE: &str =
    "Sorry, I didn't recognise that option. Type *menu* to see our products or ask me anything.";
const UNSUPPORTED_MESSAGE: &str =
    "Sorry, I can only read text messages here. Type *menu* to see our products.";
const OWNER_ONLY: &str = "Sorry, that option is only available to the store owner.";
const OWNER_CANNOT_ORDER: &str = "This number is registered as the store owner, so it can't \
place customer orders. Please use a different number to order.";

fn pos_state(state: PosState) -> DialogState {
    DialogState::Pos(state)
}

impl DialogEngine {
    pub(super) async fn pos_turn(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        if t.record.state == pos_state(PosState::Terminal) {
            t.set_state(pos_state(PosState::Start));
        }

        let inbound = t.inbound;
        match &inbound.kind {
            InboundKind::Interactive { action_id, .. } => {
                match PosAction::from_action_id(action_id) {
                    Some(action) => self.pos_action(t, action).await,
                    None => {
                        info!(
                            "tenant {}: unknown action id '{}'",
                            t.tenant.tenant_id, action_id
                        );
                        t.reply_text(UNKNOWN_CHOICE);
                        Ok(())
                    }
                }
            }
            InboundKind::Text { body } => {
                match route_text(body, &t.record.scratch, t.is_owner()) {
                    TextRoute::Relay(target) => {
                        self.relay(t, &target, body);
                        Ok(())
                    }
                    TextRoute::Action(action) => self.pos_action(t, action).await,
                    TextRoute::Llm => self.llm_turn(t).await,
                }
            }
            _ => {
                t.reply_text(UNSUPPORTED_MESSAGE);
                Ok(())
            }
        }
    }

    async fn pos_action(&self, t: &mut TurnCtx<'_>, action: PosAction) -> Result<(), WahubError> {
        if action.owner_only() && !t.is_owner() {
            warn!(
                "tenant {}: {} tried owner action {:?}",
                t.tenant.tenant_id, t.record.user, action
            );
            t.reply_text(OWNER_ONLY);
            return Ok(());
        }

        match action {
            PosAction::ViewProducts => self.view_products(t).await,
            PosAction::SelectProduct(id) => {
                let product = self.pos.get_product(&t.tenant.store.store_id, &id).await?;
                self.show_product(t, &product);
                Ok(())
            }
            PosAction::ShowProductByName(name) => {
                match resolve_product_by_name(self.pos.as_ref(), &t.tenant.store.store_id, &name)
                    .await?
                {
                    ProductMatch::Found(product) => {
                        self.show_product(t, &product);
                        Ok(())
                    }
                    ProductMatch::Ambiguous(candidates) => {
                        t.reply_text(clarification(&name, &candidates));
                        Ok(())
                    }
                    ProductMatch::NotFound => self.llm_turn(t).await,
                }
            }
            PosAction::AskProduct(id) => {
                let product = self.pos.get_product(&t.tenant.store.store_id, &id).await?;
                t.set_state(pos_state(PosState::ViewingProduct));
                t.reply_text(format!(
                    "What would you like to know about {}? Just type your question.",
                    product.name
                ));
                Ok(())
            }
            PosAction::BuyProduct(id) => {
                let product = self.pos.get_product(&t.tenant.store.store_id, &id).await?;
                self.place_order(t, &product, 1).await
            }
            PosAction::BuyByName { name, quantity } => {
                match resolve_product_by_name(self.pos.as_ref(), &t.tenant.store.store_id, &name)
                    .await?
                {
                    ProductMatch::Found(product) => self.place_order(t, &product, quantity).await,
                    ProductMatch::Ambiguous(candidates) => {
                        t.reply_text(clarification(&name, &candidates));
                        Ok(())
                    }
                    ProductMatch::NotFound => self.llm_turn(t).await,
                }
            }
            PosAction::ConfirmOrder(order_id) => self.confirm_order(t, &order_id).await,
            PosAction::ChangeQuantity {
                order_id,
                product_id,
            } => {
                let Some(order) = self.customer_order(t, &order_id).await? else {
                    return Ok(());
                };
                if !order.status.is_open() {
                    t.reply_text("That order can no longer be changed.");
                    return Ok(());
                }
                let name = order
                    .items
                    .iter()
                    .find(|l| l.product_id == product_id)
                    .map_or_else(|| "this item".to_string(), |l| l.name.clone());
                t.set_state(pos_state(PosState::Ordering));
                t.reply(quantity_picker(&order.id, &product_id, &name));
                Ok(())
            }
            PosAction::UpdateQuantity {
                order_id,
                product_id,
                quantity,
            } => self.update_quantity(t, &order_id, &product_id, quantity).await,
            PosAction::OrderHistory => {
                let orders = self
                    .pos
                    .order_history(
                        &t.tenant.store.store_id,
                        Some(&t.record.user),
                        ORDER_HISTORY_ROWS,
                    )
                    .await?;
                t.set_state(pos_state(PosState::Browsing));
                match order_history_list(&orders, &t.tenant.store.currency) {
                    Some(list) => t.reply(list),
                    None => t.reply_text("You haven't placed any orders yet. Type *menu* to start."),
                }
                Ok(())
            }
            PosAction::OrderDetail(order_id) => {
                let Some(order) = self.customer_order(t, &order_id).await? else {
                    return Ok(());
                };
                let currency = t.tenant.store.currency.clone();
                t.reply_text(order_detail(&order, &currency));
                if let Some(url) = &order.invoice_url {
                    t.reply(invoice_document(&order, url));
                }
                Ok(())
            }
            PosAction::CancelOrder(order_id) => self.cancel_order(t, &order_id).await,
            PosAction::PaymentDone(order_id) => self.payment_done(t, &order_id).await,
            PosAction::OwnerConfirmPayment(order_id) => {
                self.owner_confirm_payment(t, &order_id).await;
                Ok(())
            }
            PosAction::OwnerRejectPayment(order_id) => {
                self.owner_reject_payment(t, &order_id).await;
                Ok(())
            }
            PosAction::OwnerReply(contact) => {
                t.record.scratch.relay_to = Some(RelayTarget {
                    contact: normalize_contact(&contact),
                    order_id: None,
                });
                t.set_state(pos_state(PosState::AwaitingCustomerMessage));
                t.reply_text(format!(
                    "Type your message for {}. I'll forward it as-is.",
                    contact
                ));
                Ok(())
            }
            PosAction::CustomerResponse(order_id) => {
                let Some(owner) = t.owner() else {
                    t.reply_text("Sorry, the store can't receive messages here right now.");
                    return Ok(());
                };
                t.record.scratch.relay_to = Some(RelayTarget {
                    contact: owner,
                    order_id,
                });
                t.set_state(pos_state(PosState::AwaitingCustomerMessage));
                t.reply_text("Type your message for the store and I'll pass it on.");
                Ok(())
            }
            PosAction::DashboardMenu => {
                t.reply(dashboard::menu());
                Ok(())
            }
            PosAction::Dashboard(view) => {
                let orders = self
                    .pos
                    .order_history(&t.tenant.store.store_id, None, DASHBOARD_ORDER_WINDOW)
                    .await?;
                let currency = t.tenant.store.currency.clone();
                t.reply_text(match view {
                    DashboardView::Orders => dashboard::orders_view(&orders, &currency),
                    DashboardView::Customers => dashboard::customers_view(&orders, &currency),
                    DashboardView::Stats => dashboard::stats_view(&orders, &currency),
                });
                Ok(())
            }
            PosAction::RequestDiscount => self.request_discount(t).await,
            PosAction::DiscountApprove(order_id) => self.approve_discount(t, &order_id).await,
            PosAction::DiscountReject(order_id) => {
                let order = self.pos.get_order(&order_id).await?;
                t.send_to(
                    &order.customer,
                    OutboundItem::text(format!(
                        "Sorry, the store can't offer a discount on order #{}. Your order is still reserved for you.",
                        order.number()
                    )),
                );
                t.peer(PeerUpdate::for_user(&order.customer).note("discount request declined"));
                t.reply_text(format!(
                    "Discount request for order #{} declined.",
                    order.number()
                ));
                Ok(())
            }
            PosAction::TodaysOffer => self.todays_offer(t).await,
            PosAction::SendGreeting(contact) => {
                let contact = normalize_contact(&contact);
                t.send_to(
                    &contact,
                    OutboundItem::text(format!(
                        "Thank you for your order from {}! We hope to see you again soon. 😊",
                        t.tenant.display_name()
                    )),
                );
                t.reply_text("Greeting sent. 👍");
                Ok(())
            }
        }
    }

    async fn view_products(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let products = self
            .pos
            .list_products(&t.tenant.store.store_id, None, PRODUCT_LIST_ROWS)
            .await?;
        t.set_state(pos_state(PosState::Browsing));
        match product_list(&products, t.tenant) {
            Some(list) => t.reply(list),
            None => t.reply_text("We don't have any products listed right now. Please check back soon!"),
        }
        Ok(())
    }

    fn show_product(&self, t: &mut TurnCtx<'_>, product: &Product) {
        let card = product_card(product, currency_for(product, t.tenant), None);
        t.set_state(pos_state(PosState::ViewingProduct));
        t.reply(card);
    }

    /// Create the order, then reserve stock line by line.
    async fn place_order(
        &self,
        t: &mut TurnCtx<'_>,
        product: &Product,
        quantity: u32,
    ) -> Result<(), WahubError> {
        if t.is_owner() && !t.tenant.store.allow_owner_as_customer {
            t.reply_text(OWNER_CANNOT_ORDER);
            return Ok(());
        }
        if !product.in_stock() {
            t.reply_text(format!(
                "Sorry, {} is sold out right now. Type *menu* to see what else we have.",
                product.name
            ));
            return Ok(());
        }

        let store_id = t.tenant.store.store_id.clone();
        let currency = currency_for(product, t.tenant).to_string();
        let new_order = match build_order(
            &store_id,
            &t.record.user,
            t.inbound.profile_name.clone(),
            &currency,
            &[(product.clone(), quantity)],
        ) {
            Ok(o) => o,
            Err(e) => {
                warn!("tenant {}: cannot price {}: {}", t.tenant.tenant_id, product.id, e);
                t.reply_text(format!(
                    "Sorry, {} can't be ordered right now. Please try another item.",
                    product.name
                ));
                return Ok(());
            }
        };

        let order = self.pos.create_order(&new_order).await?;
        info!(
            "tenant {}: order {} created for {}",
            t.tenant.tenant_id, order.id, t.record.user
        );

        for line in &order.items {
            if let Err(e) = self
                .pos
                .adjust_stock(&store_id, &line.product_id, -i64::from(line.quantity))
                .await
            {
                warn!(
                    "tenant {}: stock update failed for order {}: {}",
                    t.tenant.tenant_id, order.id, e
                );
                if let Err(e) = self
                    .pos
                    .update_order_status(&order.id, OrderStatus::StockUpdateFailed)
                    .await
                {
                    warn!("could not flag order {}: {}", order.id, e);
                }
                t.record.note(format!("stock update failed for order {}: {}", order.id, e));
                t.reply_text(format!(
                    "Your order #{} was created, but we couldn't reserve the stock. The store will contact you shortly.",
                    order.number()
                ));
                return Ok(());
            }
        }

        t.record.scratch.cart = Some(CartDraft {
            order_id: order.id.clone(),
            product_id: product.id.clone(),
        });
        t.set_state(pos_state(PosState::Ordering));
        t.reply(order_summary(&order, product.image_url.as_deref(), &currency));
        Ok(())
    }

    /// Load an order and check it belongs to the sender (owners see all).
    /// Replies and returns `None` when it does not.
    async fn customer_order(
        &self,
        t: &mut TurnCtx<'_>,
        order_id: &str,
    ) -> Result<Option<Order>, WahubError> {
        let order = self.pos.get_order(order_id).await?;
        if normalize_contact(&order.customer) == normalize_contact(&t.record.user) || t.is_owner()
        {
            Ok(Some(order))
        } else {
            warn!(
                "tenant {}: {} asked for order {} owned by someone else",
                t.tenant.tenant_id, t.record.user, order_id
            );
            t.reply_text("Sorry, I couldn't find that order.");
            Ok(None)
        }
    }

    /// Unit prices for lines whose stored price is missing or invalid.
    async fn current_prices(
        &self,
        store_id: &str,
        order: &Order,
    ) -> Result<HashMap<String, Money>, WahubError> {
        let mut prices = HashMap::new();
        for product_id in lines_missing_price(order) {
            let product = self.pos.get_product(store_id, &product_id).await?;
            if let Ok(price) = product.price() {
                prices.insert(product_id, price);
            }
        }
        Ok(prices)
    }

    async fn update_quantity(
        &self,
        t: &mut TurnCtx<'_>,
        order_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), WahubError> {
        let Some(mut order) = self.customer_order(t, order_id).await? else {
            return Ok(());
        };
        if !order.status.is_open() {
            t.reply_text(format!(
                "Order #{} can no longer be changed ({}).",
                order.number(),
                order.status.label()
            ));
            return Ok(());
        }
        let store_id = t.tenant.store.store_id.clone();
        let previous = order
            .items
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity);
        let prices = self.current_prices(&store_id, &order).await?;
        if let Err(e) = set_quantity(&mut order, product_id, quantity, |id| {
            prices.get(id).copied()
        }) {
            info!("tenant {}: rejected quantity change: {}", t.tenant.tenant_id, e);
            t.reply_text("Sorry, I couldn't change the quantity. Please pick between 1 and 5.");
            return Ok(());
        }
        let updated = self.pos.update_order(&order).await?;

        if let Some(previous) = previous
            && previous != quantity
            && let Err(e) = self
                .pos
                .adjust_stock(
                    &store_id,
                    product_id,
                    i64::from(previous) - i64::from(quantity),
                )
                .await
        {
            warn!("stock adjustment after quantity change failed: {}", e);
            t.record.note(format!("stock not adjusted for order {}: {}", order_id, e));
        }

        let image = self
            .pos
            .get_product(&store_id, product_id)
            .await
            .ok()
            .and_then(|p| p.image_url);
        let currency = updated
            .currency
            .clone()
            .unwrap_or_else(|| t.tenant.store.currency.clone());
        t.set_state(pos_state(PosState::Ordering));
        t.reply(order_summary(&updated, image.as_deref(), &currency));
        Ok(())
    }

    async fn confirm_order(&self, t: &mut TurnCtx<'_>, order_id: &str) -> Result<(), WahubError> {
        let Some(order) = self.customer_order(t, order_id).await? else {
            return Ok(());
        };
        if !order.status.is_open() {
            t.reply_text(format!(
                "Order #{} is already {}.",
                order.number(),
                order.status.label().to_lowercase()
            ));
            return Ok(());
        }
        let order = self.pos.initiate_payment(order_id).await?;
        let currency = order
            .currency
            .clone()
            .unwrap_or_else(|| t.tenant.store.currency.clone());
        let amount = order
            .total()
            .map_or_else(|_| order.total_amount.clone(), |m| m.display_with(&currency));
        let how = match t.tenant.store.paynow_target.as_deref() {
            Some(target) => format!("Please pay *{}* via PayNow to *{}*.", amount, target),
            None => format!("Please pay *{}* to the store.", amount),
        };
        t.set_state(pos_state(PosState::Ordering));
        t.reply(OutboundItem::Buttons {
            header: None,
            body: format!(
                "{}\nReference: order #{}\n\nTap *Payment Done* once you've paid.",
                how,
                order.number()
            ),
            footer: None,
            buttons: vec![
                Button::new(format!("payment_done_{}", order.id), "Payment Done"),
                Button::new(format!("cancel_order_{}", order.id), "Cancel Order"),
            ],
        });
        Ok(())
    }

    async fn cancel_order(&self, t: &mut TurnCtx<'_>, order_id: &str) -> Result<(), WahubError> {
        let Some(order) = self.customer_order(t, order_id).await? else {
            return Ok(());
        };
        if !order.status.is_open() {
            t.reply_text(format!(
                "Order #{} can no longer be cancelled ({}).",
                order.number(),
                order.status.label()
            ));
            return Ok(());
        }
        self.pos
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await?;
        let store_id = t.tenant.store.store_id.clone();
        for line in &order.items {
            if let Err(e) = self
                .pos
                .adjust_stock(&store_id, &line.product_id, i64::from(line.quantity))
                .await
            {
                warn!("stock restore for cancelled order {} failed: {}", order_id, e);
            }
        }
        if t
            .record
            .scratch
            .cart
            .as_ref()
            .is_some_and(|c| c.order_id == order_id)
        {
            t.record.scratch.cart = None;
        }
        t.set_state(pos_state(PosState::Terminal));
        t.reply_text(format!(
            "Order #{} has been cancelled. Type *menu* whenever you'd like to order again.",
            order.number()
        ));
        Ok(())
    }

    async fn payment_done(&self, t: &mut TurnCtx<'_>, order_id: &str) -> Result<(), WahubError> {
        let Some(order) = self.customer_order(t, order_id).await? else {
            return Ok(());
        };
        if !matches!(
            order.status,
            OrderStatus::AwaitingPayment | OrderStatus::PaymentRejected
        ) {
            t.reply_text(format!(
                "Order #{} isn't waiting for payment ({}).",
                order.number(),
                order.status.label()
            ));
            return Ok(());
        }
        let order = self
            .pos
            .update_order_status(order_id, OrderStatus::PaymentSubmitted)
            .await?;
        t.record.scratch.awaiting_owner_reply = true;
        t.set_state(pos_state(PosState::AwaitingOwnerPayment));

        let Some(owner) = t.owner() else {
            warn!(
                "tenant {}: payment submitted for {} but no owner contact is configured",
                t.tenant.tenant_id, order.id
            );
            t.reply_text("Thanks! We'll verify your payment shortly.");
            return Ok(());
        };
        let currency = order
            .currency
            .clone()
            .unwrap_or_else(|| t.tenant.store.currency.clone());
        let customer = t
            .inbound
            .profile_name
            .clone()
            .unwrap_or_else(|| t.record.user.clone());
        let total = order
            .total()
            .map_or_else(|_| order.total_amount.clone(), |m| m.display_with(&currency));
        t.send_to(
            &owner,
            OutboundItem::Buttons {
                header: None,
                body: format!(
                    "💰 Payment submitted\nOrder #{} from {} ({})\nTotal: {}\n\nPlease check your account before approving.",
                    order.number(),
                    customer,
                    t.record.user,
                    total
                ),
                footer: None,
                buttons: vec![
                    Button::new(format!("owner_confirm_payment_{}", order.id), "Approve"),
                    Button::new(format!("owner_reject_payment_{}", order.id), "Reject"),
                    Button::new(format!("owner_reply_{}", t.record.user), "Reply"),
                ],
            },
        );
        t.peer(PeerUpdate::for_user(owner).state(pos_state(PosState::OwnerReviewingPayment)));
        t.reply_text(
            "Thanks! We've let the store know. You'll receive your invoice as soon as the payment is verified.",
        );
        Ok(())
    }

    /// Owner failures get a technical reply with the order id and detail.
    async fn owner_confirm_payment(&self, t: &mut TurnCtx<'_>, order_id: &str) {
        let receipt = match self.pos.confirm_payment(order_id).await {
            Ok(r) => r,
            Err(e) => {
                warn!("payment confirmation for {} failed: {}", order_id, e);
                t.record.note(format!("confirm-payment {} failed: {}", order_id, e));
                t.reply_text(format!(
                    "⚠️ Could not confirm payment for order {}: {}",
                    order_id, e
                ));
                return;
            }
        };
        let order = receipt.order;
        let customer = normalize_contact(&order.customer);
        let currency = order
            .currency
            .clone()
            .unwrap_or_else(|| t.tenant.store.currency.clone());

        t.send_to(
            &customer,
            OutboundItem::text(format!(
                "✅ Payment received for order #{}. Thank you! Here is your invoice:",
                order.number()
            )),
        );
        t.send_to(&customer, invoice_document(&order, &receipt.invoice_url));
        t.peer(
            PeerUpdate::for_user(&customer)
                .state(pos_state(PosState::Terminal))
                .awaiting_owner_reply(false)
                .note(format!("payment for order {} confirmed", order.id)),
        );

        let total = order
            .total()
            .map_or_else(|_| order.total_amount.clone(), |m| m.display_with(&currency));
        t.set_state(pos_state(PosState::Start));
        t.reply(OutboundItem::Buttons {
            header: None,
            body: format!(
                "✅ Payment confirmed\nOrder #{} · {}\nTotal: {}\n\nThe invoice has been sent to the customer.",
                order.number(),
                order.customer_name.as_deref().unwrap_or(&customer),
                total
            ),
            footer: None,
            buttons: vec![Button::new(
                format!("send_greeting_{}", customer),
                "Send Greeting",
            )],
        });
    }

    async fn owner_reject_payment(&self, t: &mut TurnCtx<'_>, order_id: &str) {
        let order = match self
            .pos
            .update_order_status(order_id, OrderStatus::PaymentRejected)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                warn!("payment rejection for {} failed: {}", order_id, e);
                t.reply_text(format!(
                    "⚠️ Could not reject payment for order {}: {}",
                    order_id, e
                ));
                return;
            }
        };
        let customer = normalize_contact(&order.customer);
        t.send_to(
            &customer,
            OutboundItem::Buttons {
                header: None,
                body: format!(
                    "❌ We couldn't verify your payment for order #{}. Please check your transfer and tap *Payment Done* again, or send the store a message.",
                    order.number()
                ),
                footer: None,
                buttons: vec![
                    Button::new(format!("payment_done_{}", order.id), "Payment Done"),
                    Button::new(format!("customer_response_{}", order.id), "Message Store"),
                ],
            },
        );
        t.peer(
            PeerUpdate::for_user(&customer)
                .state(pos_state(PosState::Ordering))
                .awaiting_owner_reply(false)
                .note(format!("payment for order {} rejected", order.id)),
        );
        t.set_state(pos_state(PosState::Start));
        t.reply_text(format!(
            "Payment for order #{} marked as rejected. The customer has been notified.",
            order.number()
        ));
    }

    /// Forward a message to the waiting counterparty with a reply button.
    fn relay(&self, t: &mut TurnCtx<'_>, target: &RelayTarget, body: &str) {
        t.record.scratch.relay_to = None;
        let (prefix, button) = if t.is_owner() {
            (
                format!("💬 Message from {}:", t.tenant.display_name()),
                Button::new(
                    format!(
                        "customer_response_{}",
                        target.order_id.as_deref().unwrap_or("none")
                    ),
                    "Reply",
                ),
            )
        } else {
            let sender = t
                .inbound
                .profile_name
                .clone()
                .unwrap_or_else(|| t.record.user.clone());
            let about = target
                .order_id
                .as_deref()
                .map(|o| format!(" about order {}", o))
                .unwrap_or_default();
            (
                format!("💬 Message from {}{}:", sender, about),
                Button::new(format!("owner_reply_{}", t.record.user), "Reply"),
            )
        };
        let body = truncate_chars(
            &format!("{}\n{}", prefix, body.trim()),
            MAX_BODY_CHARS,
        );
        t.send_to(
            &target.contact,
            OutboundItem::Buttons {
                header: None,
                body,
                footer: None,
                buttons: vec![button],
            },
        );
        let next = if t.record.scratch.awaiting_owner_reply {
            PosState::AwaitingOwnerPayment
        } else {
            PosState::Start
        };
        t.set_state(pos_state(next));
        t.reply_text("✉️ Message sent.");
    }

    async fn request_discount(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let Some(cart) = t.record.scratch.cart.clone() else {
            return self.llm_turn(t).await;
        };
        let order = self.pos.get_order(&cart.order_id).await?;
        if !order.status.is_open() {
            return self.llm_turn(t).await;
        }
        let Some(owner) = t.owner() else {
            t.reply_text("Sorry, our prices are fixed, but they're already great value! 😊");
            return Ok(());
        };
        let percent = t.tenant.store.discount_percent;
        let currency = order
            .currency
            .clone()
            .unwrap_or_else(|| t.tenant.store.currency.clone());
        let total = order
            .total()
            .map_or_else(|_| order.total_amount.clone(), |m| m.display_with(&currency));
        t.send_to(
            &owner,
            OutboundItem::Buttons {
                header: None,
                body: format!(
                    "💸 Discount request\nOrder #{} from {}\nTotal: {}\nOffer {}% off?",
                    order.number(),
                    t.record.user,
                    total,
                    percent
                ),
                footer: None,
                buttons: vec![
                    Button::new(
                        format!("discount_approve_{}", order.id),
                        format!("Approve {}%", percent),
                    ),
                    Button::new(format!("discount_reject_{}", order.id), "Reject"),
                ],
            },
        );
        t.reply_text("Let me check with the store whether we can do a better price. Hang on! 🙏");
        Ok(())
    }

    async fn approve_discount(&self, t: &mut TurnCtx<'_>, order_id: &str) -> Result<(), WahubError> {
        let mut order = self.pos.get_order(order_id).await?;
        if !order.status.is_open() {
            t.reply_text(format!(
                "Order #{} is {} and can't be discounted.",
                order.number(),
                order.status.label().to_lowercase()
            ));
            return Ok(());
        }
        let percent = t.tenant.store.discount_percent;
        let prices = self.current_prices(&t.tenant.store.store_id, &order).await?;
        if let Err(e) = apply_discount(&mut order, percent, |id| prices.get(id).copied()) {
            t.reply_text(format!(
                "⚠️ Could not apply the discount to order {}: {}",
                order_id, e
            ));
            return Ok(());
        }
        let updated = self.pos.update_order(&order).await?;
        let customer = normalize_contact(&updated.customer);
        let currency = updated
            .currency
            .clone()
            .unwrap_or_else(|| t.tenant.store.currency.clone());
        t.send_to(
            &customer,
            OutboundItem::text(format!(
                "🎉 Good news! The store approved a {}% discount on your order.",
                percent
            )),
        );
        t.send_to(&customer, order_summary(&updated, None, &currency));
        t.peer(PeerUpdate::for_user(&customer).note(format!("{}% discount applied", percent)));
        t.reply_text(format!(
            "Discount applied to order #{}. New total: {}.",
            updated.number(),
            updated
                .total()
                .map_or_else(|_| updated.total_amount.clone(), |m| m.display_with(&currency))
        ));
        Ok(())
    }

    /// Featured product if configured, else the first in-stock product.
    async fn todays_offer(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let store_id = t.tenant.store.store_id.clone();
        let featured = match t.tenant.store.featured_product_id.as_deref() {
            Some(id) => match self.pos.get_product(&store_id, id).await {
                Ok(p) if p.in_stock() => Some(p),
                Ok(_) => None,
                Err(e) => {
                    warn!("featured product {} unavailable: {}", id, e);
                    None
                }
            },
            None => None,
        };
        let offer = match featured {
            Some(p) => Some(p),
            None => self
                .pos
                .list_products(&store_id, None, PRODUCT_SNAPSHOT_LIMIT)
                .await?
                .into_iter()
                .find(Product::in_stock),
        };
        match offer {
            Some(product) => {
                let card = product_card(
                    &product,
                    currency_for(&product, t.tenant),
                    Some("🌟 Today's offer"),
                );
                t.set_state(pos_state(PosState::ViewingProduct));
                t.reply(card);
            }
            None => t.reply_text("No special offer today. Type *menu* to see our products."),
        }
        Ok(())
    }

    async fn llm_turn(&self, t: &mut TurnCtx<'_>) -> Result<(), WahubError> {
        let products = match self
            .pos
            .list_products(&t.tenant.store.store_id, None, PRODUCT_SNAPSHOT_LIMIT)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "tenant {}: product snapshot unavailable: {}",
                    t.tenant.tenant_id, e
                );
                Vec::new()
            }
        };
        t.out.used_llm = true;
        let outcome = self
            .orchestrator
            .run(t.tenant, t.record, &mut t.out.plan, &products)
            .await;
        if let Some(reason) = outcome.fallback {
            t.record.note(format!("model fallback: {:?}", reason));
        }
        Ok(())
    }
}
