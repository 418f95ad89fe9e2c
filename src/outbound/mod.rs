use crate::config::TransportConfig;
use crate::errors::{ErrorKind, WahubError};
use crate::tenants::TenantConfig;
use crate::whatsapp::{OutboundItem, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest `retry-after` hint honored before the single retry.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(5);

/// A message addressed to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMessage {
    pub to: String,
    pub item: OutboundItem,
}

/// Ordered messages produced by one dialog turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundPlan {
    messages: Vec<PlannedMessage>,
}

impl OutboundPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, to: impl Into<String>, item: OutboundItem) {
        self.messages.push(PlannedMessage {
            to: to.into(),
            item,
        });
    }

    pub fn push_text(&mut self, to: impl Into<String>, body: impl Into<String>) {
        self.push(to, OutboundItem::text(body));
    }

    pub fn extend(&mut self, other: OutboundPlan) {
        self.messages.extend(other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[PlannedMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages addressed to `to`.
    pub fn to_recipient<'a>(&'a self, to: &'a str) -> impl Iterator<Item = &'a OutboundItem> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.to == to)
            .map(|m| &m.item)
    }
}

/// Outcome of delivering a plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    /// Provider message ids of delivered items, in order.
    pub delivered: Vec<String>,
    /// One note per item that could not be delivered.
    pub failures: Vec<String>,
}

/// Sends an outbound plan in order with pacing, a single retry on transient
/// errors and a plain-text fallback for rejected rich messages.
pub struct OutboundSender {
    transport: Arc<dyn Transport>,
    pacing: Duration,
    retry_delay: Duration,
}

impl OutboundSender {
    pub fn new(transport: Arc<dyn Transport>, config: &TransportConfig) -> Self {
        Self {
            transport,
            pacing: Duration::from_millis(config.pacing_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub async fn deliver(&self, tenant: &TenantConfig, plan: &OutboundPlan) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut last_to: Option<&str> = None;

        for message in plan.messages() {
            if last_to == Some(message.to.as_str()) && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            last_to = Some(&message.to);

            match self.send_with_fallback(tenant, message).await {
                Ok(id) => report.delivered.push(id),
                Err(e) => {
                    warn!(
                        "tenant {}: giving up on {} message to {}: {}",
                        tenant.tenant_id,
                        message.item.kind(),
                        message.to,
                        e
                    );
                    report.failures.push(format!(
                        "Delivery of {} message to {} failed: {}",
                        message.item.kind(),
                        message.to,
                        e
                    ));
                }
            }
        }
        report
    }

    async fn send_with_fallback(
        &self,
        tenant: &TenantConfig,
        message: &PlannedMessage,
    ) -> Result<String, WahubError> {
        let err = match self.send_once_retrying(tenant, &message.to, &message.item).await {
            Ok(id) => return Ok(id),
            Err(e) => e,
        };
        if err.kind() == ErrorKind::Config {
            return Err(err);
        }
        let Some(text) = message.item.text_fallback() else {
            return Err(err);
        };
        info!(
            "tenant {}: {} message rejected ({}), sending text fallback",
            tenant.tenant_id,
            message.item.kind(),
            err
        );
        self.send_once_retrying(tenant, &message.to, &OutboundItem::text(text))
            .await
    }

    async fn send_once_retrying(
        &self,
        tenant: &TenantConfig,
        to: &str,
        item: &OutboundItem,
    ) -> Result<String, WahubError> {
        match self.transport.send(&tenant.whatsapp, to, item).await {
            Ok(id) => Ok(id),
            Err(e) if e.is_retryable() => {
                let delay = match &e {
                    WahubError::RateLimit {
                        retry_after: Some(secs),
                    } => Duration::from_secs(*secs).min(MAX_RETRY_AFTER),
                    _ => self.retry_delay,
                };
                warn!("transient send failure to {}, retrying once: {}", to, e);
                tokio::time::sleep(delay).await;
                self.transport.send(&tenant.whatsapp, to, item).await
            }
            Err(e) => Err(e),
        }
    }
}
