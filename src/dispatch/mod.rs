//! One inbound message end to end: admission, dialog turn, commit, delivery
//! and cross-conversation updates.

use crate::dedup::IdempotencyFilter;
use crate::dialog::{DialogEngine, PeerUpdate, TurnOutcome};
use crate::outbound::{OutboundPlan, OutboundSender};
use crate::session::{CommitOutcome, ConversationRecord, SessionManager};
use crate::tenants::{TenantConfig, normalize_contact};
use crate::whatsapp::NormalizedInbound;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Dialog turns attempted before a message is dropped on repeated conflicts.
const MAX_TURN_ATTEMPTS: u32 = 2;
/// Commits attempted when applying a note or peer update.
const MAX_NOTE_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Same message id already admitted within the window.
    Duplicate,
    /// Turn committed; counts refer to outbound delivery.
    Processed { delivered: usize, failed: usize },
    /// Session storage failed or kept conflicting; nothing was sent.
    Dropped,
}

pub struct Dispatcher {
    dedup: Arc<IdempotencyFilter>,
    sessions: Arc<SessionManager>,
    engine: Arc<DialogEngine>,
    sender: Arc<OutboundSender>,
}

impl Dispatcher {
    pub fn new(
        dedup: Arc<IdempotencyFilter>,
        sessions: Arc<SessionManager>,
        engine: Arc<DialogEngine>,
        sender: Arc<OutboundSender>,
    ) -> Self {
        Self {
            dedup,
            sessions,
            engine,
            sender,
        }
    }

    /// Process one normalized inbound message. The turn is committed before
    /// anything is sent, so a crash mid-delivery never replays the turn.
    pub async fn dispatch(
        &self,
        tenant: &Arc<TenantConfig>,
        inbound: &NormalizedInbound,
    ) -> DispatchOutcome {
        if !self.dedup.admit(&tenant.tenant_id, &inbound.message_id).await {
            info!(
                "tenant {}: message {} already processed, skipping",
                tenant.tenant_id, inbound.message_id
            );
            return DispatchOutcome::Duplicate;
        }

        let Some((mut record, outcome)) = self.run_turn(tenant, inbound).await else {
            return DispatchOutcome::Dropped;
        };

        let report = self.sender.deliver(tenant, &outcome.plan).await;
        if !report.failures.is_empty() {
            self.record_failures(tenant, &mut record, &report.failures)
                .await;
        }
        for update in &outcome.peer_updates {
            self.apply_peer_update(tenant, update).await;
        }

        info!(
            "tenant {}: message {} from {} handled (state {:?}, {} sent, {} failed{})",
            tenant.tenant_id,
            inbound.message_id,
            record.user,
            record.state,
            report.delivered.len(),
            report.failures.len(),
            if outcome.used_llm { ", model" } else { "" }
        );
        DispatchOutcome::Processed {
            delivered: report.delivered.len(),
            failed: report.failures.len(),
        }
    }

    /// Load, run and commit; on a conflict reload and run once more.
    async fn run_turn(
        &self,
        tenant: &Arc<TenantConfig>,
        inbound: &NormalizedInbound,
    ) -> Option<(ConversationRecord, TurnOutcome)> {
        let user = normalize_contact(&inbound.from);
        for attempt in 1..=MAX_TURN_ATTEMPTS {
            let mut record = match self.sessions.load(tenant, &user).await {
                Ok(r) => r,
                Err(e) => {
                    error!(
                        "tenant {}: cannot load session for {}: {}",
                        tenant.tenant_id, user, e
                    );
                    return None;
                }
            };
            let outcome = self.engine.handle_turn(tenant, &mut record, inbound).await;
            match self.sessions.commit(tenant, &mut record).await {
                Ok(CommitOutcome::Committed) => return Some((record, outcome)),
                Ok(CommitOutcome::Conflict) => {
                    warn!(
                        "tenant {}: concurrent update for {} (attempt {}/{})",
                        tenant.tenant_id, user, attempt, MAX_TURN_ATTEMPTS
                    );
                }
                Err(e) => {
                    error!(
                        "tenant {}: cannot commit session for {}: {}",
                        tenant.tenant_id, user, e
                    );
                    return None;
                }
            }
        }

        warn!(
            "tenant {}: dropping message {} from {} after repeated conflicts",
            tenant.tenant_id, inbound.message_id, user
        );
        self.add_note(
            tenant,
            &user,
            &format!(
                "message {} dropped after concurrent updates",
                inbound.message_id
            ),
        )
        .await;
        None
    }

    async fn record_failures(
        &self,
        tenant: &TenantConfig,
        record: &mut ConversationRecord,
        failures: &[String],
    ) {
        for failure in failures {
            record.note(failure.clone());
        }
        match self.sessions.commit(tenant, record).await {
            Ok(CommitOutcome::Committed) => {}
            Ok(CommitOutcome::Conflict) => {
                debug!("delivery notes raced another turn, appending to the newer record");
                for failure in failures {
                    self.add_note(tenant, &record.user, failure).await;
                }
            }
            Err(e) => warn!("could not record delivery failures for {}: {}", record.user, e),
        }
    }

    async fn add_note(&self, tenant: &TenantConfig, user: &str, note: &str) {
        self.apply_peer_update(tenant, &PeerUpdate::for_user(user).note(note))
            .await;
    }

    /// Best effort: a peer that keeps conflicting is left as it is.
    pub async fn apply_peer_update(&self, tenant: &TenantConfig, update: &PeerUpdate) {
        let user = normalize_contact(&update.user);
        for _ in 0..MAX_NOTE_ATTEMPTS {
            let mut record = match self.sessions.load(tenant, &user).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("could not load peer session {}: {}", user, e);
                    return;
                }
            };
            if let Some(state) = update.state {
                record.state.transition(state);
            }
            if let Some(waiting) = update.awaiting_owner_reply {
                record.scratch.awaiting_owner_reply = waiting;
            }
            if let Some(note) = &update.note {
                record.note(note.clone());
            }
            match self.sessions.commit(tenant, &mut record).await {
                Ok(CommitOutcome::Committed) => return,
                Ok(CommitOutcome::Conflict) => continue,
                Err(e) => {
                    warn!("could not commit peer session {}: {}", user, e);
                    return;
                }
            }
        }
        warn!("peer update for {} abandoned after conflicts", user);
    }

    /// Send a one-off text outside a dialog turn and note it in the user's
    /// transcript.
    pub async fn notify(&self, tenant: &TenantConfig, user: &str, text: &str) -> bool {
        let user = normalize_contact(user);
        let mut plan = OutboundPlan::new();
        plan.push_text(&user, text);
        let report = self.sender.deliver(tenant, &plan).await;
        let note = if report.failures.is_empty() {
            format!("notified: {}", text)
        } else {
            report.failures.join("; ")
        };
        self.add_note(tenant, &user, &note).await;
        report.failures.is_empty()
    }

    /// Janitor pass: expired sessions and idempotency rows.
    pub async fn purge_expired(&self) -> (usize, usize) {
        let sessions = self.sessions.purge_expired().await.unwrap_or_else(|e| {
            warn!("session purge failed: {}", e);
            0
        });
        let dedup = self.dedup.purge_expired().unwrap_or_else(|e| {
            warn!("idempotency purge failed: {}", e);
            0
        });
        if sessions + dedup > 0 {
            info!(
                "janitor removed {} session(s) and {} idempotency record(s)",
                sessions, dedup
            );
        }
        (sessions, dedup)
    }

    /// Run [`Self::purge_expired`] every `every` until the task is aborted.
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                dispatcher.purge_expired().await;
            }
        })
    }
}
