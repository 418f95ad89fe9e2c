//! Dialog engine: turns one normalized inbound message into state changes
//! and an outbound plan, per tenant kind.

pub mod actions;
pub mod catalog;
pub mod dashboard;
mod deals;
mod pos;
pub mod rules;
pub mod state;
mod viral;

pub use actions::{DashboardView, PosAction};
pub use state::{DealsState, DialogState, PosState, ViralState};

use crate::agent::LlmOrchestrator;
use crate::config::{AgentConfig, ServicesConfig};
use crate::errors::{ErrorKind, WahubError};
use crate::outbound::OutboundPlan;
use crate::places::PlacesProvider;
use crate::pos::PosService;
use crate::providers::ProviderSource;
use crate::session::record::{ConversationRecord, Turn};
use crate::tenants::{TenantConfig, TenantKind, normalize_contact};
use crate::utils::truncate_chars;
use crate::whatsapp::{NormalizedInbound, OutboundItem};
use crate::workflow::{DealSubmissions, WorkflowRunner};
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest assistant summary recorded for a turn handled without the model.
const SUMMARY_MAX_CHARS: usize = 1000;

/// Change to another user's conversation caused by this turn, applied
/// best-effort after the turn commits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerUpdate {
    pub user: String,
    pub state: Option<DialogState>,
    pub awaiting_owner_reply: Option<bool>,
    pub note: Option<String>,
}

impl PeerUpdate {
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn state(mut self, state: DialogState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn awaiting_owner_reply(mut self, waiting: bool) -> Self {
        self.awaiting_owner_reply = Some(waiting);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of one dialog turn.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub plan: OutboundPlan,
    pub peer_updates: Vec<PeerUpdate>,
    pub used_llm: bool,
}

/// Everything a handler needs while processing one turn.
pub(crate) struct TurnCtx<'a> {
    pub tenant: &'a Arc<TenantConfig>,
    pub record: &'a mut ConversationRecord,
    pub inbound: &'a NormalizedInbound,
    pub out: TurnOutcome,
}

impl TurnCtx<'_> {
    pub fn user(&self) -> String {
        self.record.user.clone()
    }

    pub fn is_owner(&self) -> bool {
        self.tenant.is_owner(&self.record.user)
    }

    /// Owner contact in the digits-only form WhatsApp addresses use.
    pub fn owner(&self) -> Option<String> {
        self.tenant
            .owner_contact
            .as_deref()
            .map(normalize_contact)
            .filter(|o| !o.is_empty())
    }

    pub fn reply(&mut self, item: OutboundItem) {
        let to = self.user();
        self.out.plan.push(to, item);
    }

    pub fn reply_text(&mut self, text: impl Into<String>) {
        self.reply(OutboundItem::text(text));
    }

    pub fn send_to(&mut self, to: &str, item: OutboundItem) {
        self.out.plan.push(to, item);
    }

    pub fn set_state(&mut self, next: DialogState) -> bool {
        self.record.state.transition(next)
    }

    pub fn peer(&mut self, update: PeerUpdate) {
        self.out.peer_updates.push(update);
    }
}

/// Collaborators the engine calls out to.
pub struct DialogDeps {
    pub pos: Arc<dyn PosService>,
    pub places: Arc<dyn PlacesProvider>,
    pub orchestrator: Arc<LlmOrchestrator>,
    pub providers: Arc<dyn ProviderSource>,
    pub workflow: Arc<dyn WorkflowRunner>,
    pub submissions: Option<Arc<DealSubmissions>>,
    pub services: ServicesConfig,
    pub agent: AgentConfig,
}

pub struct DialogEngine {
    pos: Arc<dyn PosService>,
    places: Arc<dyn PlacesProvider>,
    orchestrator: Arc<LlmOrchestrator>,
    providers: Arc<dyn ProviderSource>,
    workflow: Arc<dyn WorkflowRunner>,
    submissions: Option<Arc<DealSubmissions>>,
    services: ServicesConfig,
    agent: AgentConfig,
}

impl DialogEngine {
    pub fn new(deps: DialogDeps) -> Self {
        Self {
            pos: deps.pos,
            places: deps.places,
            orchestrator: deps.orchestrator,
            providers: deps.providers,
            workflow: deps.workflow,
            submissions: deps.submissions,
            services: deps.services,
            agent: deps.agent,
        }
    }

    /// Process one inbound message against the caller's copy of the record.
    /// Never fails: collaborator errors become a reply to the user.
    pub async fn handle_turn(
        &self,
        tenant: &Arc<TenantConfig>,
        record: &mut ConversationRecord,
        inbound: &NormalizedInbound,
    ) -> TurnOutcome {
        let raw_type = inbound.kind.raw_type().to_string();
        record.push(Turn::user(inbound.transcript_text(), raw_type.clone()));
        record.last_message_type = Some(raw_type);

        let mut ctx = TurnCtx {
            tenant,
            record,
            inbound,
            out: TurnOutcome::default(),
        };
        let result = match tenant.kind {
            TenantKind::Pos => self.pos_turn(&mut ctx).await,
            TenantKind::Deals => self.deals_turn(&mut ctx).await,
            TenantKind::ViralAgency => self.viral_turn(&mut ctx).await,
        };
        if let Err(e) = result {
            report_error(&mut ctx, &e);
        }

        let TurnCtx { record, out, .. } = ctx;
        if !out.used_llm {
            record_summary(record, &out.plan);
        }
        debug!(
            "tenant {}: turn for {} produced {} message(s), state {:?}",
            tenant.tenant_id,
            record.user,
            out.plan.len(),
            record.state
        );
        out
    }
}

/// Record what was sent to the user as a single assistant turn so the model
/// sees the conversation on later turns.
fn record_summary(record: &mut ConversationRecord, plan: &OutboundPlan) {
    let lines: Vec<String> = plan
        .to_recipient(&record.user)
        .filter_map(|item| match item {
            OutboundItem::Text { body, .. } => Some(body.clone()),
            other => other.text_fallback(),
        })
        .collect();
    if !lines.is_empty() {
        record.push(Turn::assistant_text(truncate_chars(
            &lines.join("\n\n"),
            SUMMARY_MAX_CHARS,
        )));
    }
}

/// Turn an error into one concise message. Owners get the technical detail.
fn report_error(ctx: &mut TurnCtx<'_>, err: &WahubError) {
    warn!(
        "tenant {}: turn for {} failed: {}",
        ctx.tenant.tenant_id, ctx.record.user, err
    );
    ctx.record.note(format!("error: {}", err));
    let text = if ctx.is_owner() {
        format!("⚠️ That didn't work: {}", err)
    } else {
        user_error_text(err)
    };
    ctx.reply_text(text);
}

pub fn user_error_text(err: &WahubError) -> String {
    match (err.kind(), err) {
        (ErrorKind::PermanentExternal, WahubError::Permanent { detail, .. }) => {
            format!("Sorry, we couldn't do that: {}", detail)
        }
        (ErrorKind::Config, _) => {
            "Sorry, this service isn't available right now. Please try again later.".to_string()
        }
        _ => "Sorry, something went wrong on our side. Please try again in a moment.".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing;
