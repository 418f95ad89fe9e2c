//! Collaborator doubles and an engine harness for dialog and dispatch tests.

use super::{DialogDeps, DialogEngine, TurnOutcome};
use crate::agent::LlmOrchestrator;
use crate::agent::tools::register_pos_tools;
use crate::config::{AgentConfig, ServicesConfig};
use crate::errors::WahubError;
use crate::places::{Place, PlacesProvider};
use crate::pos::PosService;
use crate::pos::testing::InMemoryPos;
use crate::providers::ProviderSource;
use crate::providers::base::{ChatRequest, LLMProvider, LLMResponse};
use crate::session::record::ConversationRecord;
use crate::storage::Database;
use crate::tenants::{TenantConfig, TenantKind, WhatsAppCredentials};
use crate::whatsapp::{InboundKind, MediaRef, NormalizedInbound, OutboundItem, Transport};
use crate::workflow::{DealPayload, DealSubmissions, WorkflowRunner};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const CUSTOMER: &str = "6591234567";
pub(crate) const OWNER: &str = "6590000000";

#[derive(Default)]
pub(crate) struct StubPlaces {
    pub results: Mutex<Vec<Place>>,
    pub fail: AtomicBool,
    pub queries: Mutex<Vec<(String, Option<(f64, f64)>)>>,
}

pub(crate) fn place(name: &str, address: &str) -> Place {
    Place {
        name: name.to_string(),
        formatted_address: address.to_string(),
        place_id: format!("pid-{}", name.to_lowercase().replace(' ', "-")),
        rating: Some(4.4),
        phone: Some("+65 6123 4567".to_string()),
        website: None,
    }
}

#[async_trait]
impl PlacesProvider for StubPlaces {
    async fn search(
        &self,
        _api_key: &str,
        query: &str,
        near: Option<(f64, f64)>,
    ) -> Result<Vec<Place>, WahubError> {
        self.queries.lock().unwrap().push((query.to_string(), near));
        if self.fail.load(Ordering::SeqCst) {
            return Err(WahubError::transient("places", "timed out"));
        }
        Ok(self.results.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub(crate) struct StubWorkflow {
    pub fail: AtomicBool,
    pub submitted: Mutex<Vec<(String, DealPayload)>>,
}

#[async_trait]
impl WorkflowRunner for StubWorkflow {
    async fn submit(&self, webhook_url: &str, payload: &DealPayload) -> Result<(), WahubError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WahubError::from_status("workflow", 502, None, "bad gateway"));
        }
        self.submitted
            .lock()
            .unwrap()
            .push((webhook_url.to_string(), payload.clone()));
        Ok(())
    }
}

/// Replies with queued texts; fails when the queue holds `None`.
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    pub replies: Mutex<VecDeque<Option<String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn push_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Some(text.to_string()));
    }

    pub fn push_failure(&self) {
        self.replies.lock().unwrap().push_back(None);
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat(&self, _req: ChatRequest<'_>) -> anyhow::Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().unwrap().pop_front() {
            Some(Some(text)) => Ok(LLMResponse {
                content: Some(text),
                ..Default::default()
            }),
            Some(None) => Err(WahubError::permanent("llm", 400, "bad request").into()),
            None => Ok(LLMResponse {
                content: Some("How can I help you today?".to_string()),
                ..Default::default()
            }),
        }
    }

    fn default_model(&self) -> &str {
        "gpt-test"
    }
}

/// Records every send; fails all of them while `fail` is set.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: Mutex<Vec<(String, OutboundItem)>>,
    pub fail: AtomicBool,
}

impl RecordingTransport {
    pub fn sent_to(&self, user: &str) -> Vec<OutboundItem> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == user)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        _creds: &WhatsAppCredentials,
        to: &str,
        item: &OutboundItem,
    ) -> Result<String, WahubError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WahubError::permanent("whatsapp", 400, "recipient not allowed"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), item.clone()));
        Ok(format!("wamid.out{}", sent.len()))
    }
}

pub(crate) fn services() -> ServicesConfig {
    ServicesConfig {
        workflow_webhook_url: "https://flows.example/webhook/deals".to_string(),
        callback_base_url: "https://bot.example".to_string(),
        ..ServicesConfig::default()
    }
}

pub(crate) fn tenant(kind: TenantKind) -> Arc<TenantConfig> {
    let mut tenant = TenantConfig::sample("t1", kind);
    tenant.maps_api_key = Some("maps-key".to_string());
    Arc::new(tenant)
}

pub(crate) struct Harness {
    pub engine: Arc<DialogEngine>,
    pub pos: Arc<InMemoryPos>,
    pub places: Arc<StubPlaces>,
    pub workflow: Arc<StubWorkflow>,
    pub llm: Arc<ScriptedLlm>,
    pub submissions: Arc<DealSubmissions>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_pos(InMemoryPos::kopi())
    }

    pub fn with_pos(pos: InMemoryPos) -> Self {
        let pos = Arc::new(pos);
        let places = Arc::new(StubPlaces::default());
        let workflow = Arc::new(StubWorkflow::default());
        let llm = Arc::new(ScriptedLlm::default());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let submissions = Arc::new(DealSubmissions::new(db));

        let agent = AgentConfig::default();
        let pos_dyn: Arc<dyn PosService> = pos.clone();
        let tools = register_pos_tools(&pos_dyn, &agent);
        let provider: Arc<dyn LLMProvider> = llm.clone();
        let providers: Arc<dyn ProviderSource> = Arc::new(provider);
        let orchestrator = Arc::new(LlmOrchestrator::new(
            providers.clone(),
            Arc::new(tools),
            agent.clone(),
        ));
        let engine = Arc::new(DialogEngine::new(DialogDeps {
            pos: pos_dyn,
            places: places.clone(),
            orchestrator,
            providers,
            workflow: workflow.clone(),
            submissions: Some(submissions.clone()),
            services: services(),
            agent,
        }));
        Self {
            engine,
            pos,
            places,
            workflow,
            llm,
            submissions,
        }
    }

    pub async fn turn(
        &self,
        tenant: &Arc<TenantConfig>,
        record: &mut ConversationRecord,
        kind: InboundKind,
    ) -> TurnOutcome {
        let inbound = inbound(&record.user, kind);
        self.engine.handle_turn(tenant, record, &inbound).await
    }
}

pub(crate) fn record_for(kind: TenantKind, user: &str) -> ConversationRecord {
    ConversationRecord::fresh("t1", user, kind, chrono::Duration::hours(24))
}

pub(crate) fn inbound(from: &str, kind: InboundKind) -> NormalizedInbound {
    NormalizedInbound {
        tenant_phone_id: "phone-t1".to_string(),
        from: from.to_string(),
        message_id: format!("wamid.{}", uuid::Uuid::new_v4()),
        timestamp: None,
        profile_name: Some("Mei".to_string()),
        kind,
    }
}

pub(crate) fn text(body: &str) -> InboundKind {
    InboundKind::Text {
        body: body.to_string(),
    }
}

pub(crate) fn button(id: &str) -> InboundKind {
    InboundKind::Interactive {
        action_id: id.to_string(),
        title: String::new(),
    }
}

pub(crate) fn location(latitude: f64, longitude: f64, name: &str) -> InboundKind {
    InboundKind::Location {
        latitude,
        longitude,
        name: Some(name.to_string()),
        address: None,
    }
}

pub(crate) fn image(media_id: &str) -> InboundKind {
    InboundKind::Image(MediaRef {
        id: media_id.to_string(),
        mime_type: Some("image/jpeg".to_string()),
        caption: None,
        filename: None,
    })
}
