/// HTTP surface of the service.
///
/// `/webhook` receives the WhatsApp subscription handshake (GET) and signed
/// deliveries (POST). Deliveries are acknowledged as soon as ingress
/// validation passes and processed on tracked background tasks.
/// `/test-webhook` rotates tenant credentials, `/api/n8n/status` receives
/// publishing-workflow progress and `/api/health` reports liveness.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::errors::WahubError;
use crate::tenants::{CredentialRotation, TenantConfig, TenantDirectory};
use crate::utils::task_tracker::TaskTracker;
use crate::whatsapp::{
    HandshakeQuery, NormalizedInbound, SIGNATURE_HEADER, envelope_phone_id, validate_and_parse,
    verify_handshake,
};
use crate::workflow::{DealSubmissions, StatusCallback};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct GatewayState {
    config: Arc<GatewayConfig>,
    tenants: Arc<TenantDirectory>,
    dispatcher: Arc<Dispatcher>,
    submissions: Arc<DealSubmissions>,
    tasks: TaskTracker,
}

impl GatewayState {
    pub fn new(
        config: GatewayConfig,
        tenants: Arc<TenantDirectory>,
        dispatcher: Arc<Dispatcher>,
        submissions: Arc<DealSubmissions>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tenants,
            dispatcher,
            submissions,
            tasks: TaskTracker::new(),
        }
    }

    /// Background turns spawned after acknowledging a delivery.
    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Wait for in-flight turns; abort whatever is still running after `grace`.
    pub async fn drain(&self, grace: Duration) -> bool {
        if self.tasks.wait_idle(grace).await {
            return true;
        }
        warn!(
            "{} turn(s) still running after {:?}, aborting",
            self.tasks.in_flight().await,
            grace
        );
        self.tasks.cancel_all().await;
        false
    }
}

/// Build the router. Unsupported methods on a known path get 405.
pub fn build_router(state: GatewayState) -> Router {
    let body_limit = state.config.max_body_bytes.saturating_add(1);
    Router::new()
        .route("/webhook", get(handshake_handler).post(webhook_handler))
        .route("/test-webhook", post(rotate_credentials_handler))
        .route("/api/n8n/status", post(workflow_status_handler))
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn error_response(err: &WahubError) -> Response {
    (err.status_code(), Json(json!({"error": err.to_string()}))).into_response()
}

fn header_matches(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| bool::from(v.trim().as_bytes().ct_eq(expected.as_bytes())))
}

/// GET /webhook: subscription handshake.
async fn handshake_handler(
    State(state): State<GatewayState>,
    Query(query): Query<HandshakeQuery>,
) -> Response {
    let token = query.verify_token.as_deref().unwrap_or_default();
    let fallback = &state.config.verify_token;
    let mut accepted =
        !token.is_empty() && !fallback.is_empty() && bool::from(token.as_bytes().ct_eq(fallback.as_bytes()));
    if !accepted {
        accepted = state
            .tenants
            .verify_token_matches(token)
            .await
            .unwrap_or_else(|e| {
                error!("verify token lookup failed: {}", e);
                false
            });
    }

    match verify_handshake(&query, accepted) {
        Ok(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        Err(e) => {
            warn!("webhook handshake rejected (mode={:?})", query.mode);
            e.status_code().into_response()
        }
    }
}

/// Signature presence, tenant lookup, signature check and normalization, in
/// that order. An unsigned body is refused before it is parsed.
async fn ingress(
    state: &GatewayState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(Arc<TenantConfig>, Vec<NormalizedInbound>), WahubError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty());
    if signature.is_none() && !state.config.allow_unsigned {
        return Err(WahubError::MissingSignature);
    }
    let phone_id = envelope_phone_id(body)?;
    let tenant = state.tenants.resolve(&phone_id).await?;
    let inbound = validate_and_parse(
        body,
        signature,
        &tenant.whatsapp.app_secret,
        state.config.allow_unsigned,
    )?;
    let (ours, foreign): (Vec<_>, Vec<_>) = inbound
        .into_iter()
        .partition(|m| m.tenant_phone_id == phone_id);
    if !foreign.is_empty() {
        warn!(
            "tenant {}: ignoring {} message(s) addressed to another phone number",
            tenant.tenant_id,
            foreign.len()
        );
    }
    Ok((tenant, ours))
}

/// POST /webhook: signed delivery callback.
async fn webhook_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.config.max_body_bytes {
        warn!("webhook payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let (tenant, inbound) = match ingress(&state, &headers, &body).await {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("webhook rejected: {}", e);
            return error_response(&e);
        }
    };

    debug!(
        "tenant {}: accepted webhook with {} message(s)",
        tenant.tenant_id,
        inbound.len()
    );
    for message in inbound {
        let dispatcher = state.dispatcher.clone();
        let tenant = tenant.clone();
        let name = format!("{}:{}", tenant.tenant_id, message.message_id);
        state
            .tasks
            .spawn(name, async move {
                dispatcher.dispatch(&tenant, &message).await;
            })
            .await;
    }

    Json(json!({"status": "success"})).into_response()
}

/// POST /test-webhook: administrative credential rotation.
async fn rotate_credentials_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let admin = &state.config.test_webhook;
    if !admin.enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    if admin.admin_token.is_empty() || !header_matches(&headers, ADMIN_TOKEN_HEADER, &admin.admin_token)
    {
        warn!("credential rotation rejected: bad admin token");
        return StatusCode::FORBIDDEN.into_response();
    }
    let rotation: CredentialRotation = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response();
        }
    };
    if rotation.tenant_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "tenantId is required"})),
        )
            .into_response();
    }

    match state.tenants.rotate_credentials(&rotation).await {
        Ok(config) => Json(json!({
            "status": "updated",
            "tenantId": config.tenant_id,
            "phoneNumberId": config.whatsapp.phone_number_id,
        }))
        .into_response(),
        Err(WahubError::TenantNotConfigured(id)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("unknown tenant {}", id)})),
        )
            .into_response(),
        Err(e @ WahubError::Config(_)) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response()
        }
        Err(e) => {
            error!("credential rotation failed: {}", e);
            error_response(&e)
        }
    }
}

/// POST /api/n8n/status: publishing workflow progress for a deal.
async fn workflow_status_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = &state.config.callback_token;
    if !token.is_empty() && !header_matches(&headers, CALLBACK_TOKEN_HEADER, token) {
        warn!("workflow callback rejected: bad callback token");
        return StatusCode::FORBIDDEN.into_response();
    }
    let update: StatusCallback = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response();
        }
    };

    let submission = match state.submissions.apply_callback(&update) {
        Ok(Some(s)) => s,
        Ok(None) => {
            debug!("workflow callback for unknown deal {}", update.deal_id);
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "unknown deal"})),
            )
                .into_response();
        }
        Err(e) => {
            error!("failed to record workflow status for {}: {}", update.deal_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    info!(
        "deal {} is now {} ({} posted, {} failed)",
        update.deal_id,
        update.status,
        update.platforms_posted.len(),
        update.platforms_failed.len()
    );

    let tenant = match state.tenants.config(&submission.payload.tenant_id).await {
        Ok(t) => t,
        Err(e) => {
            warn!(
                "deal {}: cannot notify submitter, tenant unavailable: {}",
                update.deal_id, e
            );
            return Json(json!({"status": "ok", "notified": false})).into_response();
        }
    };
    let dispatcher = state.dispatcher.clone();
    let user = submission.payload.submitted_by.clone();
    let text = submission.status_summary();
    state
        .tasks
        .spawn(format!("deal:{}", update.deal_id), async move {
            dispatcher.notify(&tenant, &user, &text).await;
        })
        .await;

    Json(json!({"status": "ok", "notified": true})).into_response()
}

/// GET /api/health: health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// Bind and serve. Returns the server's join handle.
pub async fn start(state: GatewayState) -> Result<tokio::task::JoinHandle<()>> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("gateway listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("gateway server error: {}", e);
        }
    });
    Ok(handle)
}
