//! HTTP routes for the USSD and SMS webhooks.
//!
//! - `/` and `/ussd`: USSD callback (form POST or query GET), answers
//!   `CON ...` / `END ...` as plain text
//! - `/sms`: inbound SMS callback, always answers `OK`
//! - `/health`, `/ready`: liveness and readiness checks

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use mkulima_common::logging::generate_trace_id;
use mkulima_common::util::mask_phone;
use mkulima_common::FeatureStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;

use crate::engine::{DialogContext, DialogEngine};
use crate::response::DialogResponse;
use crate::session::InMemorySessionStore;
use crate::sms::{SmsOutcome, SmsResponder};

const SERVICE_NAME: &str = "mkulima-gateway";

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Terminal text for a USSD turn that missed its deadline.
pub const TURN_TIMED_OUT: &str = "Sorry, the service is taking too long. Please try again.";

/// Slack between the USSD turn deadline and the transport deadline, so the
/// turn can still answer in dialog format.
const TRANSPORT_SLACK: Duration = Duration::from_secs(1);

// ============================================================================
// State
// ============================================================================

/// Shared state for the gateway HTTP server.
pub struct GatewayState {
    pub engine: Arc<DialogEngine>,
    pub sms: Arc<SmsResponder>,
    /// Features enabled by configuration at startup
    pub features: FeatureStatus,
    /// Session store, for readiness reporting
    pub sessions: Arc<InMemorySessionStore>,
    /// Deadline for one USSD turn
    pub request_timeout: Duration,
}

/// Create the gateway state.
pub fn create_state(
    engine: Arc<DialogEngine>,
    sms: Arc<SmsResponder>,
    features: FeatureStatus,
    sessions: Arc<InMemorySessionStore>,
    request_timeout: Duration,
) -> Arc<GatewayState> {
    Arc::new(GatewayState {
        engine,
        sms,
        features,
        sessions,
        request_timeout,
    })
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// USSD callback fields, as sent by the telecom gateway.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub service_code: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl UssdRequest {
    fn context(&self) -> DialogContext {
        let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        DialogContext {
            phone_number: present(&self.phone_number),
            service_code: present(&self.service_code),
        }
    }
}

/// Inbound SMS callback fields. Extra fields (`to`, `date`, `id`, ...) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SmsRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    features: FeatureStatus,
    active_sessions: usize,
}

// ============================================================================
// Health Routes
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(ReadyResponse {
        status: "ready",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        features: state.features,
        active_sessions: state.sessions.len(),
    })
}

// ============================================================================
// USSD Callback
// ============================================================================

async fn ussd_get(State(state): State<Arc<GatewayState>>, Query(req): Query<UssdRequest>) -> String {
    dialog_turn(&state, req).await
}

async fn ussd_post(State(state): State<Arc<GatewayState>>, Form(req): Form<UssdRequest>) -> String {
    dialog_turn(&state, req).await
}

async fn dialog_turn(state: &GatewayState, req: UssdRequest) -> String {
    let trace_id = generate_trace_id();
    let span = tracing::info_span!(
        "ussd",
        trace_id = %trace_id,
        session_id = %req.session_id,
    );

    async move {
        let ctx = req.context();
        tracing::info!(
            phone = %ctx.phone_number.as_deref().map(mask_phone).unwrap_or_default(),
            service_code = ctx.service_code.as_deref().unwrap_or_default(),
            text = %req.text,
            "USSD request"
        );

        let turn = state.engine.handle(&req.session_id, &req.text, &ctx);
        let response = match tokio::time::timeout(state.request_timeout, turn).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(error_kind = "upstream_unavailable", "USSD turn timed out");
                DialogResponse::end(TURN_TIMED_OUT)
            }
        };
        tracing::info!(terminal = response.is_terminal(), "USSD response");
        response.to_wire()
    }
    .instrument(span)
    .await
}

// ============================================================================
// SMS Callback
// ============================================================================

async fn sms_webhook(
    State(state): State<Arc<GatewayState>>,
    form: Result<Form<SmsRequest>, FormRejection>,
) -> &'static str {
    let req = match form {
        Ok(Form(req)) => req,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable SMS callback");
            return "OK";
        }
    };

    let span = tracing::info_span!("sms", trace_id = %generate_trace_id());
    async move {
        tracing::info!(from = %mask_phone(&req.from), "Inbound SMS");
        match state.sms.handle_inbound(&req.from, &req.text).await {
            SmsOutcome::Replied { message_id, .. } => {
                tracing::info!(message_id = %message_id, "SMS answered");
            }
            SmsOutcome::Help => tracing::debug!("SMS ignored"),
            SmsOutcome::NotSent { .. } | SmsOutcome::SendFailed { .. } => {
                tracing::debug!("SMS answer not delivered");
            }
        }
    }
    .instrument(span)
    .await;

    "OK"
}

// ============================================================================
// Router
// ============================================================================

/// Build the gateway router.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let transport_timeout = state.request_timeout + TRANSPORT_SLACK;

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Telecom callbacks
        .route("/", get(ussd_get).post(ussd_post))
        .route("/ussd", get(ussd_get).post(ussd_post))
        .route("/sms", post(sms_webhook))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, transport_timeout))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
