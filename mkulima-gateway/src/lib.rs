//! MkulimaMkononi Gateway - USSD dialog and SMS service for farmers.
//!
//! The telecom gateway posts one webhook per keypress with the accumulated
//! input path. The dialog engine maps the path (or a pending free-text flow)
//! to the next prompt or a final answer, calling out to weather, places and
//! text generation providers for the free-text features.
//!
//! ## Architecture
//!
//! ```text
//! USSD POST / ──► routes ──► DialogEngine ──► MenuTree
//!                                 │
//!                                 └──► SessionStore ──► FlowHandler ──► provider
//!
//! SMS POST /sms ──► SmsResponder ──► AiQueryHandler ──► SmsSender
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod engine;
pub mod handlers;
pub mod menu;
pub mod providers;
pub mod response;
pub mod routes;
pub mod session;
pub mod sms;

pub use engine::{DialogContext, DialogEngine, INVALID_SELECTION};
pub use handlers::{AiQueryHandler, FlowHandler, SearchSettings, StoreLocatorHandler, WeatherHandler};
pub use menu::{MenuNode, MenuTree, NodeKind};
pub use response::DialogResponse;
pub use routes::{build_router, create_state, GatewayState};
pub use session::{FlowKind, InMemorySessionStore, PendingFlow, SessionStore};
pub use sms::{SmsOutcome, SmsResponder};

use mkulima_common::config::Config;
use providers::{AfricasTalkingClient, GeminiClient, GeoapifyClient, OpenWeatherClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Build the gateway state from configuration.
///
/// Features whose credentials are missing get an unconfigured handler and
/// answer with a "not available" message instead of failing.
pub fn build_state(config: &Config) -> Arc<GatewayState> {
    let timeout = config.http.timeout();

    let sessions = Arc::new(match config.session.ttl() {
        Some(ttl) => InMemorySessionStore::with_ttl(ttl),
        None => InMemorySessionStore::new(),
    });

    let weather = match config.weather_api_key() {
        Some(key) => WeatherHandler::new(Arc::new(OpenWeatherClient::new(
            key,
            &config.weather.base_url,
            timeout,
        ))),
        None => WeatherHandler::unconfigured(),
    };

    let locator = match config.geoapify_api_key() {
        Some(key) => {
            let client = Arc::new(GeoapifyClient::new(key, &config.store_locator.base_url, timeout));
            StoreLocatorHandler::new(
                client.clone(),
                client,
                SearchSettings::from(&config.store_locator),
            )
        }
        None => StoreLocatorHandler::unconfigured(),
    };

    let ai = match config.ai_api_key() {
        Some(key) => AiQueryHandler::new(Arc::new(GeminiClient::new(
            key,
            &config.ai.model,
            &config.ai.base_url,
            timeout,
        ))),
        None => AiQueryHandler::unconfigured(),
    }
    .with_max_reply_chars(config.ai.max_reply_chars);

    let mut sms = SmsResponder::new(Arc::new(ai));
    if let Some((username, api_key)) = config.sms_credentials() {
        let mut client = AfricasTalkingClient::new(username, api_key, config.sms.endpoint(), timeout);
        if let Some(sender_id) = config.sms.sender_id.as_deref().filter(|s| !s.trim().is_empty()) {
            client = client.with_sender_id(sender_id.trim());
        }
        sms = sms.with_sender(Arc::new(client));
    }

    let engine = DialogEngine::new(sessions.clone())
        .with_handler(FlowKind::Weather, Arc::new(weather))
        .with_handler(FlowKind::StoreLocator, Arc::new(locator));

    // The locator makes two sequential provider calls
    let request_timeout = timeout * 2 + Duration::from_secs(2);

    create_state(
        Arc::new(engine),
        Arc::new(sms),
        config.feature_status(),
        sessions,
        request_timeout,
    )
}

/// Start the gateway HTTP server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    config.warn_missing_credentials();
    let state = build_state(config);
    let sessions = state.sessions.clone();
    let router = build_router(state);

    // Sweep pending flows nobody answered
    let purge_every = Duration::from_secs(config.session.purge_interval_secs.max(1));
    let purge_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            sessions.purge_expired();
        }
    });

    tracing::info!("Starting MkulimaMkononi gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge_handle.abort();
    tracing::info!("Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
