//! Integration tests for the MkulimaMkononi gateway.
//!
//! Drives the router end to end: USSD callbacks through the dialog engine,
//! SMS callbacks through the responder, and a full configuration-built stack
//! against mock provider servers.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use mkulima_common::{Config, FeatureStatus, Result};
use mkulima_gateway::providers::{SmsSender, WeatherProvider, WeatherReport};
use mkulima_gateway::{
    build_router, build_state, create_state, AiQueryHandler, DialogEngine, FlowKind,
    InMemorySessionStore, SmsResponder, WeatherHandler,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FORM: &str = "application/x-www-form-urlencoded";

struct StaticWeather;

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        Ok(WeatherReport {
            city: city.to_string(),
            description: "clear sky".to_string(),
            temperature_c: 26.2,
        })
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SmsSender for RecordingSender {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok("ATXid_test".to_string())
    }
}

struct TestApp {
    router: axum::Router,
    sessions: Arc<InMemorySessionStore>,
    sender: Arc<RecordingSender>,
}

/// Test helper to create a router with fixture providers.
fn create_test_app() -> TestApp {
    let sessions = Arc::new(InMemorySessionStore::new());
    let engine = DialogEngine::new(sessions.clone())
        .with_handler(FlowKind::Weather, Arc::new(WeatherHandler::new(Arc::new(StaticWeather))));

    let sender = Arc::new(RecordingSender::default());
    let sms = SmsResponder::new(Arc::new(AiQueryHandler::unconfigured())).with_sender(sender.clone());

    let features = FeatureStatus {
        weather: true,
        store_locator: false,
        ai: false,
        sms: true,
    };
    let state = create_state(
        Arc::new(engine),
        Arc::new(sms),
        features,
        sessions.clone(),
        Duration::from_secs(5),
    );

    TestApp {
        router: build_router(state),
        sessions,
        sender,
    }
}

/// Helper to post a form and read the text body.
async fn post_form(app: &axum::Router, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn ussd(session: &str, text: &str) -> String {
    format!("sessionId={session}&serviceCode=%2A384%2A1%23&phoneNumber=%2B254700000000&text={text}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Health Check Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let (status, json) = get_json(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "mkulima-gateway");
}

#[tokio::test]
async fn test_ready_reports_features_and_sessions() {
    let app = create_test_app();
    post_form(&app.router, "/", &ussd("r1", "2")).await;

    let (status, json) = get_json(&app.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
    assert_eq!(json["features"]["weather"], true);
    assert_eq!(json["features"]["store_locator"], false);
    assert_eq!(json["active_sessions"], 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// USSD Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ussd_weather_dialog() {
    let app = create_test_app();

    let (status, body) = post_form(&app.router, "/", &ussd("s1", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("CON Welcome to MkulimaMkononi!"));
    assert!(app.sessions.is_empty());

    let (_, body) = post_form(&app.router, "/", &ussd("s1", "2")).await;
    assert_eq!(body, "CON Enter your city or town name:");
    assert_eq!(app.sessions.len(), 1);

    let (_, body) = post_form(&app.router, "/", &ussd("s1", "2%2AKisumu")).await;
    assert_eq!(body, "END Kisumu: clear sky, 26°C");
    assert!(app.sessions.is_empty());
}

#[tokio::test]
async fn test_ussd_route_alias() {
    let app = create_test_app();
    let (_, body) = post_form(&app.router, "/ussd", &ussd("s2", "3*1")).await;
    assert_eq!(body, "END Your registered phone number is: +254700000000");
}

#[tokio::test]
async fn test_ussd_invalid_selection() {
    let app = create_test_app();
    let (status, body) = post_form(&app.router, "/", &ussd("s3", "8")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "END Invalid selection. Please try again.");
}

#[tokio::test]
async fn test_ussd_unconfigured_feature() {
    let app = create_test_app();
    let (_, body) = post_form(&app.router, "/", &ussd("s4", "4")).await;
    assert_eq!(body, "END Agro-dealer locator service is not available right now.");
    assert!(app.sessions.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// SMS Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sms_question_is_answered() {
    let app = create_test_app();
    let (status, body) = post_form(
        &app.router,
        "/sms",
        "from=%2B254711000111&to=12345&text=AI+when+to+plant&date=2024-03-01&id=abc",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let sent = app.sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+254711000111");
    assert_eq!(sent[0].1, "AI service is not available right now.");
}

#[tokio::test]
async fn test_sms_other_text_is_not_answered() {
    let app = create_test_app();
    let (status, body) = post_form(&app.router, "/sms", "from=%2B254711000111&text=Hello").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert!(app.sender.sent.lock().unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration-built stack
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_configured_stack_against_mock_providers() {
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Nakuru"))
        .and(query_param("appid", "ow-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Nakuru",
            "weather": [{ "description": "light rain" }],
            "main": { "temp": 19.7 }
        })))
        .mount(&weather)
        .await;

    let places = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "lat": -0.3031, "lon": 36.08 }]
        })))
        .mount(&places)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/places"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                { "properties": { "name": "Nakuru Farmers Store", "city": "Nakuru", "lat": -0.30, "lon": 36.07 } }
            ]
        })))
        .mount(&places)
        .await;

    let mut config = Config::default();
    config.weather.api_key = Some("ow-key".into());
    config.weather.base_url = weather.uri();
    config.store_locator.api_key = Some("geo-key".into());
    config.store_locator.base_url = places.uri();

    let state = build_state(&config);
    assert!(state.features.weather);
    assert!(!state.features.sms);
    let router = build_router(state);

    post_form(&router, "/", &ussd("c1", "2")).await;
    let (_, body) = post_form(&router, "/", &ussd("c1", "2*Nakuru")).await;
    assert_eq!(body, "END Nakuru: light rain, 20°C");

    post_form(&router, "/", &ussd("c2", "4")).await;
    let (_, body) = post_form(&router, "/", &ussd("c2", "4*Nakuru")).await;
    assert_eq!(
        body,
        "END Agro-dealers near Nakuru:\n\
         1. Nakuru Farmers Store - Nakuru\n\
         Directions: https://www.google.com/maps/dir/?api=1&destination=-0.3,36.07"
    );
}

#[tokio::test]
async fn test_provider_outage_still_ends_session() {
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&weather)
        .await;

    let mut config = Config::default();
    config.weather.api_key = Some("ow-key".into());
    config.weather.base_url = weather.uri();
    config.session.ttl_secs = 0;

    let state = build_state(&config);
    let sessions = state.sessions.clone();
    let router = build_router(state);

    post_form(&router, "/", &ussd("o1", "2")).await;
    let (status, body) = post_form(&router, "/", &ussd("o1", "2*Eldoret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "END Weather service is unavailable. Please try again later.");
    assert!(sessions.is_empty());
}
