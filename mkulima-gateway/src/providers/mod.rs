//! External data providers consumed by the flow handlers.
//!
//! Each collaborator sits behind a small trait so handlers can be exercised
//! with fixtures. The HTTP implementations share one convention: transport
//! failures and timeouts are `UpstreamUnavailable`, bodies that do not parse
//! are `MalformedUpstreamResponse`.

mod africastalking;
mod geoapify;
mod gemini;
mod openweather;

pub use africastalking::AfricasTalkingClient;
pub use geoapify::GeoapifyClient;
pub use gemini::GeminiClient;
pub use openweather::OpenWeatherClient;

use async_trait::async_trait;
use mkulima_common::Result;
use serde::Serialize;
use std::time::Duration;

// ============================================================================
// Value Types
// ============================================================================

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    /// Canonical city name as reported by the provider
    pub city: String,
    pub description: String,
    pub temperature_c: f64,
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A point of interest returned by a place search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    /// Provider's one-line address
    pub formatted: Option<String>,
    pub location: Coordinates,
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Current weather lookup by city name.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherReport>;
}

/// Place name to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str, country_code: &str) -> Result<Coordinates>;
}

/// Points of interest around a coordinate.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn nearby(&self, center: Coordinates, radius_m: u32, category: &str) -> Result<Vec<Place>>;
}

/// Text generation with a system instruction.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Outbound SMS delivery.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send `body` to `to`, returning the provider's message id.
    async fn send(&self, to: &str, body: &str) -> Result<String>;
}

/// Build a reqwest client with a bounded timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
