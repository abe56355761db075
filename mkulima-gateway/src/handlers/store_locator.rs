//! Agro-dealer locator flow: area name in, nearby dealers out.
//!
//! Two provider calls: the area is geocoded inside the configured country,
//! then points of interest in the farming-supplies category are searched
//! within a radius of the result. The reply lists a few distinct dealers and
//! a directions link to the closest one.

use super::FlowHandler;
use crate::providers::{Geocoder, Place, PlaceSearch};
use crate::session::FlowKind;
use async_trait::async_trait;
use mkulima_common::util::truncate_with_ellipsis;
use mkulima_common::{Error, StoreLocatorConfig};
use std::collections::HashSet;
use std::sync::Arc;

/// Dealers listed per reply.
pub const MAX_RESULTS: usize = 3;

const MAX_NAME_CHARS: usize = 30;
const MAX_ADDRESS_CHARS: usize = 40;
const DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/?api=1&destination=";

/// Search parameters taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub country_code: String,
    pub radius_m: u32,
    pub category: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&StoreLocatorConfig::default())
    }
}

impl From<&StoreLocatorConfig> for SearchSettings {
    fn from(config: &StoreLocatorConfig) -> Self {
        Self {
            country_code: config.country_code.clone(),
            radius_m: config.radius_m,
            category: config.category.clone(),
        }
    }
}

struct Backends {
    geocoder: Arc<dyn Geocoder>,
    places: Arc<dyn PlaceSearch>,
}

pub struct StoreLocatorHandler {
    backends: Option<Backends>,
    settings: SearchSettings,
}

impl StoreLocatorHandler {
    pub fn new(geocoder: Arc<dyn Geocoder>, places: Arc<dyn PlaceSearch>, settings: SearchSettings) -> Self {
        Self {
            backends: Some(Backends { geocoder, places }),
            settings,
        }
    }

    /// Handler for a deployment without a places API key.
    pub fn unconfigured() -> Self {
        Self {
            backends: None,
            settings: SearchSettings::default(),
        }
    }

    async fn search(&self, backends: &Backends, area: &str) -> Result<Vec<Place>, Error> {
        let center = backends
            .geocoder
            .geocode(area, &self.settings.country_code)
            .await?;
        tracing::debug!(
            area,
            latitude = center.latitude,
            longitude = center.longitude,
            "Area geocoded"
        );
        backends
            .places
            .nearby(center, self.settings.radius_m, &self.settings.category)
            .await
    }

    fn failure_text(area: &str, err: &Error) -> String {
        match err {
            Error::NotFound(_) => {
                format!("Area '{area}' not found. Please check the spelling and try again.")
            }
            Error::MalformedUpstreamResponse { .. } => {
                "Could not read the agro-dealer results. Please try again later.".to_string()
            }
            _ => "Agro-dealer search is unavailable. Please try again later.".to_string(),
        }
    }
}

/// Keep named places, first occurrence of each name (case-insensitive).
fn distinct_named(places: Vec<Place>) -> Vec<Place> {
    let mut seen = HashSet::new();
    places
        .into_iter()
        .filter(|p| {
            p.name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .is_some_and(|n| seen.insert(n.to_lowercase()))
        })
        .take(MAX_RESULTS)
        .collect()
}

/// Best-effort one-line address.
fn address(place: &Place) -> String {
    let parts: Vec<&str> = [place.street.as_deref(), place.city.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if !parts.is_empty() {
        return parts.join(", ");
    }
    place
        .formatted
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or("address not listed")
        .to_string()
}

fn format_results(area: &str, places: &[Place]) -> String {
    let mut lines = vec![format!("Agro-dealers near {area}:")];
    for (i, place) in places.iter().enumerate() {
        let name = place.name.as_deref().unwrap_or_default().trim();
        lines.push(format!(
            "{}. {} - {}",
            i + 1,
            truncate_with_ellipsis(name, MAX_NAME_CHARS),
            truncate_with_ellipsis(&address(place), MAX_ADDRESS_CHARS)
        ));
    }
    if let Some(top) = places.first() {
        lines.push(format!(
            "Directions: {DIRECTIONS_URL}{},{}",
            top.location.latitude, top.location.longitude
        ));
    }
    lines.join("\n")
}

#[async_trait]
impl FlowHandler for StoreLocatorHandler {
    fn name(&self) -> &'static str {
        "store_locator"
    }

    fn is_available(&self) -> bool {
        self.backends.is_some()
    }

    async fn resolve(&self, input: &str) -> String {
        let Some(backends) = &self.backends else {
            return FlowKind::StoreLocator.not_available_text();
        };

        let area = input.trim();
        if area.is_empty() {
            return "No area entered. Please try again.".to_string();
        }

        match self.search(backends, area).await {
            Ok(places) => {
                let dealers = distinct_named(places);
                if dealers.is_empty() {
                    tracing::info!(area, "No agro-dealers in range");
                    return format!("No agro-dealers found near {area}.");
                }
                format_results(area, &dealers)
            }
            Err(e) => {
                tracing::warn!(error_kind = e.kind(), area, error = %e, "Agro-dealer search failed");
                Self::failure_text(area, &e)
            }
        }
    }
}
