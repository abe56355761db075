//! Weather forecast flow: city name in, current conditions out.

use super::FlowHandler;
use crate::providers::{WeatherProvider, WeatherReport};
use crate::session::FlowKind;
use async_trait::async_trait;
use mkulima_common::Error;
use std::sync::Arc;

pub struct WeatherHandler {
    provider: Option<Arc<dyn WeatherProvider>>,
}

impl WeatherHandler {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Handler for a deployment without a weather API key.
    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    fn format_report(report: &WeatherReport) -> String {
        format!(
            "{}: {}, {}°C",
            report.city,
            report.description,
            report.temperature_c.round() as i64
        )
    }

    fn failure_text(city: &str, err: &Error) -> String {
        match err {
            Error::NotFound(_) => {
                format!("City '{city}' not found. Please check the spelling and try again.")
            }
            Error::MalformedUpstreamResponse { .. } => {
                "Could not read the weather report. Please try again later.".to_string()
            }
            _ => "Weather service is unavailable. Please try again later.".to_string(),
        }
    }
}

#[async_trait]
impl FlowHandler for WeatherHandler {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    async fn resolve(&self, input: &str) -> String {
        let Some(provider) = &self.provider else {
            return FlowKind::Weather.not_available_text();
        };

        let city = input.trim();
        if city.is_empty() {
            return "No city name entered. Please try again.".to_string();
        }

        match provider.current(city).await {
            Ok(report) => {
                tracing::debug!(city = %report.city, "Weather lookup succeeded");
                Self::format_report(&report)
            }
            Err(e) => {
                tracing::warn!(error_kind = e.kind(), city, error = %e, "Weather lookup failed");
                Self::failure_text(city, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::fakes::FixtureWeather;
    use std::sync::atomic::Ordering;

    fn handler() -> (WeatherHandler, Arc<FixtureWeather>) {
        let provider = Arc::new(FixtureWeather::default());
        (WeatherHandler::new(provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_known_city() {
        let (handler, _) = handler();
        assert_eq!(handler.resolve("Nairobi").await, "Nairobi: scattered clouds, 24°C");
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let (handler, _) = handler();
        assert_eq!(handler.resolve("  nairobi ").await, "Nairobi: scattered clouds, 24°C");
    }

    #[tokio::test]
    async fn test_unknown_city() {
        let (handler, _) = handler();
        assert_eq!(
            handler.resolve("Atlantis").await,
            "City 'Atlantis' not found. Please check the spelling and try again."
        );
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let (handler, provider) = handler();
        assert_eq!(handler.resolve("   ").await, "No city name entered. Please try again.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_kinds_have_distinct_text() {
        let (handler, _) = handler();
        let unavailable = handler.resolve("outage").await;
        let malformed = handler.resolve("garbled").await;
        let not_found = handler.resolve("Atlantis").await;

        assert_eq!(unavailable, "Weather service is unavailable. Please try again later.");
        assert_eq!(malformed, "Could not read the weather report. Please try again later.");
        assert_ne!(unavailable, not_found);
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let handler = WeatherHandler::unconfigured();
        assert!(!handler.is_available());
        assert_eq!(
            handler.resolve("Nairobi").await,
            "Weather service is not available right now."
        );
    }

    #[test]
    fn test_temperature_rounding() {
        let report = |t| WeatherReport {
            city: "Eldoret".into(),
            description: "light rain".into(),
            temperature_c: t,
        };
        assert_eq!(WeatherHandler::format_report(&report(17.5)), "Eldoret: light rain, 18°C");
        assert_eq!(WeatherHandler::format_report(&report(17.49)), "Eldoret: light rain, 17°C");
        assert_eq!(WeatherHandler::format_report(&report(-0.4)), "Eldoret: light rain, 0°C");
    }
}
