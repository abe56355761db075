//! OpenWeatherMap current-weather client.

use super::{http_client, WeatherProvider, WeatherReport};
use async_trait::async_trait;
use mkulima_common::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "weather";

/// Client for `GET /data/2.5/weather`.
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    weather: Vec<Condition>,
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| Error::from_http(SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("city '{city}'")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(SERVICE, status.as_u16(), &body));
        }

        let body: CurrentWeatherResponse = response
            .json()
            .await
            .map_err(|e| Error::from_http(SERVICE, e))?;

        let condition = body
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(SERVICE, "no weather conditions in response"))?;

        Ok(WeatherReport {
            city: if body.name.is_empty() {
                city.to_string()
            } else {
                body.name
            },
            description: condition.description,
            temperature_c: body.main.temp,
        })
    }
}
