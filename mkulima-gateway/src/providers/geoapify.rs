//! Geoapify geocoding and places client.
//!
//! One client serves both stages of the agro-dealer search:
//! `/v1/geocode/search` to turn an area name into coordinates, then
//! `/v2/places` for points of interest inside a circle around them.

use super::{http_client, Coordinates, Geocoder, Place, PlaceSearch};
use async_trait::async_trait;
use mkulima_common::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const GEOCODER: &str = "geocoder";
const PLACES: &str = "places";

/// Places returned per search before deduplication.
const PLACES_LIMIT: u32 = 20;

pub struct GeoapifyClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeoapifyClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{endpoint}", self.base_url))
            .query(query)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| Error::from_http(service, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(service, status.as_u16(), &body));
        }

        response.json().await.map_err(|e| Error::from_http(service, e))
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: PlaceProperties,
}

#[derive(Debug, Deserialize)]
struct PlaceProperties {
    name: Option<String>,
    street: Option<String>,
    city: Option<String>,
    formatted: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl PlaceProperties {
    fn into_place(self) -> Option<Place> {
        Some(Place {
            location: Coordinates::new(self.lat?, self.lon?),
            name: self.name,
            street: self.street,
            city: self.city,
            formatted: self.formatted,
        })
    }
}

#[async_trait]
impl Geocoder for GeoapifyClient {
    async fn geocode(&self, place: &str, country_code: &str) -> Result<Coordinates> {
        let response: GeocodeResponse = self
            .get_json(
                GEOCODER,
                "/v1/geocode/search",
                &[
                    ("text", place.to_string()),
                    ("filter", format!("countrycode:{}", country_code.to_ascii_lowercase())),
                    ("limit", "1".to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;

        response
            .results
            .first()
            .map(|r| Coordinates::new(r.lat, r.lon))
            .ok_or_else(|| Error::NotFound(format!("place '{place}'")))
    }
}

#[async_trait]
impl PlaceSearch for GeoapifyClient {
    async fn nearby(&self, center: Coordinates, radius_m: u32, category: &str) -> Result<Vec<Place>> {
        let response: PlacesResponse = self
            .get_json(
                PLACES,
                "/v2/places",
                &[
                    ("categories", category.to_string()),
                    (
                        "filter",
                        format!("circle:{},{},{radius_m}", center.longitude, center.latitude),
                    ),
                    (
                        "bias",
                        format!("proximity:{},{}", center.longitude, center.latitude),
                    ),
                    ("limit", PLACES_LIMIT.to_string()),
                ],
            )
            .await?;

        let places: Vec<Place> = response
            .features
            .into_iter()
            .filter_map(|f| f.properties.into_place())
            .collect();

        tracing::debug!(count = places.len(), "Places search returned results");
        Ok(places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeoapifyClient {
        GeoapifyClient::new("geo-key", server.uri(), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_geocode_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/geocode/search"))
            .and(query_param("text", "Ruiru"))
            .and(query_param("filter", "countrycode:ke"))
            .and(query_param("apiKey", "geo-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "lat": -1.1466, "lon": 36.9609, "formatted": "Ruiru, Kiambu, Kenya" },
                    { "lat": 0.0, "lon": 0.0 }
                ]
            })))
            .mount(&server)
            .await;

        let coords = client(&server).geocode("Ruiru", "KE").await.unwrap();
        assert_eq!(coords, Coordinates::new(-1.1466, 36.9609));
    }

    #[tokio::test]
    async fn test_geocode_no_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/geocode/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let err = client(&server).geocode("Nowhere", "ke").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_places_around_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/places"))
            .and(query_param("categories", "commercial.agrarian"))
            .and(query_param("filter", "circle:36.9609,-1.1466,5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "FeatureCollection",
                "features": [
                    { "properties": {
                        "name": "Ruiru Agrovet", "street": "Thika Road", "city": "Ruiru",
                        "formatted": "Ruiru Agrovet, Thika Road, Ruiru", "lat": -1.15, "lon": 36.96
                    } },
                    { "properties": { "name": "No Location" } },
                    { "properties": { "lat": -1.14, "lon": 36.95 } }
                ]
            })))
            .mount(&server)
            .await;

        let places = client(&server)
            .nearby(Coordinates::new(-1.1466, 36.9609), 5000, "commercial.agrarian")
            .await
            .unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name.as_deref(), Some("Ruiru Agrovet"));
        assert_eq!(places[0].street.as_deref(), Some("Thika Road"));
        assert!(places[1].name.is_none());
    }

    #[tokio::test]
    async fn test_places_unauthorized_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/places"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid apiKey"))
            .mount(&server)
            .await;

        let err = client(&server)
            .nearby(Coordinates::new(-1.0, 36.0), 1000, "commercial.agrarian")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamUnavailable {
                service: "places",
                status: Some(401),
                ..
            }
        ));
    }
}
