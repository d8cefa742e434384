//! Place names to coordinates and back.
//!
//! Forward search uses the Open-Meteo geocoding API; reverse lookups use
//! Nominatim (OpenStreetMap). Both are free and need no API key, but Nominatim
//! requires an identifying User-Agent.

use std::sync::Arc;
use std::time::Duration;

use meshsync_core::{ReqwestErrorExt, ServiceConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{sentinel, Coordinates, GeocodeError, ResolvedLocation, ReverseGeocodeError};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: Option<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

impl NominatimAddress {
    /// city > town > village > county > state, skipping blank components
    fn place_name(self) -> Option<String> {
        [self.city, self.town, self.village, self.county, self.state]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Arc<Client>,
    search_url: String,
    reverse_url: String,
    timeout: Duration,
}

impl Geocoder {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;

        Ok(Self::with_client(Arc::new(client), config))
    }

    /// Share one HTTP client between the geocoder and the weather provider.
    pub fn with_client(client: Arc<Client>, config: &ServiceConfig) -> Self {
        Self {
            client,
            search_url: config.geocoding_url.clone(),
            reverse_url: config.reverse_geocoding_url.clone(),
            timeout: config.geocode_timeout(),
        }
    }

    /// Resolve a free-text place name to the best-ranked match.
    ///
    /// The display name is the API's canonical name, or the query itself when
    /// the result carries none.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, name: &str) -> Result<ResolvedLocation, GeocodeError> {
        let query = name.trim();

        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("name", query),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Geocoding request failed with status: {}", status);
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Transport(e.into_network_error()))?;
        tracing::debug!("Geocoding response: {}", body);

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Parse(e.to_string()))?;

        let first = parsed
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))?;

        let display_name = first
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| query.to_string());

        tracing::info!(
            "Found coordinates {},{} for {}",
            first.latitude,
            first.longitude,
            display_name
        );

        Ok(ResolvedLocation {
            coordinates: Coordinates::new(first.latitude, first.longitude),
            display_name,
        })
    }

    /// Reverse geocode coordinates to a short place name (e.g. "Vienna").
    ///
    /// An address without any usable component yields [`sentinel::UNKNOWN`].
    #[instrument(skip(self), level = "info")]
    pub async fn reverse(&self, coordinates: &Coordinates) -> Result<String, ReverseGeocodeError> {
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();

        let response = self
            .client
            .get(&self.reverse_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
                ("zoom", "10"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ReverseGeocodeError::Transport(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Reverse geocode returned status {}", status);
            return Err(ReverseGeocodeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReverseGeocodeError::Transport(e.into_network_error()))?;

        let parsed: NominatimResponse = serde_json::from_str(&body)
            .map_err(|e| ReverseGeocodeError::Parse(e.to_string()))?;

        let address = parsed.address.ok_or(ReverseGeocodeError::NoAddress)?;
        let place = address
            .place_name()
            .unwrap_or_else(|| sentinel::UNKNOWN.to_string());

        tracing::info!("Reverse geocoded to: {}", place);
        Ok(place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsync_core::NetworkError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(server: &MockServer, timeout_secs: u64) -> Geocoder {
        let config = ServiceConfig {
            geocoding_url: format!("{}/v1/search", server.uri()),
            reverse_geocoding_url: format!("{}/reverse", server.uri()),
            geocode_timeout_secs: timeout_secs,
            ..ServiceConfig::default()
        };
        Geocoder::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_search_takes_first_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Vienna"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"name": "Vienna", "latitude": 48.21, "longitude": 16.37, "country": "Austria"},
                    {"name": "Vienna", "latitude": 38.90, "longitude": -77.26, "country": "United States"}
                ]
            })))
            .mount(&server)
            .await;

        let resolved = geocoder_for(&server, 10).search(" Vienna ").await.unwrap();
        assert_eq!(resolved.display_name, "Vienna");
        assert_eq!(resolved.coordinates, Coordinates::new(48.21, 16.37));
    }

    #[tokio::test]
    async fn test_search_falls_back_to_query_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"latitude": 1.0, "longitude": 2.0}]
            })))
            .mount(&server)
            .await;

        let resolved = geocoder_for(&server, 10).search("Nowhere").await.unwrap();
        assert_eq!(resolved.display_name, "Nowhere");
    }

    #[tokio::test]
    async fn test_search_no_results() {
        let server = MockServer::start().await;

        // Open-Meteo omits "results" entirely when nothing matches
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generationtime_ms": 0.5
            })))
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 10).search("Atlantis").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(ref q) if q == "Atlantis"));
        assert_eq!(err.sentinel(), "City Not Found");
    }

    #[tokio::test]
    async fn test_search_empty_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": []
            })))
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 10).search("Atlantis").await.unwrap_err();
        assert_eq!(err.sentinel(), "City Not Found");
    }

    #[tokio::test]
    async fn test_search_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 10).search("Vienna").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Parse(_)));
        assert_eq!(err.sentinel(), "Parse Error");
    }

    #[tokio::test]
    async fn test_search_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 10).search("Vienna").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status(503)));
        assert_eq!(err.sentinel(), "Geocode Error");
    }

    #[tokio::test]
    async fn test_search_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"results": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 1).search("Vienna").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Transport(NetworkError::Timeout)));
        assert_eq!(err.sentinel(), "Timeout");
    }

    #[tokio::test]
    async fn test_search_connection_refused() {
        let config = ServiceConfig {
            geocoding_url: "http://127.0.0.1:1/v1/search".to_string(),
            ..ServiceConfig::default()
        };
        let err = Geocoder::new(&config).unwrap().search("Vienna").await.unwrap_err();
        assert_eq!(err.sentinel(), "Net Error");
    }

    #[tokio::test]
    async fn test_reverse_prefers_city() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Innere Stadt, Vienna, Austria",
                "address": {"city": "Vienna", "state": "Vienna", "country": "Austria"}
            })))
            .mount(&server)
            .await;

        let name = geocoder_for(&server, 10)
            .reverse(&Coordinates::new(48.21, 16.37))
            .await
            .unwrap();
        assert_eq!(name, "Vienna");
    }

    #[tokio::test]
    async fn test_reverse_falls_through_to_county() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"county": "Bezirk Melk", "state": "Lower Austria"}
            })))
            .mount(&server)
            .await;

        let name = geocoder_for(&server, 10)
            .reverse(&Coordinates::new(48.2, 15.3))
            .await
            .unwrap();
        assert_eq!(name, "Bezirk Melk");
    }

    #[tokio::test]
    async fn test_reverse_skips_blank_components() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"city": "", "town": "  ", "village": "Grinzing", "state": "Vienna"}
            })))
            .mount(&server)
            .await;

        let name = geocoder_for(&server, 10)
            .reverse(&Coordinates::new(48.26, 16.34))
            .await
            .unwrap();
        assert_eq!(name, "Grinzing");
    }

    #[tokio::test]
    async fn test_reverse_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"address": {"city": "Vienna"}}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 1)
            .reverse(&Coordinates::new(48.21, 16.37))
            .await
            .unwrap_err();
        assert!(matches!(err, ReverseGeocodeError::Transport(NetworkError::Timeout)));
    }

    #[tokio::test]
    async fn test_reverse_without_place_component_is_unknown() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"country": "Austria"}
            })))
            .mount(&server)
            .await;

        let name = geocoder_for(&server, 10)
            .reverse(&Coordinates::new(47.0, 13.0))
            .await
            .unwrap();
        assert_eq!(name, "Unknown");
    }

    #[tokio::test]
    async fn test_reverse_missing_address() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Unable to geocode"
            })))
            .mount(&server)
            .await;

        let err = geocoder_for(&server, 10)
            .reverse(&Coordinates::new(0.0, -30.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ReverseGeocodeError::NoAddress));
    }
}
