use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::{
    config::GeocodingConfig,
    error::{Details, ForecastError, ValidationFailure},
    model::{GeocodeResult, Place},
    reporter::ErrorReporter,
};

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Per-lookup limit; a slow provider must not stall the whole resolution.
pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Address lookup backend. Results are returned in provider order.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn search(&self, address: &str, api_key: &str) -> Result<Vec<Place>>;
}

/// Google Maps Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    endpoint: String,
    timeout: Duration,
    http: Client,
}

impl GoogleGeocoder {
    pub fn new() -> Self {
        Self::with_endpoint(GOOGLE_GEOCODE_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: GEOCODE_TIMEOUT,
            http: Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for GoogleGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    #[serde(default)]
    formatted_address: String,
    geometry: Option<GoogleGeometry>,
    #[serde(default)]
    address_components: Vec<GoogleAddressComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: Option<GoogleLatLng>,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GoogleAddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl From<GoogleResult> for Place {
    fn from(result: GoogleResult) -> Self {
        let location = result.geometry.and_then(|g| g.location);
        let postal_code = result
            .address_components
            .into_iter()
            .find(|c| c.types.iter().any(|t| t == "postal_code"))
            .map(|c| c.long_name);

        Place {
            formatted_address: result.formatted_address,
            latitude: location.as_ref().and_then(|l| l.lat),
            longitude: location.as_ref().and_then(|l| l.lng),
            postal_code,
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn search(&self, address: &str, api_key: &str) -> Result<Vec<Place>> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(&[("address", address), ("key", api_key)])
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to send request to Google geocoding")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Google geocoding request failed with status {status}"));
        }

        let parsed: GoogleResponse = res
            .json()
            .await
            .context("Failed to parse Google geocoding JSON")?;

        match parsed.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(parsed.results.into_iter().map(Place::from).collect()),
            other => Err(anyhow!(
                "Google geocoding returned {other}: {}",
                parsed.error_message.unwrap_or_default()
            )),
        }
    }
}

/// Turns a free-text address into coordinates and a postal code.
#[derive(Debug, Clone)]
pub struct GeocodingService {
    config: GeocodingConfig,
    geocoder: Arc<dyn Geocoder>,
    reporter: ErrorReporter,
}

impl GeocodingService {
    pub fn new(config: GeocodingConfig, geocoder: Arc<dyn Geocoder>, reporter: ErrorReporter) -> Self {
        Self {
            config,
            geocoder,
            reporter,
        }
    }

    /// Google-backed service honouring the configured endpoint override.
    pub fn from_config(config: GeocodingConfig, reporter: ErrorReporter) -> Self {
        let geocoder = match config.endpoint() {
            Some(endpoint) => GoogleGeocoder::with_endpoint(endpoint),
            None => GoogleGeocoder::new(),
        };
        Self::new(config, Arc::new(geocoder), reporter)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, address: Option<&str>) -> Result<GeocodeResult, ForecastError> {
        let mut failure = ValidationFailure::default();
        check_address(address, &mut failure);

        let api_key = self.config.api_key();
        if api_key.is_none() {
            failure.push_unavailable();
            self.reporter
                .report(
                    "Geocoding is not initialized properly. Please check your Google Maps API key.",
                    Some(400),
                    details("Invalid Key."),
                )
                .await;
        }

        failure.into_result()?;

        let (Some(address), Some(api_key)) = (address, api_key) else {
            return Err(ValidationFailure::new(ADDRESS_REQUIRED).into());
        };

        let places = match self.geocoder.search(address, api_key).await {
            Ok(places) => places,
            Err(e) => {
                tracing::warn!("Geocoding lookup failed: {e:#}");
                Vec::new()
            }
        };

        let Some(first) = places.into_iter().next() else {
            self.reporter
                .report(
                    format!("Geocoding error: No location found for address: {address}"),
                    Some(400),
                    details("Invalid Address."),
                )
                .await;
            return Err(
                ValidationFailure::new(format!("No location found for address: {address}"))
                    .with_status(400)
                    .into(),
            );
        };

        let result = GeocodeResult::from_place(first);
        tracing::debug!(
            "Geocoded to {} ({:?}, {:?}) postal code {:?}",
            result.location.full_address(),
            result.coordinates.latitude,
            result.coordinates.longitude,
            result.postal_code
        );
        Ok(result)
    }
}

pub(crate) const ADDRESS_REQUIRED: &str = "Address is required";
pub(crate) const ADDRESS_BLANK: &str = "Address can't be blank";

/// Records why an address cannot be used. Input-shape problems are not reported.
pub(crate) fn check_address(address: Option<&str>, failure: &mut ValidationFailure) {
    match address {
        None => failure.push(ADDRESS_REQUIRED),
        Some(a) if a.trim().is_empty() => failure.push(ADDRESS_BLANK),
        Some(_) => {}
    }
}

fn details(message: &str) -> Details {
    let mut details = Details::new();
    details.insert("message".into(), json!(message));
    details
}
