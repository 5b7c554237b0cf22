use anyhow::Context;
use reqwest::{Client, Url};
use serde_json::json;

use crate::{
    config::WeatherConfig,
    error::{Details, ForecastError, ValidationFailure},
    model::WeatherResult,
    reporter::ErrorReporter,
};

const UNITS: &str = "imperial";

/// Current conditions for a coordinate pair, fetched from an
/// OpenWeather-compatible endpoint.
#[derive(Debug, Clone)]
pub struct WeatherService {
    config: WeatherConfig,
    http: Client,
    reporter: ErrorReporter,
}

impl WeatherService {
    pub fn new(config: WeatherConfig, reporter: ErrorReporter) -> Self {
        Self {
            config,
            http: Client::new(),
            reporter,
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve(
        &self,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<WeatherResult, ForecastError> {
        let mut failure = ValidationFailure::default();

        if lat.is_none() {
            failure.push("Lat is required");
        }
        if lon.is_none() {
            failure.push("Lon is required");
        }

        let api_key = self.config.api_key();
        if api_key.is_none() {
            failure.push_unavailable();
            self.reporter
                .report("Webservice API key missing", None, Details::new())
                .await;
        }

        let endpoint = self.config.endpoint();
        if endpoint.is_none() {
            failure.push_unavailable();
            self.reporter
                .report("Webservice endpoint missing", None, Details::new())
                .await;
        }

        failure.into_result()?;

        let (Some(lat), Some(lon), Some(api_key), Some(endpoint)) = (lat, lon, api_key, endpoint)
        else {
            return Err(ValidationFailure::default().into());
        };

        let url = build_url(endpoint, lat, lon, api_key)?;
        self.fetch(url).await
    }

    async fn fetch(&self, url: Url) -> Result<WeatherResult, ForecastError> {
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .context("Failed to send request to weather provider")?;

        let status = res.status();
        if !status.is_success() {
            let shown = redact(&url);
            let mut details = Details::new();
            details.insert("url".into(), json!(shown));

            self.reporter
                .report(
                    format!(
                        "Weather API error: {} {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or_default(),
                        shown
                    ),
                    Some(status.as_u16()),
                    details,
                )
                .await;

            let mut failure = ValidationFailure::default();
            failure.push_unavailable();
            return Err(failure.into());
        }

        let body = res
            .json()
            .await
            .context("Failed to parse weather provider JSON")?;

        Ok(WeatherResult(body))
    }
}

/// `<endpoint>?lat=..&lon=..&appid=..&units=imperial`
pub fn build_url(endpoint: &str, lat: f64, lon: f64, api_key: &str) -> anyhow::Result<Url> {
    Url::parse_with_params(
        endpoint,
        &[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", api_key.to_string()),
            ("units", UNITS.to_string()),
        ],
    )
    .with_context(|| format!("Invalid weather endpoint: {endpoint}"))
}

/// The URL with its `appid` value masked, for logs and notifications.
fn redact(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "appid" { "[FILTERED]".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
