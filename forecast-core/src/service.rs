use std::{sync::Arc, time::Duration};

use crate::{
    cache::CacheStore,
    config::Config,
    error::{ForecastError, ValidationFailure},
    geocode::{GeocodingService, check_address},
    model::{Forecast, GeocodeResult, cache_key},
    reporter::ErrorReporter,
    weather::WeatherService,
};

/// How long an assembled forecast stays in the cache.
pub const FORECAST_TTL: Duration = Duration::from_secs(30 * 60);

/// Address → geocode → cached-or-fresh weather.
///
/// Concurrent misses for the same postal code are not deduplicated; each
/// fetches weather and writes the cache, and the last write wins.
#[derive(Debug, Clone)]
pub struct ForecastService {
    geocoding: GeocodingService,
    weather: WeatherService,
    cache: Arc<dyn CacheStore>,
}

impl ForecastService {
    pub fn new(geocoding: GeocodingService, weather: WeatherService, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            geocoding,
            weather,
            cache,
        }
    }

    /// Wires the Google geocoder and the configured weather endpoint together.
    pub fn from_config(config: &Config, reporter: ErrorReporter, cache: Arc<dyn CacheStore>) -> Self {
        Self::new(
            GeocodingService::from_config(config.geocoding.clone(), reporter.clone()),
            WeatherService::new(config.weather.clone(), reporter),
            cache,
        )
    }

    /// Resolves `address` into a forecast.
    ///
    /// Validation failures from either lookup are returned as-is. A failing
    /// cache write is returned as [`ForecastError::Transport`] even though the
    /// forecast itself was computed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, address: Option<&str>) -> Result<Forecast, ForecastError> {
        let mut failure = ValidationFailure::default();
        check_address(address, &mut failure);
        failure.into_result()?;

        let geocode = self.geocoding.resolve(address).await?;
        let key = cache_key(geocode.postal_code.as_deref());

        if let Some(forecast) = self.read_cached(&key).await? {
            tracing::debug!(key, "Serving forecast from cache");
            return Ok(forecast);
        }

        let address = address.unwrap_or_default();
        self.fetch_and_cache(address, geocode, &key).await
    }

    async fn read_cached(&self, key: &str) -> Result<Option<Forecast>, ForecastError> {
        let Some(value) = self.cache.read(key).await? else {
            return Ok(None);
        };

        if value.is_null() || value.as_object().is_some_and(|o| o.is_empty()) {
            return Ok(None);
        }

        match Forecast::from_cached(value) {
            Ok(forecast) => Ok(Some(forecast)),
            Err(e) => {
                tracing::warn!(key, "Discarding unreadable cache entry: {e:#}");
                Ok(None)
            }
        }
    }

    async fn fetch_and_cache(
        &self,
        address: &str,
        geocode: GeocodeResult,
        key: &str,
    ) -> Result<Forecast, ForecastError> {
        let coordinates = geocode.coordinates;
        let weather = self
            .weather
            .resolve(coordinates.latitude, coordinates.longitude)
            .await?;

        let forecast = Forecast::assemble(address, geocode, weather);
        self.cache
            .write(key, forecast.to_value()?, FORECAST_TTL)
            .await?;

        tracing::debug!(key, "Cached fresh forecast");
        Ok(forecast)
    }
}
