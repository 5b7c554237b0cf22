use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A place returned by the geocoding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub formatted_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub postal_code: Option<String>,
}

impl Place {
    pub fn full_address(&self) -> &str {
        &self.formatted_address
    }
}

/// Latitude/longitude pair; either side may be missing from the provider's answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub location: Place,
    pub coordinates: Coordinates,
    pub postal_code: Option<String>,
}

impl GeocodeResult {
    /// Built from the provider's first match.
    pub fn from_place(place: Place) -> Self {
        Self {
            coordinates: Coordinates::new(place.latitude, place.longitude),
            postal_code: place.postal_code.clone(),
            location: place,
        }
    }
}

/// Raw weather document as returned by the provider.
///
/// Nothing about its shape is guaranteed, so every accessor returns `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherResult(pub Value);

impl WeatherResult {
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name")?.as_str().filter(|s| !s.is_empty())
    }

    pub fn country(&self) -> Option<&str> {
        self.0.pointer("/sys/country")?.as_str()
    }

    pub fn temp(&self) -> Option<f64> {
        self.main("temp")
    }

    pub fn feels_like(&self) -> Option<f64> {
        self.main("feels_like")
    }

    pub fn temp_min(&self) -> Option<f64> {
        self.main("temp_min")
    }

    pub fn temp_max(&self) -> Option<f64> {
        self.main("temp_max")
    }

    pub fn humidity(&self) -> Option<f64> {
        self.main("humidity")
    }

    pub fn description(&self) -> Option<&str> {
        self.0.pointer("/weather/0/description")?.as_str()
    }

    pub fn icon(&self) -> Option<&str> {
        self.0
            .pointer("/weather/0/icon")?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.0.pointer("/wind/speed")?.as_f64()
    }

    fn main(&self, field: &str) -> Option<f64> {
        self.0.get("main")?.get(field)?.as_f64()
    }
}

/// Cache key for a postal code. An absent postal code still yields a
/// (shared) key.
pub fn cache_key(postal_code: Option<&str>) -> String {
    format!("forecast_{}", postal_code.unwrap_or_default())
}

/// Address lookup plus current weather, with cache provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub address: String,
    pub location: Place,
    pub coordinates: Coordinates,
    pub postal_code: Option<String>,
    pub weather: WeatherResult,
    pub from_cache: bool,
}

impl Forecast {
    /// Freshly assembled forecast.
    pub fn assemble(address: &str, geocode: GeocodeResult, weather: WeatherResult) -> Self {
        Self {
            address: address.to_string(),
            location: geocode.location,
            coordinates: geocode.coordinates,
            postal_code: geocode.postal_code,
            weather,
            from_cache: false,
        }
    }

    /// Plain mapping suitable for the cache store.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).context("Failed to serialize forecast")
    }

    /// Rebuilds a forecast read back from the cache; always marked as cached.
    pub fn from_cached(value: Value) -> Result<Self> {
        let mut forecast: Forecast =
            serde_json::from_value(value).context("Failed to deserialize cached forecast")?;
        forecast.from_cache = true;
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn place() -> Place {
        Place {
            formatted_address: "New York, NY 10001, USA".into(),
            latitude: Some(40.7128),
            longitude: Some(-74.006),
            postal_code: Some("10001".into()),
        }
    }

    fn weather() -> WeatherResult {
        WeatherResult(json!({
            "name": "New York",
            "main": { "temp": 72.5, "feels_like": 75.0, "temp_min": 68.0, "temp_max": 78.0, "humidity": 65 },
            "weather": [{ "description": "clear sky", "icon": "01d" }],
            "wind": { "speed": 5.2 }
        }))
    }

    #[test]
    fn cache_key_uses_postal_code() {
        assert_eq!(cache_key(Some("10001")), "forecast_10001");
    }

    #[test]
    fn cache_key_is_degenerate_without_postal_code() {
        assert_eq!(cache_key(None), "forecast_");
    }

    #[test]
    fn geocode_result_passes_absent_values_through() {
        let place = Place {
            latitude: None,
            postal_code: None,
            ..place()
        };
        let result = GeocodeResult::from_place(place);

        assert_eq!(result.coordinates, Coordinates::new(None, Some(-74.006)));
        assert_eq!(result.postal_code, None);
    }

    #[test]
    fn cached_forecast_keeps_fields_and_flags_provenance() {
        let original = Forecast::assemble(
            "123 Main St, New York, NY",
            GeocodeResult::from_place(place()),
            weather(),
        );
        assert!(!original.from_cache);

        let restored = Forecast::from_cached(original.to_value().unwrap()).unwrap();

        assert!(restored.from_cache);
        assert_eq!(restored.address, original.address);
        assert_eq!(restored.location, original.location);
        assert_eq!(restored.coordinates, original.coordinates);
        assert_eq!(restored.postal_code, original.postal_code);
        assert_eq!(restored.weather, original.weather);
    }

    #[test]
    fn from_cached_rejects_foreign_documents() {
        assert!(Forecast::from_cached(json!({ "unexpected": true })).is_err());
    }

    #[test]
    fn weather_accessors_read_nested_fields() {
        let w = weather();

        assert_eq!(w.name(), Some("New York"));
        assert_eq!(w.temp(), Some(72.5));
        assert_eq!(w.temp_max(), Some(78.0));
        assert_eq!(w.humidity(), Some(65.0));
        assert_eq!(w.description(), Some("clear sky"));
        assert_eq!(w.icon(), Some("01d"));
        assert_eq!(w.wind_speed(), Some(5.2));
        assert_eq!(w.country(), None);
    }

    #[test]
    fn weather_accessors_tolerate_missing_fields() {
        let w = WeatherResult(json!({ "weather": [] }));

        assert_eq!(w.name(), None);
        assert_eq!(w.temp(), None);
        assert_eq!(w.description(), None);
        assert_eq!(w.wind_speed(), None);
    }
}
