//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Geocoding and weather lookups, each returning validation failures as values
//! - The cache-backed forecast orchestrator
//! - Best-effort error reporting
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod geocode;
pub mod model;
pub mod reporter;
pub mod service;
pub mod weather;

pub use cache::{CacheStore, FileCache, MemoryCache};
pub use config::Config;
pub use error::{ForecastError, ServiceError, ValidationFailure};
pub use geocode::{Geocoder, GeocodingService, GoogleGeocoder};
pub use model::{Coordinates, Forecast, GeocodeResult, Place, WeatherResult};
pub use reporter::{ErrorReporter, Notifier, WebhookNotifier};
pub use service::{FORECAST_TTL, ForecastService};
pub use weather::WeatherService;
