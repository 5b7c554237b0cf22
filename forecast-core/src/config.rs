use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

pub const GEOCODER_API_KEY_ENV: &str = "GOOGLE_GEOCODER_API_KEY";
pub const WEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const WEATHER_ENDPOINT_ENV: &str = "OPENWEATHER_ENDPOINT";
pub const WEBHOOK_URL_ENV: &str = "ERROR_WEBHOOK_URL";

/// Default OpenWeather current-conditions endpoint offered by `forecast configure`.
pub const DEFAULT_WEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Credentials for the geocoding provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GeocodingConfig {
    pub api_key: Option<String>,

    /// Overrides the provider's default lookup URL.
    pub endpoint: Option<String>,
}

impl GeocodingConfig {
    pub fn api_key(&self) -> Option<&str> {
        present(&self.api_key)
    }

    pub fn endpoint(&self) -> Option<&str> {
        present(&self.endpoint)
    }
}

/// Credentials and endpoint for the weather provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl WeatherConfig {
    pub fn api_key(&self) -> Option<&str> {
        present(&self.api_key)
    }

    pub fn endpoint(&self) -> Option<&str> {
        present(&self.endpoint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NotificationConfig {
    /// Where reported errors are POSTed as JSON. Absent means notifications are off.
    pub webhook_url: Option<String>,
}

impl NotificationConfig {
    pub fn webhook_url(&self) -> Option<&str> {
        present(&self.webhook_url)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [geocoding]
/// api_key = "..."
///
/// [weather]
/// api_key = "..."
/// endpoint = "https://api.openweathermap.org/data/2.5/weather"
///
/// [notifications]
/// webhook_url = "https://hooks.example.com/errors"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load config from disk (or an empty default on first run), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|name| env::var(name).ok());
        Ok(cfg)
    }

    /// Load config from disk only, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the forecast cache file.
    pub fn cache_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.cache_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "forecast", "forecast-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Overlay non-blank environment values on top of what was read from disk.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var(GEOCODER_API_KEY_ENV) {
            self.geocoding.api_key = Some(v);
        }
        if let Some(v) = var(WEATHER_API_KEY_ENV) {
            self.weather.api_key = Some(v);
        }
        if let Some(v) = var(WEATHER_ENDPOINT_ENV) {
            self.weather.endpoint = Some(v);
        }
        if let Some(v) = var(WEBHOOK_URL_ENV) {
            self.notifications.webhook_url = Some(v);
        }
    }

    /// Startup validation pass. Resolvers still check their own values on
    /// every call; this only lets the caller warn early.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.geocoding.api_key().is_none() {
            problems.push(format!(
                "No geocoding API key configured (set {GEOCODER_API_KEY_ENV} or run `forecast configure`)."
            ));
        }
        if self.weather.api_key().is_none() {
            problems.push(format!(
                "No weather API key configured (set {WEATHER_API_KEY_ENV} or run `forecast configure`)."
            ));
        }
        if self.weather.endpoint().is_none() {
            problems.push(format!(
                "No weather endpoint configured (set {WEATHER_ENDPOINT_ENV} or run `forecast configure`)."
            ));
        }

        problems
    }

    pub fn set_geocoding_api_key(&mut self, api_key: String) {
        self.geocoding.api_key = Some(api_key);
    }

    pub fn set_weather_api_key(&mut self, api_key: String) {
        self.weather.api_key = Some(api_key);
    }

    pub fn set_weather_endpoint(&mut self, endpoint: String) {
        self.weather.endpoint = Some(endpoint);
    }

    /// Empty or whitespace-only URLs switch notifications off.
    pub fn set_webhook_url(&mut self, url: Option<String>) {
        self.notifications.webhook_url = url.filter(|u| !u.trim().is_empty());
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
