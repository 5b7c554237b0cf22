use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use forecast_core::{
    CacheStore, Config, ErrorReporter, FileCache, ForecastService, MemoryCache,
    Notifier, WebhookNotifier, config::DEFAULT_WEATHER_ENDPOINT,
};
use inquire::{Password, PasswordDisplayMode, Text};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Current weather for an address")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively store API keys, the weather endpoint and the error webhook.
    Configure,

    /// Show the current weather for an address.
    Show {
        /// Free-text address, e.g. "1600 Amphitheatre Pkwy, Mountain View, CA".
        address: Option<String>,

        /// Skip the on-disk cache; results are still cached for this run only.
        #[arg(long)]
        no_cache: bool,
    },

    /// Print where the configuration file lives.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { address, no_cache } => show(address.as_deref(), no_cache).await,
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
                Ok(())
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load_file()?;

    if let Some(key) = prompt_secret("Google geocoding API key:", cfg.geocoding.api_key().is_some())? {
        cfg.set_geocoding_api_key(key);
    }
    if let Some(key) = prompt_secret("OpenWeather API key:", cfg.weather.api_key().is_some())? {
        cfg.set_weather_api_key(key);
    }

    let endpoint = Text::new("Weather endpoint:")
        .with_default(cfg.weather.endpoint().unwrap_or(DEFAULT_WEATHER_ENDPOINT))
        .prompt()
        .context("Failed to read weather endpoint")?;
    cfg.set_weather_endpoint(endpoint);

    let webhook = Text::new("Error webhook URL (leave empty to disable):")
        .with_initial_value(cfg.notifications.webhook_url().unwrap_or_default())
        .prompt()
        .context("Failed to read webhook URL")?;
    cfg.set_webhook_url(Some(webhook));

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// `None` when the user keeps an already configured secret by entering nothing.
fn prompt_secret(label: &str, already_set: bool) -> anyhow::Result<Option<String>> {
    let help = if already_set {
        "Leave empty to keep the current key"
    } else {
        "Required"
    };

    let value = Password::new(label)
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message(help)
        .prompt()
        .with_context(|| format!("Failed to read {label}"))?;

    Ok(Some(value).filter(|v| !v.trim().is_empty()))
}

async fn show(address: Option<&str>, no_cache: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    for problem in config.problems() {
        tracing::warn!("{problem}");
    }

    let notifier = config
        .notifications
        .webhook_url()
        .map(|url| Arc::new(WebhookNotifier::new(url)) as Arc<dyn Notifier>);
    let reporter = ErrorReporter::new(notifier);

    let cache: Arc<dyn CacheStore> = if no_cache {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(FileCache::in_dir(&Config::cache_dir()?))
    };

    let service = ForecastService::from_config(&config, reporter, cache);
    print!("{}", resolve_and_render(&service, address).await?);
    Ok(())
}

/// Validation failures surface through `main`'s error return like any other
/// error, so the runtime and tracing subscriber shut down normally.
async fn resolve_and_render(
    service: &ForecastService,
    address: Option<&str>,
) -> anyhow::Result<String> {
    let forecast = service.resolve(address).await?;
    Ok(render::forecast(&forecast))
}
