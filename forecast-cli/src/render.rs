use std::fmt::Write;

use forecast_core::{Forecast, WeatherResult};

const LABEL_WIDTH: usize = 15;

/// Human-readable block for a forecast. Rows without a value are skipped.
pub fn forecast(forecast: &Forecast) -> String {
    let mut out = String::new();

    row(&mut out, "Address:", non_empty(&forecast.address));
    row(&mut out, "Coordinates:", coordinates(forecast));
    row(&mut out, "Zip Code:", forecast.postal_code.as_deref().and_then(non_empty));
    row(&mut out, "Full Location:", non_empty(forecast.location.full_address()));

    weather(&mut out, &forecast.weather);

    let source = if forecast.from_cache {
        "cache (refreshed at most every 30 minutes)"
    } else {
        "live lookup"
    };
    let _ = writeln!(out, "\nSource: {source}");

    out
}

fn weather(out: &mut String, weather: &WeatherResult) {
    let location = weather.name().map(|name| match weather.country() {
        Some(country) => format!("{name} ({country})"),
        None => name.to_string(),
    });

    row(out, "Location:", location);
    row(out, "Temperature:", with_unit(weather.temp(), "°F"));
    row(out, "Feels Like:", with_unit(weather.feels_like(), "°F"));
    row(out, "Temp High:", with_unit(weather.temp_max(), "°F"));
    row(out, "Temp Low:", with_unit(weather.temp_min(), "°F"));
    row(out, "Condition:", condition(weather));
    row(out, "Humidity:", with_unit(weather.humidity(), "%"));
    row(out, "Wind:", with_unit(weather.wind_speed(), "mph"));
}

fn condition(weather: &WeatherResult) -> Option<String> {
    let description = capitalize(weather.description()?);

    Some(match weather.icon() {
        Some(icon) => format!("{description} (https://openweathermap.org/img/wn/{icon}@2x.png)"),
        None => description,
    })
}

fn coordinates(forecast: &Forecast) -> Option<String> {
    let parts: Vec<String> = [forecast.coordinates.latitude, forecast.coordinates.longitude]
        .iter()
        .flatten()
        .map(f64::to_string)
        .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

fn row(out: &mut String, label: &str, value: Option<String>) {
    if let Some(value) = value {
        let _ = writeln!(out, "{label:<LABEL_WIDTH$} {value}");
    }
}

fn with_unit(value: Option<f64>, unit: &str) -> Option<String> {
    value.map(|v| format!("{v}{unit}"))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// First letter upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
