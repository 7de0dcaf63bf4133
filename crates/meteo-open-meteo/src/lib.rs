// # Open-Meteo Clients
//
// This crate provides the forecast and geocoding clients for the Open-Meteo
// public APIs. No API key is needed.
//
// - `OpenMeteoForecast`: GET `/v1/forecast` on `api.open-meteo.com`
// - `OpenMeteoGeocoding`: GET `/v1/search` on `geocoding-api.open-meteo.com`
//
// ## Boundaries
//
// Each call makes exactly one HTTP request with a 10 second timeout. The
// clients do not retry, cache or look at connectivity; fallback to cached
// data is decided by `WeatherSyncEngine`.
//
// ## Error Mapping
//
// - 404 → `Error::NotFound`
// - 429 → `Error::RateLimited`
// - 5xx → `Error::Provider` (transient)
// - other non-success → `Error::Provider` with the response body
// - transport failure → `Error::Http`
// - malformed payload → `Error::Provider`
//
// ## API Reference
//
// - Forecast: https://open-meteo.com/en/docs
// - Geocoding: https://open-meteo.com/en/docs/geocoding-api

mod forecast;
mod geocoding;

pub use forecast::{OpenMeteoForecast, OpenMeteoForecastFactory};
pub use geocoding::{OpenMeteoGeocoding, OpenMeteoGeocodingFactory};

use meteo_core::registry::ProviderRegistry;
use meteo_core::{Error, Result};
use std::time::Duration;

/// Registry name for both clients
pub const PROVIDER_NAME: &str = "open_meteo";

/// HTTP timeout for every request
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("meteo-sync/", env!("CARGO_PKG_VERSION"));

/// Register the Open-Meteo forecast and geocoding clients
pub fn register(registry: &ProviderRegistry) {
    registry.register_forecast_client(PROVIDER_NAME, Box::new(OpenMeteoForecastFactory));
    registry.register_geocoding_client(PROVIDER_NAME, Box::new(OpenMeteoGeocodingFactory));
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success response to an error
async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        404 => Err(Error::not_found(format!("{} endpoint not found", what))),
        429 => Err(Error::rate_limited(format!(
            "{} rate limit exceeded. Status: {}",
            what, status
        ))),
        500..=599 => Err(Error::provider(
            PROVIDER_NAME,
            format!("{} server error (transient): {} - {}", what, status, error_text),
        )),
        _ => Err(Error::provider(
            PROVIDER_NAME,
            format!("{} request failed: {} - {}", what, status, error_text),
        )),
    }
}
