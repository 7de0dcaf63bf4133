// # Forecast Client Trait
//
// Defines the boundary to the weather-forecast service.
//
// ## Implementations
//
// - Open-Meteo: `meteo-open-meteo` crate
//
// ## Usage
//
// ```rust,ignore
// use meteo_core::ForecastClient;
//
// let response = client.forecast(48.8566, 2.3522).await?;
// println!("now: {}°", response.current.temperature);
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// "current" block of a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub wind_speed: f64,
    /// WMO weather code
    pub condition_code: i32,
}

/// Daily min/max series, index 0 = today
///
/// Missing values stay in place as `None` so that positions keep their day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub min_temp: Vec<Option<f64>>,
    pub max_temp: Vec<Option<f64>>,
}

/// Hourly series; `time[i]` pairs with `temperature[i]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature: Vec<f64>,
}

/// Decoded forecast, provider-neutral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub current: CurrentConditions,
    #[serde(default)]
    pub daily: DailySeries,
    #[serde(default)]
    pub hourly: HourlySeries,
}

/// Trait for forecast service clients
///
/// # Responsibilities
///
/// - One remote call per invocation
/// - Own the request timeout
/// - Decode the payload; a malformed payload is an error
///
/// Caching, fallback and request coalescing belong to `WeatherSyncEngine`.
/// Clients must not retry or cache.
#[async_trait]
pub trait ForecastClient: Send + Sync {
    /// Fetch current conditions, hourly and daily series for a coordinate
    async fn forecast(&self, latitude: f64, longitude: f64)
    -> Result<ForecastResponse, crate::Error>;

    /// Client name (for logging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing forecast clients from configuration
pub trait ForecastClientFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::ForecastConfig,
    ) -> Result<Box<dyn ForecastClient>, crate::Error>;
}
