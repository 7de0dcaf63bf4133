use async_trait::async_trait;
use meteo_core::config::ForecastConfig;
use meteo_core::traits::{
    CurrentConditions, DailySeries, ForecastClient, ForecastClientFactory, ForecastResponse,
    HourlySeries,
};
use meteo_core::{Error, Result};
use serde::Deserialize;

use crate::{PROVIDER_NAME, build_client, check_status};

/// Open-Meteo forecast client
#[derive(Debug, Clone)]
pub struct OpenMeteoForecast {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    current_weather: Option<RawCurrent>,
    #[serde(default)]
    daily: Option<RawDaily>,
    #[serde(default)]
    hourly: Option<RawHourly>,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    temperature: f64,
    windspeed: f64,
    weathercode: i32,
}

#[derive(Debug, Default, Deserialize)]
struct RawDaily {
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
}

impl OpenMeteoForecast {
    /// Create a client for a forecast endpoint
    ///
    /// `base_url` is the full endpoint, e.g.
    /// `https://api.open-meteo.com/v1/forecast`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(Error::config("Forecast URL cannot be empty"));
        }

        Ok(Self {
            base_url,
            client: build_client()?,
        })
    }

    fn decode(raw: RawForecast) -> Result<ForecastResponse> {
        let current = raw.current_weather.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, "Invalid response format: missing current_weather")
        })?;

        let daily = raw.daily.unwrap_or_default();
        let hourly = raw.hourly.unwrap_or_default();

        // Null hourly samples are dropped together with their timestamp
        let (time, temperature): (Vec<String>, Vec<f64>) = hourly
            .time
            .into_iter()
            .zip(hourly.temperature_2m)
            .filter_map(|(time, temperature)| temperature.map(|t| (time, t)))
            .unzip();

        Ok(ForecastResponse {
            current: CurrentConditions {
                temperature: current.temperature,
                wind_speed: current.windspeed,
                condition_code: current.weathercode,
            },
            daily: DailySeries {
                min_temp: daily.temperature_2m_min,
                max_temp: daily.temperature_2m_max,
            },
            hourly: HourlySeries { time, temperature },
        })
    }
}

#[async_trait]
impl ForecastClient for OpenMeteoForecast {
    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<ForecastResponse> {
        tracing::debug!("Fetching forecast for {}, {}", latitude, longitude);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("hourly", "temperature_2m".to_string()),
                ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::http(format!("Forecast request failed: {}", e)))?;

        let response = check_status(response, "Forecast").await?;

        let raw: RawForecast = response.json().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse forecast: {}", e))
        })?;

        Self::decode(raw)
    }

    fn client_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for `open_meteo` forecast clients
pub struct OpenMeteoForecastFactory;

impl ForecastClientFactory for OpenMeteoForecastFactory {
    fn create(&self, config: &ForecastConfig) -> Result<Box<dyn ForecastClient>> {
        match config {
            ForecastConfig::OpenMeteo { base_url } => {
                Ok(Box::new(OpenMeteoForecast::new(base_url.clone())?))
            }
            _ => Err(Error::config("Invalid config for Open-Meteo forecast client")),
        }
    }
}
