use async_trait::async_trait;
use meteo_core::config::GeocodingConfig;
use meteo_core::traits::{GeocodingCandidate, GeocodingClient, GeocodingClientFactory};
use meteo_core::{Error, Result};
use serde::Deserialize;

use crate::{PROVIDER_NAME, build_client, check_status};

/// Open-Meteo geocoding client
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoding {
    base_url: String,
    client: reqwest::Client,
}

/// `results` is omitted entirely when nothing matches
#[derive(Debug, Deserialize)]
struct RawSearch {
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    #[serde(default)]
    id: Option<i64>,
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
}

impl From<RawPlace> for GeocodingCandidate {
    fn from(place: RawPlace) -> Self {
        Self {
            id: place.id.map(|id| id.to_string()),
            name: place.name,
            latitude: place.latitude,
            longitude: place.longitude,
            country: place.country.unwrap_or_default(),
            admin1: place.admin1,
        }
    }
}

impl OpenMeteoGeocoding {
    /// Create a client for a geocoding endpoint
    ///
    /// `base_url` is the full endpoint, e.g.
    /// `https://geocoding-api.open-meteo.com/v1/search`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(Error::config("Geocoding URL cannot be empty"));
        }

        Ok(Self {
            base_url,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl GeocodingClient for OpenMeteoGeocoding {
    async fn search(
        &self,
        query: &str,
        count: usize,
        language: &str,
    ) -> Result<Vec<GeocodingCandidate>> {
        tracing::debug!("Searching cities for {:?} (count {}, {})", query, count, language);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("name", query.to_string()),
                ("count", count.to_string()),
                ("language", language.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::http(format!("Geocoding request failed: {}", e)))?;

        let response = check_status(response, "Geocoding").await?;

        let raw: RawSearch = response.json().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse search results: {}", e))
        })?;

        Ok(raw.results.into_iter().map(GeocodingCandidate::from).collect())
    }

    fn client_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for `open_meteo` geocoding clients
pub struct OpenMeteoGeocodingFactory;

impl GeocodingClientFactory for OpenMeteoGeocodingFactory {
    fn create(&self, config: &GeocodingConfig) -> Result<Box<dyn GeocodingClient>> {
        match config {
            GeocodingConfig::OpenMeteo { base_url } => {
                Ok(Box::new(OpenMeteoGeocoding::new(base_url.clone())?))
            }
            _ => Err(Error::config("Invalid config for Open-Meteo geocoding client")),
        }
    }
}
