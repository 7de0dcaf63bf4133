// # Geocoding Client Trait
//
// Defines the boundary to the free-text city search service.
//
// ## Implementations
//
// - Open-Meteo geocoding API: `meteo-open-meteo` crate
//
// Candidates may lack a provider id. Callers derive the stable city id from
// coordinates (see `CityIdentity`), never from `GeocodingCandidate::id`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search candidate as returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingCandidate {
    /// Provider-assigned id (informational only)
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: String,
    /// First-level administrative region
    #[serde(default)]
    pub admin1: Option<String>,
}

/// Trait for geocoding clients
///
/// Results must be returned in provider order (assumed relevance-ranked).
/// An empty list is a valid response; deciding whether that is an error is
/// left to `GeocodingResolver`.
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    /// Search cities by free text
    ///
    /// # Parameters
    ///
    /// - `query`: trimmed, non-empty search text
    /// - `count`: maximum number of candidates
    /// - `language`: result language (e.g. "en", "fr")
    async fn search(
        &self,
        query: &str,
        count: usize,
        language: &str,
    ) -> Result<Vec<GeocodingCandidate>, crate::Error>;

    /// Client name (for logging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing geocoding clients from configuration
pub trait GeocodingClientFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::GeocodingConfig,
    ) -> Result<Box<dyn GeocodingClient>, crate::Error>;
}
