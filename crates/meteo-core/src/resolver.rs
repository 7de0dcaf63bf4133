//! Free-text city search
//!
//! Thin layer over a [`GeocodingClient`] that turns provider candidates into
//! [`CityIdentity`] values with coordinate-derived ids. Provider order is
//! kept as-is; there is no local re-ranking.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::model::CityIdentity;
use crate::traits::{ConnectivityProbe, GeocodingClient};

/// Resolves search text and coordinates to city identities
pub struct GeocodingResolver {
    client: Arc<dyn GeocodingClient>,
    probe: Arc<dyn ConnectivityProbe>,
    language: String,
    default_limit: usize,
}

impl GeocodingResolver {
    pub fn new(
        client: Arc<dyn GeocodingClient>,
        probe: Arc<dyn ConnectivityProbe>,
        language: impl Into<String>,
        default_limit: usize,
    ) -> Self {
        Self {
            client,
            probe,
            language: language.into(),
            default_limit,
        }
    }

    /// Search with the configured default limit
    pub async fn search_default(&self, query: &str) -> Result<Vec<CityIdentity>, SyncError> {
        self.search(query, self.default_limit).await
    }

    /// Search cities by free text
    ///
    /// An empty or whitespace-only query returns no candidates without a
    /// remote call.
    ///
    /// # Errors
    ///
    /// - `SyncError::NoNetwork`: the probe reports offline
    /// - `SyncError::RemoteFailure`: the geocoding call failed
    /// - `SyncError::NotFound`: the provider returned no usable candidate
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<CityIdentity>, SyncError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        if !self.probe.is_online().await {
            debug!("Offline, not searching for {:?}", query);
            return Err(SyncError::NoNetwork);
        }

        let candidates = self
            .client
            .search(query, limit, &self.language)
            .await
            .map_err(|e| {
                warn!(
                    "Geocoding via {} failed for {:?}: {}",
                    self.client.client_name(),
                    query,
                    e
                );
                SyncError::RemoteFailure(e.to_string())
            })?;

        let cities: Vec<CityIdentity> = candidates
            .into_iter()
            .take(limit)
            .filter_map(|candidate| {
                match CityIdentity::new(
                    candidate.name,
                    candidate.latitude,
                    candidate.longitude,
                    candidate.country,
                    candidate.admin1,
                ) {
                    Ok(city) => Some(city),
                    Err(e) => {
                        warn!("Skipping geocoding candidate: {}", e);
                        None
                    }
                }
            })
            .collect();

        if cities.is_empty() {
            return Err(SyncError::NotFound(query.to_string()));
        }

        debug!("Search {:?} returned {} cities", query, cities.len());
        Ok(cities)
    }

    /// Identity for a geolocation fix
    ///
    /// No reverse geocoding is done; the id follows the coordinate scheme so
    /// it shares cache entries with a searched city at the same point.
    pub fn current_location(&self, latitude: f64, longitude: f64) -> crate::Result<CityIdentity> {
        CityIdentity::current_location(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::GeocodingCandidate;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        results: Vec<GeocodingCandidate>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodingClient for Scripted {
        async fn search(
            &self,
            _query: &str,
            _count: usize,
            _language: &str,
        ) -> crate::Result<Vec<GeocodingCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }

        fn client_name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Fixed(bool);

    #[async_trait]
    impl ConnectivityProbe for Fixed {
        async fn is_online(&self) -> bool {
            self.0
        }

        fn probe_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn candidate(name: &str, latitude: f64) -> GeocodingCandidate {
        GeocodingCandidate {
            id: None,
            name: name.to_string(),
            latitude,
            longitude: 2.0,
            country: "France".to_string(),
            admin1: None,
        }
    }

    fn resolver(results: Vec<GeocodingCandidate>, online: bool) -> (GeocodingResolver, Arc<Scripted>) {
        let client = Arc::new(Scripted {
            results,
            calls: AtomicUsize::new(0),
        });
        let resolver = GeocodingResolver::new(client.clone(), Arc::new(Fixed(online)), "en", 10);
        (resolver, client)
    }

    #[tokio::test]
    async fn blank_query_skips_remote_call() {
        let (resolver, client) = resolver(vec![candidate("Paris", 48.0)], true);

        assert!(resolver.search("   ", 5).await.unwrap().is_empty());
        assert!(resolver.search("", 5).await.unwrap().is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keeps_provider_order_and_skips_invalid() {
        let (resolver, _client) = resolver(
            vec![
                candidate("Paris", 48.0),
                candidate("Broken", 123.0),
                candidate("Paris, TX", 33.0),
            ],
            true,
        );

        let names: Vec<_> = resolver
            .search_default("paris")
            .await
            .unwrap()
            .iter()
            .map(|c| c.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["Paris", "Paris, TX"]);
    }

    #[tokio::test]
    async fn empty_results_are_not_found() {
        let (resolver, _client) = resolver(vec![], true);
        assert_eq!(
            resolver.search("atlantis", 5).await.unwrap_err(),
            SyncError::NotFound("atlantis".to_string())
        );
    }

    #[tokio::test]
    async fn offline_search_fails_fast() {
        let (resolver, client) = resolver(vec![candidate("Paris", 48.0)], false);
        assert_eq!(
            resolver.search("paris", 5).await.unwrap_err(),
            SyncError::NoNetwork
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
