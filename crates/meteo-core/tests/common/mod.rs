//! Test doubles and common utilities for contract tests
//!
//! These doubles count calls and can be switched between behaviors at
//! runtime, so tests can assert how many remote calls the engine made.

#![allow(dead_code)]

use async_trait::async_trait;
use meteo_core::error::{Error, Result};
use meteo_core::traits::{
    ConnectivityProbe, CurrentConditions, DailySeries, ForecastClient, ForecastResponse,
    GeocodingCandidate, GeocodingClient, HourlySeries, LocalStore,
};
use meteo_core::{
    CityIdentity, FavoriteCity, MemoryStore, WeatherSnapshot, WeatherSyncEngine, city_id_for,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// A forecast client that counts calls
///
/// Each successful call returns a temperature equal to the call number, so
/// tests can tell which fetch produced a snapshot.
#[derive(Default)]
pub struct CountingForecast {
    calls: AtomicUsize,
    delay_ms: AtomicUsize,
    fail_all: AtomicBool,
    failing_cities: std::sync::Mutex<HashSet<String>>,
}

impl CountingForecast {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of times forecast() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Delay every response
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Make every call fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Make calls for one city fail
    pub fn fail_city(&self, city: &CityIdentity) {
        self.failing_cities
            .lock()
            .unwrap()
            .insert(city.id().to_string());
    }
}

#[async_trait]
impl ForecastClient for CountingForecast {
    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<ForecastResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
        }

        let city_failing = self
            .failing_cities
            .lock()
            .unwrap()
            .contains(&city_id_for(latitude, longitude));
        if self.fail_all.load(Ordering::SeqCst) || city_failing {
            return Err(Error::provider("counting", "HTTP 503"));
        }

        Ok(ForecastResponse {
            current: CurrentConditions {
                temperature: call as f64,
                wind_speed: 10.0,
                condition_code: 2,
            },
            daily: DailySeries {
                min_temp: vec![Some(-1.0), Some(-2.0)],
                max_temp: vec![Some(9.0), Some(8.0)],
            },
            hourly: HourlySeries {
                time: (0..30)
                    .map(|h| format!("2025-01-{:02}T{:02}:00", 10 + h / 24, h % 24))
                    .collect(),
                temperature: (0..30).map(|h| h as f64 / 2.0).collect(),
            },
        })
    }

    fn client_name(&self) -> &'static str {
        "counting"
    }
}

/// A geocoder with canned results per query
#[derive(Default)]
pub struct ScriptedGeocoder {
    results: HashMap<String, Vec<GeocodingCandidate>>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, results: Vec<GeocodingCandidate>) -> Self {
        self.results.insert(query.to_lowercase(), results);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodingClient for ScriptedGeocoder {
    async fn search(
        &self,
        query: &str,
        count: usize,
        _language: &str,
    ) -> Result<Vec<GeocodingCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .results
            .get(&query.to_lowercase())
            .map(|r| r.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// A probe whose answer can be flipped by the test
pub struct SwitchableProbe {
    online: AtomicBool,
}

impl SwitchableProbe {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(online),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for SwitchableProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn probe_name(&self) -> &'static str {
        "switchable"
    }
}

/// A memory store whose snapshot writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_snapshot_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing_writes(&self, failing: bool) {
        self.fail_snapshot_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalStore for FlakyStore {
    async fn upsert_favorite(&self, favorite: &FavoriteCity) -> Result<()> {
        self.inner.upsert_favorite(favorite).await
    }

    async fn get_favorite(&self, city_id: &str) -> Result<Option<FavoriteCity>> {
        self.inner.get_favorite(city_id).await
    }

    async fn delete_favorite(&self, city_id: &str) -> Result<bool> {
        self.inner.delete_favorite(city_id).await
    }

    async fn list_favorites(&self) -> Result<Vec<FavoriteCity>> {
        self.inner.list_favorites().await
    }

    async fn upsert_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<()> {
        if self.fail_snapshot_writes.load(Ordering::SeqCst) {
            return Err(Error::store("disk full"));
        }
        self.inner.upsert_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, city_id: &str) -> Result<Option<WeatherSnapshot>> {
        self.inner.get_snapshot(city_id).await
    }

    async fn delete_snapshot(&self, city_id: &str) -> Result<()> {
        self.inner.delete_snapshot(city_id).await
    }

    async fn list_snapshots(&self) -> Result<Vec<WeatherSnapshot>> {
        self.inner.list_snapshots().await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Engine wired to test doubles
pub struct Harness {
    pub forecast: Arc<CountingForecast>,
    pub probe: Arc<SwitchableProbe>,
    pub store: Arc<MemoryStore>,
    pub engine: Arc<WeatherSyncEngine>,
}

impl Harness {
    pub fn new(online: bool) -> Self {
        let forecast = CountingForecast::new();
        let probe = SwitchableProbe::new(online);
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(WeatherSyncEngine::new(
            forecast.clone(),
            probe.clone(),
            store.clone(),
        ));

        Self {
            forecast,
            probe,
            store,
            engine,
        }
    }
}

pub fn paris() -> CityIdentity {
    CityIdentity::new("Paris", 48.8566, 2.3522, "France", Some("Île-de-France".to_string()))
        .unwrap()
}

pub fn london() -> CityIdentity {
    CityIdentity::new("London", 51.5074, -0.1278, "United Kingdom", Some("England".to_string()))
        .unwrap()
}

pub fn tokyo() -> CityIdentity {
    CityIdentity::new("Tokyo", 35.6762, 139.6503, "Japan", None).unwrap()
}

pub fn candidate(city: &CityIdentity) -> GeocodingCandidate {
    GeocodingCandidate {
        id: Some(format!("geo-{}", city.display_name().to_lowercase())),
        name: city.display_name().to_string(),
        latitude: city.latitude(),
        longitude: city.longitude(),
        country: city.country().to_string(),
        admin1: city.admin_region().map(str::to_string),
    }
}

/// Write a snapshot that is `age` old
pub async fn seed_snapshot(
    store: &dyn LocalStore,
    city: &CityIdentity,
    temperature: f64,
    age: chrono::Duration,
) -> WeatherSnapshot {
    let response = ForecastResponse {
        current: CurrentConditions {
            temperature,
            wind_speed: 1.0,
            condition_code: 0,
        },
        daily: DailySeries::default(),
        hourly: HourlySeries::default(),
    };
    let snapshot = WeatherSnapshot::from_forecast(city, &response, chrono::Utc::now() - age);
    store.upsert_snapshot(&snapshot).await.unwrap();
    snapshot
}

/// Poll until `check` is true or a second has passed
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
