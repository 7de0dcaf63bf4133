//! Plugin-based backend registry
//!
//! The registry allows forecast clients, geocoders, connectivity probes and
//! local stores to be registered dynamically at runtime, avoiding hardcoded
//! if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meteo_core::registry::ProviderRegistry;
//! use meteo_core::config::MeteoConfig;
//!
//! let registry = ProviderRegistry::new();
//! meteo_open_meteo::register(&registry);
//! meteo_probe_tcp::register(&registry);
//!
//! let config = MeteoConfig::default();
//! let forecast = registry.create_forecast_client(&config.forecast)?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! ## Registration
//!
//! Backend crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In meteo-open-meteo
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_forecast_client("open_meteo", Box::new(OpenMeteoForecastFactory));
//!     registry.register_geocoding_client("open_meteo", Box::new(OpenMeteoGeocodingFactory));
//! }
//! ```
//!
//! The `memory` and `file` stores are built in.

use crate::config::{ForecastConfig, GeocodingConfig, ProbeConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileStoreFactory, MemoryStoreFactory};
use crate::traits::{ConnectivityProbe, ForecastClient, GeocodingClient, LocalStore};
use crate::traits::{
    ConnectivityProbeFactory, ForecastClientFactory, GeocodingClientFactory, LocalStoreFactory,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for plugin-based backend creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. A poisoned lock is recovered, since the maps
/// are only ever inserted into.
pub struct ProviderRegistry {
    forecast_clients: RwLock<HashMap<String, Box<dyn ForecastClientFactory>>>,
    geocoding_clients: RwLock<HashMap<String, Box<dyn GeocodingClientFactory>>>,
    probes: RwLock<HashMap<String, Box<dyn ConnectivityProbeFactory>>>,
    stores: RwLock<HashMap<String, Arc<dyn LocalStoreFactory>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create a registry with the built-in stores
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_store("memory", Box::new(MemoryStoreFactory));
        registry.register_store("file", Box::new(FileStoreFactory));
        registry
    }

    /// Create a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            forecast_clients: RwLock::new(HashMap::new()),
            geocoding_clients: RwLock::new(HashMap::new()),
            probes: RwLock::new(HashMap::new()),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Register a forecast client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Client type name (e.g., "open_meteo")
    /// - `factory`: Factory object for creating client instances
    pub fn register_forecast_client(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ForecastClientFactory>,
    ) {
        self.forecast_clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a geocoding client factory
    pub fn register_geocoding_client(
        &self,
        name: impl Into<String>,
        factory: Box<dyn GeocodingClientFactory>,
    ) {
        self.geocoding_clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a connectivity probe factory
    pub fn register_probe(&self, name: impl Into<String>, factory: Box<dyn ConnectivityProbeFactory>) {
        self.probes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a local store factory
    ///
    /// Registering an existing name replaces the previous factory.
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn LocalStoreFactory>) {
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a forecast client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ForecastClient>)`: Created client instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_forecast_client(&self, config: &ForecastConfig) -> Result<Box<dyn ForecastClient>> {
        let client_type = config.type_name();
        let clients = self
            .forecast_clients
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = clients.get(client_type).ok_or_else(|| {
            Error::config(format!("Unknown forecast client type: {}", client_type))
        })?;

        factory.create(config)
    }

    /// Create a geocoding client from configuration
    pub fn create_geocoding_client(
        &self,
        config: &GeocodingConfig,
    ) -> Result<Box<dyn GeocodingClient>> {
        let client_type = config.type_name();
        let clients = self
            .geocoding_clients
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = clients.get(client_type).ok_or_else(|| {
            Error::config(format!("Unknown geocoding client type: {}", client_type))
        })?;

        factory.create(config)
    }

    /// Create a connectivity probe from configuration
    pub fn create_probe(&self, config: &ProbeConfig) -> Result<Box<dyn ConnectivityProbe>> {
        let probe_type = config.type_name();
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);

        let factory = probes
            .get(probe_type)
            .ok_or_else(|| Error::config(format!("Unknown probe type: {}", probe_type)))?;

        factory.create(config)
    }

    /// Create a local store from configuration
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn LocalStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        factory.create(config).await
    }

    /// Registered forecast client types
    pub fn list_forecast_clients(&self) -> Vec<String> {
        Self::names(&self.forecast_clients)
    }

    /// Registered geocoding client types
    pub fn list_geocoding_clients(&self) -> Vec<String> {
        Self::names(&self.geocoding_clients)
    }

    /// Registered probe types
    pub fn list_probes(&self) -> Vec<String> {
        Self::names(&self.probes)
    }

    /// Registered store types
    pub fn list_stores(&self) -> Vec<String> {
        Self::names(&self.stores)
    }

    pub fn has_forecast_client(&self, name: &str) -> bool {
        self.forecast_clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn has_geocoding_client(&self, name: &str) -> bool {
        self.geocoding_clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn has_probe(&self, name: &str) -> bool {
        self.probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn has_store(&self, name: &str) -> bool {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn names<V>(map: &RwLock<HashMap<String, V>>) -> Vec<String> {
        let mut names: Vec<String> = map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
