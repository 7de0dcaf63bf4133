// # meteo-core
//
// Core library for cache-aside weather synchronization.
//
// ## Architecture Overview
//
// This library reconciles three data sources for a city: a geocoding lookup,
// a forecast fetch, and a local cache with a time-to-live.
// - **GeocodingClient**: Trait for free-text city search
// - **ForecastClient**: Trait for fetching a forecast by coordinates
// - **LocalStore**: Trait for the favorites table and the weather cache
// - **ConnectivityProbe**: Trait for reporting whether the network is usable
// - **WeatherSyncEngine**: Cache-aside orchestrator with request coalescing
// - **FavoritesCoordinator**: Favorites set, refresh fan-out and events
// - **GeocodingResolver**: Search text to city identities
// - **ProviderRegistry**: Plugin-based registry for backends
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from backends
// 2. **Dependency Injection**: Collaborators are passed in, no global clients
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Stale Over Nothing**: A cached snapshot is preferred over an error

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    ForecastConfig, GeocodingConfig, MeteoConfig, ProbeConfig, StoreConfig, SyncConfig,
};
pub use coordinator::{
    FavoriteEntry, FavoritesCoordinator, FavoritesEvent, RefreshReport, SubscriptionId,
};
pub use engine::{SyncEvent, WeatherSyncEngine};
pub use error::{Error, Result, SyncError, UnavailableCause};
pub use model::{
    CityIdentity, EntryState, FavoriteCity, HourlyPoint, WeatherCondition, WeatherSnapshot,
    city_id_for,
};
pub use registry::ProviderRegistry;
pub use resolver::GeocodingResolver;
pub use store::{FileStore, MemoryStore};
pub use traits::{ConnectivityProbe, ForecastClient, GeocodingClient, LocalStore};
