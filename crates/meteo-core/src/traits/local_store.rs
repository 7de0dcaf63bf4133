// # Local Store Trait
//
// Durable key-value persistence for two independent tables:
//
// - `favorites(city_id PK)`: saved cities, in insertion order
// - `weather_cache(city_id PK)`: the latest snapshot per city
//
// Both tables support upsert, point lookup, point delete and full scan. The
// tables have independent lifecycles: deleting a favorite does not touch the
// cache here (the cascade is driven by `FavoritesCoordinator`).
//
// ## Implementations
//
// - In-memory: `MemoryStore`
// - JSON file with crash recovery: `FileStore`
//
// ## Usage
//
// ```rust,ignore
// use meteo_core::LocalStore;
//
// store.upsert_snapshot(&snapshot).await?;
// let cached = store.get_snapshot("48.856600_2.352200").await?;
// ```

use async_trait::async_trait;

use crate::model::{FavoriteCity, WeatherSnapshot};

/// Trait for local store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. The two tables are locked
/// independently; a write to one never waits on the other.
///
/// # Responsibilities
///
/// - Persist and return exactly what was written (last write wins per key)
/// - Keep favorites in insertion order; an upsert of an existing favorite
///   keeps its position
///
/// The store never decides freshness or fetches anything; that is owned by
/// `WeatherSyncEngine`.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert or replace a favorite
    async fn upsert_favorite(&self, favorite: &FavoriteCity) -> Result<(), crate::Error>;

    /// Point lookup in the favorites table
    async fn get_favorite(&self, city_id: &str) -> Result<Option<FavoriteCity>, crate::Error>;

    /// Delete a favorite
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: the favorite existed and was removed
    /// - `Ok(false)`: nothing to remove
    async fn delete_favorite(&self, city_id: &str) -> Result<bool, crate::Error>;

    /// Full scan of favorites in insertion order
    async fn list_favorites(&self) -> Result<Vec<FavoriteCity>, crate::Error>;

    /// Insert or replace the snapshot for `snapshot.city_id`
    async fn upsert_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<(), crate::Error>;

    /// Point lookup in the weather cache
    async fn get_snapshot(&self, city_id: &str) -> Result<Option<WeatherSnapshot>, crate::Error>;

    /// Delete a cached snapshot (Ok if absent)
    async fn delete_snapshot(&self, city_id: &str) -> Result<(), crate::Error>;

    /// Full scan of the weather cache
    async fn list_snapshots(&self) -> Result<Vec<WeatherSnapshot>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing stores from configuration
#[async_trait]
pub trait LocalStoreFactory: Send + Sync {
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn LocalStore>, crate::Error>;
}
