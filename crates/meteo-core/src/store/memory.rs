// # Memory Store
//
// In-memory implementation of LocalStore.
//
// ## Purpose
//
// Fast store that doesn't persist across restarts. Useful for tests, one-off
// lookups, and deployments where a cold cache after restart is acceptable.
//
// ## Locking
//
// The favorites table and the weather cache sit behind separate locks, so a
// snapshot write never waits on a favorites scan and vice versa.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::model::{FavoriteCity, WeatherSnapshot};
use crate::traits::local_store::{LocalStore, LocalStoreFactory};

/// In-memory store implementation
///
/// # Example
///
/// ```rust,no_run
/// use meteo_core::store::MemoryStore;
/// use meteo_core::traits::LocalStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///     assert!(store.list_favorites().await?.is_empty());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    favorites: Arc<RwLock<Vec<FavoriteCity>>>,
    snapshots: Arc<RwLock<HashMap<String, WeatherSnapshot>>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached snapshots
    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Clear both tables
    pub async fn clear(&self) {
        self.favorites.write().await.clear();
        self.snapshots.write().await.clear();
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn upsert_favorite(&self, favorite: &FavoriteCity) -> Result<(), Error> {
        let mut guard = self.favorites.write().await;
        super::upsert_ordered(&mut guard, favorite);
        Ok(())
    }

    async fn get_favorite(&self, city_id: &str) -> Result<Option<FavoriteCity>, Error> {
        let guard = self.favorites.read().await;
        Ok(guard.iter().find(|f| f.city_id == city_id).cloned())
    }

    async fn delete_favorite(&self, city_id: &str) -> Result<bool, Error> {
        let mut guard = self.favorites.write().await;
        Ok(super::remove_ordered(&mut guard, city_id))
    }

    async fn list_favorites(&self) -> Result<Vec<FavoriteCity>, Error> {
        Ok(self.favorites.read().await.clone())
    }

    async fn upsert_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<(), Error> {
        let mut guard = self.snapshots.write().await;
        guard.insert(snapshot.city_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, city_id: &str) -> Result<Option<WeatherSnapshot>, Error> {
        Ok(self.snapshots.read().await.get(city_id).cloned())
    }

    async fn delete_snapshot(&self, city_id: &str) -> Result<(), Error> {
        self.snapshots.write().await.remove(city_id);
        Ok(())
    }

    async fn list_snapshots(&self) -> Result<Vec<WeatherSnapshot>, Error> {
        Ok(self.snapshots.read().await.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for `memory` stores
pub struct MemoryStoreFactory;

#[async_trait]
impl LocalStoreFactory for MemoryStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn LocalStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryStore::new())),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherCondition;

    fn favorite(id: &str, name: &str) -> FavoriteCity {
        FavoriteCity {
            city_id: id.to_string(),
            display_name: name.to_string(),
            latitude: 1.0,
            longitude: 2.0,
        }
    }

    fn snapshot(id: &str, temperature: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            city_id: id.to_string(),
            city_name: id.to_string(),
            temperature,
            wind_speed: 3.0,
            condition_code: 0,
            condition: WeatherCondition::Clear,
            min_temp: temperature,
            max_temp: temperature,
            hourly: Vec::new(),
            fetched_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_favorites_keep_insertion_order() {
        let store = MemoryStore::new();

        store.upsert_favorite(&favorite("b", "B")).await.unwrap();
        store.upsert_favorite(&favorite("a", "A")).await.unwrap();
        store.upsert_favorite(&favorite("c", "C")).await.unwrap();

        // Upsert of an existing entry keeps its slot
        store.upsert_favorite(&favorite("b", "B renamed")).await.unwrap();

        let ids: Vec<_> = store
            .list_favorites()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.city_id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(
            store.get_favorite("b").await.unwrap().unwrap().display_name,
            "B renamed"
        );
    }

    #[tokio::test]
    async fn test_delete_favorite_reports_presence() {
        let store = MemoryStore::new();
        store.upsert_favorite(&favorite("a", "A")).await.unwrap();

        assert!(store.delete_favorite("a").await.unwrap());
        assert!(!store.delete_favorite("a").await.unwrap());
        assert!(store.get_favorite("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_last_write_wins() {
        let store = MemoryStore::new();

        store.upsert_snapshot(&snapshot("a", 1.0)).await.unwrap();
        store.upsert_snapshot(&snapshot("a", 2.0)).await.unwrap();
        store.upsert_snapshot(&snapshot("b", 5.0)).await.unwrap();

        assert_eq!(store.snapshot_count().await, 2);
        let a = store.get_snapshot("a").await.unwrap().unwrap();
        assert_eq!(a.temperature, 2.0);

        store.delete_snapshot("a").await.unwrap();
        let remaining = store.list_snapshots().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].city_id, "b");
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let store = MemoryStore::new();
        store.upsert_snapshot(&snapshot("a", 1.0)).await.unwrap();

        assert!(store.list_favorites().await.unwrap().is_empty());
        assert!(!store.delete_favorite("a").await.unwrap());
        assert!(store.get_snapshot("a").await.unwrap().is_some());
    }
}
