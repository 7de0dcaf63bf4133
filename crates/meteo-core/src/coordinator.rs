//! Favorite cities and their background refresh
//!
//! The FavoritesCoordinator owns the favorites set and fans
//! [`WeatherSyncEngine::get_snapshot`] calls out over it. Per-entry state
//! ([`EntryState`]) is never persisted; it is recomputed from the cached
//! snapshot and the TTL on every read.
//!
//! ## Publish/Subscribe
//!
//! Listeners registered with [`FavoritesCoordinator::subscribe`] receive every
//! [`FavoritesEvent`] synchronously, on the task that produced it. Listeners
//! must return quickly and must not call back into `subscribe`/`unsubscribe`.
//!
//! ```rust,ignore
//! let id = coordinator.subscribe(|event| match event {
//!     FavoritesEvent::ListChanged(list) => println!("{} favorites", list.len()),
//!     FavoritesEvent::SnapshotUpdated { city_id, .. } => println!("{} updated", city_id),
//!     FavoritesEvent::RefreshFailed { city_id, error } => println!("{}: {}", city_id, error),
//! });
//! // ...
//! coordinator.unsubscribe(id);
//! ```

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::WeatherSyncEngine;
use crate::error::SyncError;
use crate::model::{CityIdentity, EntryState, FavoriteCity, WeatherSnapshot};
use crate::traits::LocalStore;

/// Handle returned by [`FavoritesCoordinator::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Events published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum FavoritesEvent {
    /// Favorites set changed; carries the full list in order
    ListChanged(Vec<FavoriteCity>),

    /// A favorite's snapshot was loaded or refreshed
    SnapshotUpdated {
        city_id: String,
        snapshot: WeatherSnapshot,
    },

    /// A favorite could not be loaded and nothing is cached
    RefreshFailed { city_id: String, error: SyncError },
}

/// A favorite with its cached weather and derived state
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteEntry {
    pub favorite: FavoriteCity,
    pub snapshot: Option<WeatherSnapshot>,
    pub state: EntryState,
}

/// Outcome of [`FavoritesCoordinator::refresh_all`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    /// Cities that produced a snapshot, in favorites order
    pub refreshed: Vec<String>,
    /// Cities that failed, in favorites order
    pub failed: Vec<(String, SyncError)>,
}

impl RefreshReport {
    /// True when every favorite produced a snapshot
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

type Listener = Arc<dyn Fn(&FavoritesEvent) + Send + Sync>;

struct Inner {
    engine: Arc<WeatherSyncEngine>,
    store: Arc<dyn LocalStore>,
    ttl_secs: u64,
    /// Cities whose last refresh in this process failed
    failures: Mutex<HashSet<String>>,
    listeners: RwLock<HashMap<SubscriptionId, Listener>>,
    next_subscription: AtomicU64,
}

/// Favorites state container
///
/// Cheap to clone; clones share the same state and subscribers.
#[derive(Clone)]
pub struct FavoritesCoordinator {
    inner: Arc<Inner>,
}

impl FavoritesCoordinator {
    /// Create a coordinator on top of an engine
    ///
    /// `ttl_secs` is used for the eager fetch after [`add`](Self::add).
    pub fn new(engine: Arc<WeatherSyncEngine>, ttl_secs: u64) -> Self {
        let store = engine.store();
        Self {
            inner: Arc::new(Inner {
                engine,
                store,
                ttl_secs,
                failures: Mutex::new(HashSet::new()),
                listeners: RwLock::new(HashMap::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Engine used for snapshot reads
    pub fn engine(&self) -> &Arc<WeatherSyncEngine> {
        &self.inner.engine
    }

    /// Default TTL used by `add`
    pub fn ttl_secs(&self) -> u64 {
        self.inner.ttl_secs
    }

    /// Favorites in insertion order
    pub async fn list(&self) -> crate::Result<Vec<FavoriteCity>> {
        self.inner.store.list_favorites().await
    }

    /// Save a city as favorite
    ///
    /// Idempotent. The snapshot is then fetched on a background task; its
    /// outcome is only visible through events and [`entries`](Self::entries).
    pub async fn add(&self, identity: &CityIdentity) -> crate::Result<()> {
        let favorite = FavoriteCity::from(identity);
        self.inner.store.upsert_favorite(&favorite).await?;
        info!("Added favorite {} ({})", favorite.display_name, favorite.city_id);

        self.publish_list().await;

        let this = self.clone();
        let identity = identity.clone();
        let ttl_secs = self.inner.ttl_secs;
        tokio::spawn(async move {
            let _ = this.refresh_one(&identity, ttl_secs).await;
        });

        Ok(())
    }

    /// Remove a favorite and its cached snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: the city was a favorite
    /// - `Ok(false)`: nothing to remove (the snapshot is still evicted)
    pub async fn remove(&self, city_id: &str) -> crate::Result<bool> {
        let removed = self.inner.store.delete_favorite(city_id).await?;
        self.inner.engine.evict(city_id).await?;
        self.failures().remove(city_id);

        if removed {
            info!("Removed favorite {}", city_id);
            self.publish_list().await;
        } else {
            debug!("Remove of {} ignored, not a favorite", city_id);
        }

        Ok(removed)
    }

    pub async fn is_favorite(&self, city_id: &str) -> crate::Result<bool> {
        Ok(self.inner.store.get_favorite(city_id).await?.is_some())
    }

    /// Add or remove a city
    ///
    /// # Returns
    ///
    /// Whether the city is a favorite afterwards
    pub async fn toggle(&self, identity: &CityIdentity) -> crate::Result<bool> {
        if self.is_favorite(identity.id()).await? {
            self.remove(identity.id()).await?;
            Ok(false)
        } else {
            self.add(identity).await?;
            Ok(true)
        }
    }

    /// Favorites with their cached snapshot and derived state
    ///
    /// Reads only the store; never triggers a refresh.
    pub async fn entries(&self, ttl_secs: u64) -> crate::Result<Vec<FavoriteEntry>> {
        let favorites = self.inner.store.list_favorites().await?;
        let now = Utc::now();

        let mut entries = Vec::with_capacity(favorites.len());
        for favorite in favorites {
            let snapshot = self.inner.store.get_snapshot(&favorite.city_id).await?;
            let failed = self.failures().contains(&favorite.city_id);
            let state = EntryState::derive(snapshot.as_ref(), failed, ttl_secs, now);
            entries.push(FavoriteEntry {
                favorite,
                snapshot,
                state,
            });
        }

        Ok(entries)
    }

    /// Refresh every favorite
    ///
    /// Each city runs on its own task, so a slow or failing city does not
    /// hold up the others.
    pub async fn refresh_all(&self, ttl_secs: u64) -> crate::Result<RefreshReport> {
        let favorites = self.inner.store.list_favorites().await?;
        debug!("Refreshing {} favorites", favorites.len());

        let mut tasks = JoinSet::new();
        for (index, favorite) in favorites.iter().enumerate() {
            let this = self.clone();
            let identity = CityIdentity::from_favorite(favorite);
            tasks.spawn(async move {
                let outcome = this.refresh_one(&identity, ttl_secs).await;
                (index, identity.id().to_string(), outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(favorites.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Refresh task failed: {}", e),
            }
        }
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = RefreshReport::default();
        for (_, city_id, outcome) in outcomes {
            match outcome {
                Ok(_) => report.refreshed.push(city_id),
                Err(e) => report.failed.push((city_id, e)),
            }
        }

        info!(
            "Refreshed {} favorites, {} failed",
            report.refreshed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Register a listener
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&FavoritesEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        id
    }

    /// Remove a listener
    ///
    /// # Returns
    ///
    /// `false` if the id was unknown or already removed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    async fn refresh_one(
        &self,
        identity: &CityIdentity,
        ttl_secs: u64,
    ) -> Result<WeatherSnapshot, SyncError> {
        let city_id = identity.id().to_string();
        let outcome = self.inner.engine.get_snapshot(identity, ttl_secs).await;

        // The city may have been removed while the fetch was running
        match self.is_favorite(&city_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("{} is no longer a favorite, dropping refresh result", city_id);
                if let Err(e) = self.inner.engine.evict(&city_id).await {
                    warn!("Failed to evict snapshot of removed favorite {}: {}", city_id, e);
                }
                return outcome;
            }
            Err(e) => warn!("Failed to check favorite {}: {}", city_id, e),
        }

        match outcome {
            Ok(snapshot) => {
                self.failures().remove(&city_id);
                self.publish(&FavoritesEvent::SnapshotUpdated {
                    city_id,
                    snapshot: snapshot.clone(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Refresh of favorite {} failed: {}", city_id, e);
                self.failures().insert(city_id.clone());
                self.publish(&FavoritesEvent::RefreshFailed {
                    city_id,
                    error: e.clone(),
                });
                Err(e)
            }
        }
    }

    async fn publish_list(&self) {
        match self.inner.store.list_favorites().await {
            Ok(list) => self.publish(&FavoritesEvent::ListChanged(list)),
            Err(e) => warn!("Failed to list favorites for subscribers: {}", e),
        }
    }

    fn publish(&self, event: &FavoritesEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    fn failures(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
