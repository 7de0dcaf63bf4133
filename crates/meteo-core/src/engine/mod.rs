//! Cache-aside weather synchronization engine
//!
//! The WeatherSyncEngine is responsible for:
//! - Serving cached snapshots while they are fresh
//! - Refreshing stale or missing snapshots from the ForecastClient
//! - Coalescing concurrent refreshes of the same city into one remote call
//! - Falling back to stale data when the network or the remote fails
//!
//! ## Architecture
//!
//! ```text
//!                        get_snapshot(identity, ttl)
//!                                     │
//!                                     ▼
//!                          ┌────────────────────┐
//!                          │ WeatherSyncEngine  │
//!                          └────────────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌───────────────────┐       ┌────────────────┐
//! │ LocalStore  │           │ ConnectivityProbe │       │ ForecastClient │
//! │ (read/write)│           │ (gate)            │       │ (refresh)      │
//! └─────────────┘           └───────────────────┘       └────────────────┘
//! ```
//!
//! ## Request Flow
//!
//! 1. Read the cached snapshot; return it if younger than the TTL
//! 2. Join the city's in-flight refresh, or start one
//! 3. The refresh checks the probe, calls the forecast client and writes the
//!    new snapshot back to the store
//! 4. On failure, the pre-refresh snapshot is returned if there is one
//!
//! ## Coalescing
//!
//! Each city has at most one refresh running. The refresh runs on its own
//! task and publishes its outcome through a `watch` channel, so every caller
//! that arrived while it was running receives the same result, and a caller
//! that goes away does not cancel it for the others.
//!
//! The in-flight table only holds running refreshes; a refresh removes its
//! own entry when it finishes. A refresh writes to the store only while its
//! entry is still registered, and the write happens under the table lock.
//! [`WeatherSyncEngine::evict`] unregisters a running refresh, so a snapshot
//! evicted mid-refresh is not written back.

use crate::error::{SyncError, UnavailableCause};
use crate::model::{CityIdentity, WeatherSnapshot};
use crate::traits::{ConnectivityProbe, ForecastClient, LocalStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

/// Events emitted by the WeatherSyncEngine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Fresh snapshot served from the store
    CacheHit { city_id: String },

    /// Caller joined a refresh that was already running
    Coalesced { city_id: String },

    /// Remote refresh started
    RefreshStarted { city_id: String },

    /// Remote refresh succeeded and the snapshot was replaced
    Refreshed {
        city_id: String,
        fetched_at: DateTime<Utc>,
    },

    /// Refresh failed; the previous snapshot was returned instead
    ServedStale { city_id: String, reason: String },

    /// Refresh failed and nothing was cached
    Unavailable { city_id: String, error: SyncError },

    /// Cached snapshot removed
    Evicted { city_id: String },
}

/// Outcome slot shared by every caller of one refresh; `None` while running
type FlightSlot = Option<Result<WeatherSnapshot, SyncError>>;

/// A running refresh
struct Flight {
    id: u64,
    rx: watch::Receiver<FlightSlot>,
}

/// Collaborators and the in-flight table, shared with refresh tasks
struct Shared {
    forecast: Arc<dyn ForecastClient>,
    probe: Arc<dyn ConnectivityProbe>,
    store: Arc<dyn LocalStore>,
    event_tx: Option<mpsc::Sender<SyncEvent>>,

    /// Running refresh per city
    flights: Mutex<HashMap<String, Flight>>,
    next_flight: AtomicU64,
}

impl Shared {
    fn new(
        forecast: Arc<dyn ForecastClient>,
        probe: Arc<dyn ConnectivityProbe>,
        store: Arc<dyn LocalStore>,
        event_tx: Option<mpsc::Sender<SyncEvent>>,
    ) -> Self {
        Self {
            forecast,
            probe,
            store,
            event_tx,
            flights: Mutex::new(HashMap::new()),
            next_flight: AtomicU64::new(1),
        }
    }
}

/// Cache-aside weather engine
///
/// ## Lifecycle
///
/// 1. Create with [`WeatherSyncEngine::new()`]
/// 2. Optionally attach an event channel with [`WeatherSyncEngine::with_events()`]
/// 3. Share behind an `Arc` and call [`WeatherSyncEngine::get_snapshot()`]
///
/// ## Threading
///
/// All methods take `&self` and are safe to call concurrently. There is no
/// global lock around remote calls; the in-flight table is only held while a
/// caller decides whether to join or start a refresh, and while a refresh
/// writes its result.
///
/// Refresh tasks are spawned onto the current Tokio runtime.
pub struct WeatherSyncEngine {
    shared: Arc<Shared>,
}

impl WeatherSyncEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `forecast`: Forecast client implementation
    /// - `probe`: Connectivity probe implementation
    /// - `store`: Local store shared with the favorites coordinator
    pub fn new(
        forecast: Arc<dyn ForecastClient>,
        probe: Arc<dyn ConnectivityProbe>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(forecast, probe, store, None)),
        }
    }

    /// Attach a bounded event channel
    ///
    /// Call before the engine is shared. When the channel is full, new
    /// events are dropped with a warning.
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver).
    pub fn with_events(self, capacity: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shared = Shared::new(
            Arc::clone(&self.shared.forecast),
            Arc::clone(&self.shared.probe),
            Arc::clone(&self.shared.store),
            Some(tx),
        );

        let engine = Self {
            shared: Arc::new(shared),
        };
        (engine, rx)
    }

    /// The store this engine reads and writes
    pub fn store(&self) -> Arc<dyn LocalStore> {
        Arc::clone(&self.shared.store)
    }

    /// Get the weather for a city, refreshing it if older than `ttl_secs`
    ///
    /// # Returns
    ///
    /// - `Ok(snapshot)`: a fresh snapshot, a newly fetched one, or the stale
    ///   one when the refresh failed
    /// - `Err(SyncError::Unavailable)`: the refresh failed and nothing is
    ///   cached; `cause` tells why
    pub async fn get_snapshot(
        &self,
        identity: &CityIdentity,
        ttl_secs: u64,
    ) -> Result<WeatherSnapshot, SyncError> {
        let city_id = identity.id();

        let (cached, read_error) = match self.shared.store.get_snapshot(city_id).await {
            Ok(cached) => (cached, None),
            Err(e) => {
                warn!("Failed to read cached snapshot for {}: {}", city_id, e);
                (None, Some(e.to_string()))
            }
        };

        if let Some(snapshot) = &cached
            && snapshot.is_fresh(ttl_secs, Utc::now())
        {
            debug!("Cache hit for {}", city_id);
            self.shared.emit_event(SyncEvent::CacheHit {
                city_id: city_id.to_string(),
            });
            return Ok(snapshot.clone());
        }

        let mut flight = {
            let mut flights = self.shared.flights.lock().await;

            // A sender that is gone belongs to a refresh task that died
            let running = flights
                .get(city_id)
                .filter(|flight| flight.rx.has_changed().is_ok())
                .map(|flight| flight.rx.clone());

            match running {
                Some(rx) => {
                    debug!("Joining in-flight refresh for {}", city_id);
                    self.shared.emit_event(SyncEvent::Coalesced {
                        city_id: city_id.to_string(),
                    });
                    rx
                }
                None => {
                    // A refresh may have finished between the read above and
                    // taking the lock; its write is visible now
                    if let Ok(Some(latest)) = self.shared.store.get_snapshot(city_id).await
                        && latest.is_fresh(ttl_secs, Utc::now())
                    {
                        debug!("Refresh for {} completed while waiting", city_id);
                        return Ok(latest);
                    }

                    let id = self.shared.next_flight.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    flights.insert(
                        city_id.to_string(),
                        Flight {
                            id,
                            rx: rx.clone(),
                        },
                    );

                    let shared = Arc::clone(&self.shared);
                    let identity = identity.clone();
                    let previous = cached.clone();
                    let read_error = read_error.clone();
                    tokio::spawn(async move {
                        let outcome = shared.refresh(&identity, id, previous, read_error).await;
                        shared.finish(identity.id(), id).await;
                        tx.send_replace(Some(outcome));
                    });
                    rx
                }
            }
        };

        let outcome = match flight.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };

        match outcome {
            Some(result) => result,
            None => {
                warn!("Refresh task for {} ended without a result", city_id);
                cached.ok_or_else(|| {
                    SyncError::unavailable(
                        city_id,
                        UnavailableCause::RemoteFailure(
                            "refresh task ended without a result".to_string(),
                        ),
                    )
                })
            }
        }
    }

    /// Remove the cached snapshot for a city
    ///
    /// A refresh that is still running keeps serving the callers that joined
    /// it, but its result is no longer written to the store.
    pub async fn evict(&self, city_id: &str) -> crate::Result<()> {
        let detached = self.shared.flights.lock().await.remove(city_id).is_some();
        if detached {
            debug!("Detached running refresh for {}", city_id);
        }

        self.shared.store.delete_snapshot(city_id).await?;
        debug!("Evicted snapshot for {}", city_id);
        self.shared.emit_event(SyncEvent::Evicted {
            city_id: city_id.to_string(),
        });
        Ok(())
    }

    /// Number of refreshes currently running
    pub async fn in_flight(&self) -> usize {
        self.shared.flights.lock().await.len()
    }
}

impl Shared {
    /// Refresh one city; runs on its own task
    async fn refresh(
        &self,
        identity: &CityIdentity,
        flight_id: u64,
        previous: Option<WeatherSnapshot>,
        read_error: Option<String>,
    ) -> Result<WeatherSnapshot, SyncError> {
        let city_id = identity.id();

        if !self.probe.is_online().await {
            debug!(
                "Probe {} reports offline, skipping refresh of {}",
                self.probe.probe_name(),
                city_id
            );
            return self.fallback(city_id, previous, read_error, UnavailableCause::NoNetwork);
        }

        self.emit_event(SyncEvent::RefreshStarted {
            city_id: city_id.to_string(),
        });

        let response = match self
            .forecast
            .forecast(identity.latitude(), identity.longitude())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Forecast from {} failed for {}: {}",
                    self.forecast.client_name(),
                    city_id,
                    e
                );
                return self.fallback(
                    city_id,
                    previous,
                    read_error,
                    UnavailableCause::RemoteFailure(e.to_string()),
                );
            }
        };

        // fetched_at never moves backwards for a city
        let mut fetched_at = Utc::now();
        if let Some(prev) = &previous
            && prev.fetched_at > fetched_at
        {
            fetched_at = prev.fetched_at;
        }

        let snapshot = WeatherSnapshot::from_forecast(identity, &response, fetched_at);

        let registered = {
            let flights = self.flights.lock().await;
            let registered = flights.get(city_id).is_some_and(|f| f.id == flight_id);
            if registered && let Err(e) = self.store.upsert_snapshot(&snapshot).await {
                warn!("Failed to store snapshot for {}: {}", city_id, e);
            }
            registered
        };

        if !registered {
            debug!("{} was evicted during refresh, result not stored", city_id);
            return Ok(snapshot);
        }

        info!(
            "Refreshed {} ({}): {:.1}°, {}",
            snapshot.city_name, city_id, snapshot.temperature, snapshot.condition
        );
        self.emit_event(SyncEvent::Refreshed {
            city_id: city_id.to_string(),
            fetched_at,
        });

        Ok(snapshot)
    }

    /// Unregister a finished refresh unless it was evicted or replaced
    async fn finish(&self, city_id: &str, flight_id: u64) {
        let mut flights = self.flights.lock().await;
        if flights.get(city_id).is_some_and(|f| f.id == flight_id) {
            flights.remove(city_id);
        }
    }

    /// Serve the stale snapshot, or fail with `Unavailable`
    ///
    /// A failed store read takes precedence as the cause, since it is why
    /// there is nothing to fall back to.
    fn fallback(
        &self,
        city_id: &str,
        previous: Option<WeatherSnapshot>,
        read_error: Option<String>,
        cause: UnavailableCause,
    ) -> Result<WeatherSnapshot, SyncError> {
        match previous {
            Some(snapshot) => {
                warn!("Serving stale snapshot for {}: {}", city_id, cause);
                self.emit_event(SyncEvent::ServedStale {
                    city_id: city_id.to_string(),
                    reason: cause.to_string(),
                });
                Ok(snapshot)
            }
            None => {
                let cause = match read_error {
                    Some(msg) => UnavailableCause::Store(msg),
                    None => cause,
                };
                let error = SyncError::unavailable(city_id, cause);
                warn!("{}", error);
                self.emit_event(SyncEvent::Unavailable {
                    city_id: city_id.to_string(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };

        if tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
