// # File Store
//
// File-based implementation of LocalStore with crash recovery.
//
// ## Purpose
//
// Keeps favorites and cached snapshots across process restarts, so the last
// known weather can be shown offline right after launch.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validated on load
// - Backup: `.backup` copy of the last good file
// - Recovery: falls back to the backup if the main file is corrupt
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "favorites": [
//     { "city_id": "48.856600_2.352200", "display_name": "Paris",
//       "latitude": 48.8566, "longitude": 2.3522 }
//   ],
//   "weather_cache": {
//     "48.856600_2.352200": { "city_id": "48.856600_2.352200", "...": "..." }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::config::StoreConfig;
use crate::model::{FavoriteCity, WeatherSnapshot};
use crate::traits::local_store::{LocalStore, LocalStoreFactory};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based store with crash recovery
///
/// Every mutation is written through to disk before the call returns. The two
/// tables are locked independently in memory; file writes are serialized by a
/// separate write lock so concurrent mutations never interleave on disk.
///
/// # Example
///
/// ```rust,no_run
/// use meteo_core::store::FileStore;
/// use meteo_core::traits::LocalStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/meteo/store.json").await?;
///     for favorite in store.list_favorites().await? {
///         println!("{}", favorite.display_name);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    favorites: Arc<RwLock<Vec<FavoriteCity>>>,
    snapshots: Arc<RwLock<HashMap<String, WeatherSnapshot>>>,
    write_lock: Mutex<()>,
    dirty: AtomicBool,
}

/// Serializable store file format
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(default)]
    favorites: Vec<FavoriteCity>,
    #[serde(default)]
    weather_cache: BTreeMap<String, WeatherSnapshot>,
}

impl FileStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing file
    /// 3. If it is corrupt, try the backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let state = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            favorites: Arc::new(RwLock::new(state.favorites)),
            snapshots: Arc::new(RwLock::new(state.weather_cache.into_iter().collect())),
            write_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        })
    }

    /// Load the store file, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<StoreFileFormat, Error> {
        match Self::load(path).await {
            Ok(state) => {
                tracing::debug!(
                    "Loaded store: {} favorites, {} snapshots",
                    state.favorites.len(),
                    state.weather_cache.len()
                );
                Ok(state)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(StoreFileFormat::default());
                }

                match Self::load(&backup_path).await {
                    Ok(state) => {
                        tracing::info!(
                            "Recovered store from backup: {} favorites, {} snapshots",
                            state.favorites.len(),
                            state.weather_cache.len()
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(state)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(StoreFileFormat::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load a store file; a missing file is an empty store
    async fn load(path: &Path) -> Result<StoreFileFormat, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(StoreFileFormat::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let state: StoreFileFormat = serde_json::from_str(&content)?;

        if state.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                state.version
            );
        }

        Ok(state)
    }

    /// Write both tables to disk atomically
    async fn write_state(&self) -> Result<(), Error> {
        let _write_guard = self.write_lock.lock().await;

        let state = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            favorites: self.favorites.read().await.clone(),
            weather_cache: self
                .snapshots
                .read()
                .await
                .iter()
                .map(|(id, snapshot)| (id.clone(), snapshot.clone()))
                .collect(),
        };

        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.dirty.store(false, Ordering::SeqCst);
        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Mark dirty and write through
    async fn persist(&self) -> Result<(), Error> {
        self.dirty.store(true, Ordering::SeqCst);
        self.write_state().await
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn upsert_favorite(&self, favorite: &FavoriteCity) -> Result<(), Error> {
        {
            let mut guard = self.favorites.write().await;
            super::upsert_ordered(&mut guard, favorite);
        }
        self.persist().await
    }

    async fn get_favorite(&self, city_id: &str) -> Result<Option<FavoriteCity>, Error> {
        let guard = self.favorites.read().await;
        Ok(guard.iter().find(|f| f.city_id == city_id).cloned())
    }

    async fn delete_favorite(&self, city_id: &str) -> Result<bool, Error> {
        let removed = {
            let mut guard = self.favorites.write().await;
            super::remove_ordered(&mut guard, city_id)
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn list_favorites(&self) -> Result<Vec<FavoriteCity>, Error> {
        Ok(self.favorites.read().await.clone())
    }

    async fn upsert_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<(), Error> {
        {
            let mut guard = self.snapshots.write().await;
            guard.insert(snapshot.city_id.clone(), snapshot.clone());
        }
        self.persist().await
    }

    async fn get_snapshot(&self, city_id: &str) -> Result<Option<WeatherSnapshot>, Error> {
        Ok(self.snapshots.read().await.get(city_id).cloned())
    }

    async fn delete_snapshot(&self, city_id: &str) -> Result<(), Error> {
        let removed = self.snapshots.write().await.remove(city_id).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(())
    }

    async fn list_snapshots(&self) -> Result<Vec<WeatherSnapshot>, Error> {
        Ok(self.snapshots.read().await.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.dirty.load(Ordering::SeqCst) {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}

/// Factory for `file` stores
pub struct FileStoreFactory;

#[async_trait]
impl LocalStoreFactory for FileStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn LocalStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file store")),
        }
    }
}
