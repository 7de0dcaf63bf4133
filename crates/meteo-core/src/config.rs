//! Configuration types for the weather synchronization layer
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Default Open-Meteo forecast endpoint
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Default Open-Meteo geocoding endpoint
pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeteoConfig {
    /// Forecast client configuration
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Geocoding client configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Connectivity probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Local store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Sync engine and coordinator settings
    #[serde(default)]
    pub sync: SyncConfig,
}

impl MeteoConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.forecast.validate()?;
        self.geocoding.validate()?;
        self.probe.validate()?;
        self.store.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

fn validate_url(kind: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} URL cannot be empty", kind)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} URL must use HTTP or HTTPS scheme. Got: {}",
            kind, url
        )));
    }
    Ok(())
}

fn validate_custom(kind: &str, factory: &str, config: &serde_json::Value) -> Result<(), crate::Error> {
    if factory.is_empty() {
        return Err(crate::Error::config(format!(
            "Custom {} factory cannot be empty",
            kind
        )));
    }
    if config.is_null() {
        return Err(crate::Error::config(format!(
            "Custom {} config cannot be null",
            kind
        )));
    }
    Ok(())
}

/// Forecast client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForecastConfig {
    /// Open-Meteo forecast API
    OpenMeteo {
        /// Endpoint URL
        base_url: String,
    },

    /// Custom forecast client
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ForecastConfig::OpenMeteo { base_url } => validate_url("Forecast", base_url),
            ForecastConfig::Custom { factory, config } => {
                validate_custom("forecast client", factory, config)
            }
        }
    }

    /// Get the client type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            ForecastConfig::OpenMeteo { .. } => "open_meteo",
            ForecastConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig::OpenMeteo {
            base_url: DEFAULT_FORECAST_URL.to_string(),
        }
    }
}

/// Geocoding client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeocodingConfig {
    /// Open-Meteo geocoding API
    OpenMeteo {
        /// Endpoint URL
        base_url: String,
    },

    /// Custom geocoder
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl GeocodingConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            GeocodingConfig::OpenMeteo { base_url } => validate_url("Geocoding", base_url),
            GeocodingConfig::Custom { factory, config } => {
                validate_custom("geocoding client", factory, config)
            }
        }
    }

    /// Get the client type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            GeocodingConfig::OpenMeteo { .. } => "open_meteo",
            GeocodingConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        GeocodingConfig::OpenMeteo {
            base_url: DEFAULT_GEOCODING_URL.to_string(),
        }
    }
}

/// Connectivity probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// TCP reachability probe
    Tcp {
        /// Host to connect to
        host: String,
        /// Port to connect to
        port: u16,
        /// Connect timeout in milliseconds
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
        /// Poll interval for `watch()` in seconds
        #[serde(default = "default_probe_poll_interval_secs")]
        poll_interval_secs: u64,
    },

    /// Fixed answer
    Static {
        /// Reported state
        online: bool,
    },

    /// Custom probe
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProbeConfig::Tcp {
                host,
                port,
                timeout_ms,
                poll_interval_secs,
            } => {
                if host.is_empty() {
                    return Err(crate::Error::config("Probe host cannot be empty"));
                }
                if *port == 0 {
                    return Err(crate::Error::config("Probe port must be > 0"));
                }
                if *timeout_ms == 0 {
                    return Err(crate::Error::config("Probe timeout must be > 0"));
                }
                if *poll_interval_secs == 0 {
                    return Err(crate::Error::config("Probe poll interval must be > 0"));
                }
                Ok(())
            }
            ProbeConfig::Static { .. } => Ok(()),
            ProbeConfig::Custom { factory, config } => validate_custom("probe", factory, config),
        }
    }

    /// Get the probe type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            ProbeConfig::Tcp { .. } => "tcp",
            ProbeConfig::Static { .. } => "static",
            ProbeConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Tcp {
            host: "api.open-meteo.com".to_string(),
            port: 443,
            timeout_ms: default_probe_timeout_ms(),
            poll_interval_secs: default_probe_poll_interval_secs(),
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_probe_poll_interval_secs() -> u64 {
    30
}

/// Local store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
            StoreConfig::Custom { factory, config } => validate_custom("store", factory, config),
        }
    }

    /// Get the store type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Sync engine and coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum snapshot age before a refresh is attempted (seconds)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of search candidates
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Search result language
    #[serde(default = "default_language")]
    pub language: String,

    /// Interval between background refreshes of all favorites (seconds)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Capacity of the engine's event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.search_limit == 0 || self.search_limit > 100 {
            return Err(crate::Error::config(format!(
                "Search limit must be between 1 and 100. Got: {}",
                self.search_limit
            )));
        }
        if self.language.is_empty() {
            return Err(crate::Error::config("Language cannot be empty"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            search_limit: default_search_limit(),
            language: default_language(),
            refresh_interval_secs: default_refresh_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_search_limit() -> usize {
    10
}

fn default_language() -> String {
    "en".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    15 * 60
}

fn default_event_channel_capacity() -> usize {
    256
}
