// # meteod - Weather Sync Daemon
//
// Thin integration layer over meteo-core. It keeps a set of favorite cities'
// forecasts cached and refreshed; all sync logic lives in meteo-core.
//
// The meteod daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime
// 3. Registering backends
// 4. Seeding favorites and refreshing them on a timer and on reconnect
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Favorites
// - `METEO_FAVORITES`: Comma-separated city names to resolve and add on startup
// - `METEO_LANGUAGE`: Search result language (default: en)
//
// ### Sync
// - `METEO_TTL_SECS`: Maximum snapshot age before a refresh (default: 1800)
// - `METEO_REFRESH_INTERVAL_SECS`: Interval between refresh passes (default: 900)
//
// ### Endpoints
// - `METEO_FORECAST_URL`: Forecast endpoint (default: Open-Meteo)
// - `METEO_GEOCODING_URL`: Geocoding endpoint (default: Open-Meteo)
//
// ### Connectivity
// - `METEO_PROBE_TYPE`: Probe type (tcp, static)
// - `METEO_PROBE_HOST`: Host to connect to (for tcp)
// - `METEO_PROBE_PORT`: Port to connect to (for tcp)
// - `METEO_PROBE_INTERVAL_SECS`: Poll interval (for tcp)
//
// ### Store
// - `METEO_STORE_TYPE`: Type of store (file, memory)
// - `METEO_STORE_PATH`: Path to the store file (for file store)
//
// ## Example
//
// ```bash
// export METEO_FAVORITES=Paris,London,Tokyo
// export METEO_STORE_TYPE=file
// export METEO_STORE_PATH=/var/lib/meteo/store.json
//
// meteod
// ```

use anyhow::Result;
use meteo_core::{
    ConnectivityProbe, FavoritesCoordinator, FavoritesEvent, ForecastConfig, GeocodingConfig,
    GeocodingResolver, MeteoConfig, ProbeConfig, ProviderRegistry, StoreConfig, SyncConfig,
    WeatherSyncEngine,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MeteoExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MeteoExitCode> for ExitCode {
    fn from(code: MeteoExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    favorites: Vec<String>,
    language: String,
    ttl_secs: u64,
    refresh_interval_secs: u64,
    forecast_url: String,
    geocoding_url: String,
    probe_type: String,
    probe_host: String,
    probe_port: u16,
    probe_interval_secs: u64,
    store_type: String,
    store_path: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    ///
    /// Unset variables take their default. A set variable that does not parse
    /// is an error rather than a silent fallback.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let sync = SyncConfig::default();
        let (default_host, default_port, default_interval) = match ProbeConfig::default() {
            ProbeConfig::Tcp {
                host,
                port,
                poll_interval_secs,
                ..
            } => (host, port, poll_interval_secs),
            _ => ("api.open-meteo.com".to_string(), 443, 30),
        };

        Ok(Self {
            favorites: lookup("METEO_FAVORITES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            language: lookup("METEO_LANGUAGE").unwrap_or(sync.language),
            ttl_secs: parse_var(&lookup, "METEO_TTL_SECS")?.unwrap_or(sync.ttl_secs),
            refresh_interval_secs: parse_var(&lookup, "METEO_REFRESH_INTERVAL_SECS")?
                .unwrap_or(sync.refresh_interval_secs),
            forecast_url: lookup("METEO_FORECAST_URL")
                .unwrap_or_else(|| meteo_core::config::DEFAULT_FORECAST_URL.to_string()),
            geocoding_url: lookup("METEO_GEOCODING_URL")
                .unwrap_or_else(|| meteo_core::config::DEFAULT_GEOCODING_URL.to_string()),
            probe_type: lookup("METEO_PROBE_TYPE").unwrap_or_else(|| "tcp".to_string()),
            probe_host: lookup("METEO_PROBE_HOST").unwrap_or(default_host),
            probe_port: parse_var(&lookup, "METEO_PROBE_PORT")?.unwrap_or(default_port),
            probe_interval_secs: parse_var(&lookup, "METEO_PROBE_INTERVAL_SECS")?
                .unwrap_or(default_interval),
            store_type: lookup("METEO_STORE_TYPE").unwrap_or_else(|| "memory".to_string()),
            store_path: lookup("METEO_STORE_PATH"),
            log_level: lookup("METEO_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks the daemon-level values here, then defers to
    /// `MeteoConfig::validate` for the rest.
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "METEO_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "METEO_STORE_PATH is required when METEO_STORE_TYPE=file. \
                    Set it via: export METEO_STORE_PATH=/var/lib/meteo/store.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "METEO_STORE_PATH parent directory does not exist: {}. \
                            Create it first: mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            }
        }

        match self.probe_type.as_str() {
            "tcp" | "static" => {}
            _ => anyhow::bail!(
                "METEO_PROBE_TYPE '{}' is not supported. \
                Supported types: tcp, static",
                self.probe_type
            ),
        }

        if !(60..=86_400).contains(&self.ttl_secs) {
            anyhow::bail!(
                "METEO_TTL_SECS must be between 60 and 86400 seconds. Got: {}",
                self.ttl_secs
            );
        }

        if !(60..=86_400).contains(&self.refresh_interval_secs) {
            anyhow::bail!(
                "METEO_REFRESH_INTERVAL_SECS must be between 60 and 86400 seconds. Got: {}",
                self.refresh_interval_secs
            );
        }

        if !(1..=3600).contains(&self.probe_interval_secs) {
            anyhow::bail!(
                "METEO_PROBE_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                self.probe_interval_secs
            );
        }

        if self.language.len() > 8 || !self.language.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!(
                "METEO_LANGUAGE must be a short language code such as 'en'. Got: '{}'",
                self.language
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "METEO_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_meteo_config().validate()?;
        Ok(())
    }

    fn to_meteo_config(&self) -> MeteoConfig {
        let probe = if self.probe_type == "static" {
            ProbeConfig::Static { online: true }
        } else {
            ProbeConfig::Tcp {
                host: self.probe_host.clone(),
                port: self.probe_port,
                timeout_ms: 1500,
                poll_interval_secs: self.probe_interval_secs,
            }
        };

        let store = match (self.store_type.as_str(), &self.store_path) {
            ("file", Some(path)) => StoreConfig::File { path: path.clone() },
            _ => StoreConfig::Memory,
        };

        MeteoConfig {
            forecast: ForecastConfig::OpenMeteo {
                base_url: self.forecast_url.clone(),
            },
            geocoding: GeocodingConfig::OpenMeteo {
                base_url: self.geocoding_url.clone(),
            },
            probe,
            store,
            sync: SyncConfig {
                ttl_secs: self.ttl_secs,
                language: self.language.to_lowercase(),
                refresh_interval_secs: self.refresh_interval_secs,
                ..SyncConfig::default()
            },
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", name, raw, e)),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return MeteoExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return MeteoExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MeteoExitCode::ConfigError.into();
    }

    info!("Starting meteod daemon");
    info!(
        "Configuration loaded: {} favorite(s) to seed, ttl={}s",
        config.favorites.len(),
        config.ttl_secs
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MeteoExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            MeteoExitCode::RuntimeError
        } else {
            MeteoExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let mut shutdown = ShutdownSignals::install()?;
    let meteo = config.to_meteo_config();

    let registry = ProviderRegistry::new();

    #[cfg(feature = "open-meteo")]
    {
        info!("Registering Open-Meteo clients");
        meteo_open_meteo::register(&registry);
    }

    #[cfg(feature = "tcp-probe")]
    {
        info!("Registering connectivity probes");
        meteo_probe_tcp::register(&registry);
    }

    let forecast = Arc::from(registry.create_forecast_client(&meteo.forecast)?);
    let geocoder = Arc::from(registry.create_geocoding_client(&meteo.geocoding)?);
    let probe: Arc<dyn ConnectivityProbe> = Arc::from(registry.create_probe(&meteo.probe)?);
    let store = Arc::from(registry.create_store(&meteo.store).await?);

    info!(
        "Forecast: {}, probe: {}, store: {}",
        meteo.forecast.type_name(),
        probe.probe_name(),
        meteo.store.type_name()
    );

    let (engine, mut events) = WeatherSyncEngine::new(forecast, probe.clone(), store)
        .with_events(meteo.sync.event_channel_capacity);
    let engine = Arc::new(engine);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let ttl_secs = meteo.sync.ttl_secs;
    let coordinator = FavoritesCoordinator::new(engine.clone(), ttl_secs);
    let resolver = GeocodingResolver::new(
        geocoder,
        probe.clone(),
        meteo.sync.language.clone(),
        meteo.sync.search_limit,
    );

    coordinator.subscribe(|event| match event {
        FavoritesEvent::ListChanged(list) => info!("Favorites changed: {} cities", list.len()),
        FavoritesEvent::SnapshotUpdated { city_id, snapshot } => debug!(
            "{} ({}): {:.1}°C, {}",
            snapshot.city_name,
            city_id,
            snapshot.temperature,
            snapshot.condition.label()
        ),
        FavoritesEvent::RefreshFailed { city_id, error } => {
            warn!("No weather for {}: {}", city_id, error)
        }
    });

    // Queries that could not be resolved yet are retried on each pass
    let mut pending = config.favorites.clone();
    seed_favorites(&resolver, &coordinator, &mut pending).await;
    refresh_pass(&coordinator, ttl_secs).await;

    let period = Duration::from_secs(meteo.sync.refresh_interval_secs);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut changes = probe.watch();

    info!("Daemon initialized successfully");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                seed_favorites(&resolver, &coordinator, &mut pending).await;
                refresh_pass(&coordinator, ttl_secs).await;
            }
            Some(change) = changes.next() => {
                if change.is_restored() {
                    info!("Network restored, refreshing favorites");
                    seed_favorites(&resolver, &coordinator, &mut pending).await;
                    refresh_pass(&coordinator, ttl_secs).await;
                } else if !change.online {
                    warn!("Network lost, serving cached weather");
                }
            }
            signal = shutdown.recv() => {
                info!("Received shutdown signal: {}", signal);
                break;
            }
        }
    }

    info!("Shutting down daemon");
    engine.store().flush().await?;
    Ok(())
}

/// Resolve and add the pending favorite queries
///
/// A query is kept for the next pass when the failure is retryable; a query
/// that matches nothing is dropped.
async fn seed_favorites(
    resolver: &GeocodingResolver,
    coordinator: &FavoritesCoordinator,
    pending: &mut Vec<String>,
) {
    if pending.is_empty() {
        return;
    }

    let mut retry = Vec::new();
    for query in pending.drain(..) {
        match resolver.search_default(&query).await {
            Ok(candidates) => {
                let Some(city) = candidates.into_iter().next() else {
                    continue;
                };
                match coordinator.is_favorite(city.id()).await {
                    Ok(true) => debug!("{} is already a favorite", city.display_name()),
                    Ok(false) => {
                        if let Err(e) = coordinator.add(&city).await {
                            warn!("Failed to add favorite {}: {}", city.display_name(), e);
                            retry.push(query);
                        } else {
                            debug!("Seeded favorite {}", query);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read favorites: {}", e);
                        retry.push(query);
                    }
                }
            }
            Err(e) if e.is_retryable() => {
                warn!("Could not resolve {:?} yet: {}", query, e);
                retry.push(query);
            }
            Err(e) => warn!("Dropping favorite {:?}: {}", query, e),
        }
    }
    *pending = retry;
}

async fn refresh_pass(coordinator: &FavoritesCoordinator, ttl_secs: u64) {
    match coordinator.refresh_all(ttl_secs).await {
        Ok(report) if !report.is_complete() => {
            let cities: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
            warn!("Refresh incomplete, failed: {}", cities.join(", "));
        }
        Ok(_) => {}
        Err(e) => error!("Refresh pass failed: {}", e),
    }
}

/// Shutdown signal listener (SIGTERM, SIGINT)
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the next signal and return its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Shutdown signal listener (CTRL-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    }
}
