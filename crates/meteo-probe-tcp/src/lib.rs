// # Connectivity Probes
//
// This crate provides ConnectivityProbe implementations:
//
// - `TcpProbe`: opens a TCP connection to a well-known host; online when the
//   connect succeeds within the timeout
// - `StaticProbe`: fixed answer, for offline mode and tests
//
// ## Monitoring
//
// `TcpProbe::watch()` spawns a polling task that yields a
// `ConnectivityChange` only when the state flips. The first poll sets the
// baseline and is not reported. The task stops when the stream is dropped.
//
// ## Limitations
//
// A successful TCP connect only proves the route to one host. It is a
// best-effort signal; the forecast call can still fail.

use async_trait::async_trait;
use meteo_core::config::ProbeConfig;
use meteo_core::registry::ProviderRegistry;
use meteo_core::traits::{ConnectivityChange, ConnectivityProbe, ConnectivityProbeFactory};
use meteo_core::{Error, Result};
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_stream::Stream;

/// TCP reachability probe
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
    poll_interval: Duration,
}

impl TcpProbe {
    /// Create a new probe
    ///
    /// # Parameters
    ///
    /// - `host`: Host name or address to connect to
    /// - `port`: TCP port
    /// - `timeout`: Connect timeout
    /// - `poll_interval`: Interval between checks in `watch()`
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            poll_interval,
        }
    }

    async fn check(host: &str, port: u16, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::trace!("Probe connect to {}:{} failed: {}", host, port, e);
                false
            }
            Err(_) => {
                tracing::trace!("Probe connect to {}:{} timed out", host, port);
                false
            }
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_online(&self) -> bool {
        Self::check(&self.host, self.port, self.timeout).await
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = ConnectivityChange> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let host = self.host.clone();
        let port = self.port;
        let timeout = self.timeout;
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            tracing::info!(
                "Starting connectivity monitoring ({}:{}, interval={:?})",
                host,
                port,
                poll_interval
            );

            let mut last_known: Option<bool> = None;

            loop {
                let online = Self::check(&host, port, timeout).await;

                match last_known {
                    Some(previous) if previous != online => {
                        tracing::info!(
                            "Connectivity changed: {} -> {}",
                            if previous { "online" } else { "offline" },
                            if online { "online" } else { "offline" }
                        );
                        if tx.send(ConnectivityChange::new(online, Some(previous))).is_err() {
                            break;
                        }
                    }
                    None => tracing::debug!("Initial connectivity: online={}", online),
                    _ => {}
                }
                last_known = Some(online);

                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = tx.closed() => break,
                }
            }

            tracing::debug!("Connectivity monitoring stopped");
        });

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    fn probe_name(&self) -> &'static str {
        "tcp"
    }
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    online: bool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self { online }
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.online
    }

    fn probe_name(&self) -> &'static str {
        "static"
    }
}

/// Factory for `tcp` probes
pub struct TcpProbeFactory;

impl ConnectivityProbeFactory for TcpProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Box<dyn ConnectivityProbe>> {
        match config {
            ProbeConfig::Tcp {
                host,
                port,
                timeout_ms,
                poll_interval_secs,
            } => Ok(Box::new(TcpProbe::new(
                host.clone(),
                *port,
                Duration::from_millis(*timeout_ms),
                Duration::from_secs(*poll_interval_secs),
            ))),
            _ => Err(Error::config("Invalid config for TCP probe")),
        }
    }
}

/// Factory for `static` probes
pub struct StaticProbeFactory;

impl ConnectivityProbeFactory for StaticProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Box<dyn ConnectivityProbe>> {
        match config {
            ProbeConfig::Static { online } => Ok(Box::new(StaticProbe::new(*online))),
            _ => Err(Error::config("Invalid config for static probe")),
        }
    }
}

/// Register the `tcp` and `static` probes
pub fn register(registry: &ProviderRegistry) {
    registry.register_probe("tcp", Box::new(TcpProbeFactory));
    registry.register_probe("static", Box::new(StaticProbeFactory));
}
