// # Connectivity Probe Trait
//
// Reports whether a network path is currently usable.
//
// ## Implementations
//
// - TCP reachability probe: `meteo-probe-tcp` crate
// - Static probe (fixed answer, for tests and offline mode): `meteo-probe-tcp`
//
// ## Usage
//
// ```rust,ignore
// use meteo_core::ConnectivityProbe;
// use tokio_stream::StreamExt;
//
// if probe.is_online().await {
//     // go to the network
// }
//
// let mut changes = probe.watch();
// while let Some(change) = changes.next().await {
//     if change.online { /* refresh favorites */ }
// }
// ```

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// A connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityChange {
    /// New state
    pub online: bool,
    /// Previous state, if known
    pub previous: Option<bool>,
}

impl ConnectivityChange {
    pub fn new(online: bool, previous: Option<bool>) -> Self {
        Self { online, previous }
    }

    /// True when the network came back
    pub fn is_restored(&self) -> bool {
        self.online && self.previous == Some(false)
    }
}

/// Trait for connectivity probes
///
/// `is_online` is best-effort and must return promptly; it never errors; an
/// indeterminate probe answers `false`.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Whether a network path is currently usable
    async fn is_online(&self) -> bool;

    /// Stream of transitions
    ///
    /// Implementations yield only on change. The default stream never yields.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ConnectivityChange> + Send + 'static>> {
        Box::pin(tokio_stream::pending())
    }

    /// Probe name (for logging)
    fn probe_name(&self) -> &'static str;
}

/// Helper trait for constructing probes from configuration
pub trait ConnectivityProbeFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::ProbeConfig,
    ) -> Result<Box<dyn ConnectivityProbe>, crate::Error>;
}
