//! Error types for the weather synchronization layer
//!
//! Two families live here:
//! - [`Error`]: infrastructure failures (store I/O, configuration, HTTP
//!   plumbing). Backends return these.
//! - [`SyncError`]: the typed, user-facing outcome of sync operations. It is
//!   cheap to clone so a single coalesced refresh can hand the same result to
//!   every waiting caller.

use thiserror::Error;

/// Result type alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core infrastructure error type
#[derive(Error, Debug)]
pub enum Error {
    /// Local store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (malformed identity, out-of-range coordinates)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Backend name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a backend-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Why a snapshot could not be produced when nothing was cached
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnavailableCause {
    /// Connectivity probe reported no usable network
    #[error("no network connection")]
    NoNetwork,

    /// Forecast call failed (transport, HTTP status or malformed payload)
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// Local store could not be read or written
    #[error("store failure: {0}")]
    Store(String),
}

/// Typed outcome of a synchronization operation
///
/// None of these are fatal to the caller; they are meant to be surfaced to the
/// user with a retry affordance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Probe reports offline
    #[error("no network connection")]
    NoNetwork,

    /// Remote call failed
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// Geocoding returned zero results
    #[error("no city matches {0:?}")]
    NotFound(String),

    /// No cached snapshot to fall back to and no viable source
    #[error("weather unavailable for {city_id}: {cause}")]
    Unavailable {
        /// City the snapshot was requested for
        city_id: String,
        /// What prevented a refresh
        cause: UnavailableCause,
    },
}

impl SyncError {
    /// Build an `Unavailable` error for a city
    pub fn unavailable(city_id: impl Into<String>, cause: UnavailableCause) -> Self {
        Self::Unavailable {
            city_id: city_id.into(),
            cause,
        }
    }

    /// True when the failure was caused by missing connectivity
    pub fn is_offline(&self) -> bool {
        matches!(
            self,
            Self::NoNetwork
                | Self::Unavailable {
                    cause: UnavailableCause::NoNetwork,
                    ..
                }
        )
    }

    /// True when retrying later may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}
