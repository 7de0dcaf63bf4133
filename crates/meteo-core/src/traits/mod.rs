//! Collaborator traits for the synchronization layer
//!
//! - [`GeocodingClient`]: free-text city search
//! - [`ForecastClient`]: current/hourly/daily forecast for a coordinate
//! - [`LocalStore`]: favorites table and weather cache
//! - [`ConnectivityProbe`]: is a network path usable

pub mod connectivity;
pub mod forecast;
pub mod geocoding;
pub mod local_store;

pub use connectivity::{ConnectivityChange, ConnectivityProbe, ConnectivityProbeFactory};
pub use forecast::{
    CurrentConditions, DailySeries, ForecastClient, ForecastClientFactory, ForecastResponse,
    HourlySeries,
};
pub use geocoding::{GeocodingCandidate, GeocodingClient, GeocodingClientFactory};
pub use local_store::{LocalStore, LocalStoreFactory};
