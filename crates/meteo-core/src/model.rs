//! City identity, weather snapshots and staleness
//!
//! ## Identity
//!
//! A city is identified by its coordinates, not by a display name or a
//! provider id (reverse-geocoded points have none). The id is
//! `"<lat>_<lon>"` with both values rounded to [`ID_PRECISION`] decimal
//! places, so resolving the same place through search or geolocation yields
//! the same id.
//!
//! ## Snapshots
//!
//! A [`WeatherSnapshot`] is a complete, point-in-time record for one city. It
//! is replaced wholesale on every successful refresh.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::forecast::ForecastResponse;

/// Decimal places kept in coordinate-derived ids
pub const ID_PRECISION: usize = 6;

/// Number of hourly points kept in a snapshot
pub const HOURLY_POINTS: usize = 24;

/// Display name used for geolocation probes
pub const CURRENT_LOCATION_NAME: &str = "Current location";

/// How far in the future a `fetched_at` may be and still count as fresh
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

/// Build the stable id for a coordinate pair
///
/// Values are rounded half away from zero and negative zero is folded into
/// zero, so `-0.0000001` and `0.0` share an id.
pub fn city_id_for(latitude: f64, longitude: f64) -> String {
    format!(
        "{:.prec$}_{:.prec$}",
        round_coordinate(latitude),
        round_coordinate(longitude),
        prec = ID_PRECISION
    )
}

fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(ID_PRECISION as i32);
    // `+ 0.0` turns -0.0 into 0.0
    (value * scale).round() / scale + 0.0
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::invalid_input(format!(
            "latitude out of range: {}",
            latitude
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::invalid_input(format!(
            "longitude out of range: {}",
            longitude
        )));
    }
    Ok(())
}

/// Immutable identity of a physical location
///
/// Created transiently by a geocoder or a geolocation probe; never persisted
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityIdentity {
    id: String,
    display_name: String,
    latitude: f64,
    longitude: f64,
    country: String,
    admin_region: Option<String>,
}

impl CityIdentity {
    /// Create an identity, deriving its id from the coordinates
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` if a coordinate is not finite or out of range.
    pub fn new(
        display_name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        country: impl Into<String>,
        admin_region: Option<String>,
    ) -> Result<Self> {
        validate_coordinates(latitude, longitude)?;

        Ok(Self {
            id: city_id_for(latitude, longitude),
            display_name: display_name.into(),
            latitude,
            longitude,
            country: country.into(),
            admin_region: admin_region.filter(|r| !r.trim().is_empty()),
        })
    }

    /// Identity for a geolocation probe point
    pub fn current_location(latitude: f64, longitude: f64) -> Result<Self> {
        Self::new(CURRENT_LOCATION_NAME, latitude, longitude, "", None)
    }

    /// Rebuild an identity from a stored favorite, keeping its persisted id
    pub(crate) fn from_favorite(favorite: &FavoriteCity) -> Self {
        Self {
            id: favorite.city_id.clone(),
            display_name: favorite.display_name.clone(),
            latitude: favorite.latitude,
            longitude: favorite.longitude,
            country: String::new(),
            admin_region: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn admin_region(&self) -> Option<&str> {
        self.admin_region.as_deref()
    }
}

/// A city the user saved
///
/// Independent lifecycle from [`WeatherSnapshot`]: a favorite may have no
/// snapshot yet, and a snapshot may exist for a city that is not a favorite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteCity {
    pub city_id: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&CityIdentity> for FavoriteCity {
    fn from(identity: &CityIdentity) -> Self {
        Self {
            city_id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            latitude: identity.latitude,
            longitude: identity.longitude,
        }
    }
}

/// Weather category derived from a WMO weather code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Fog,
    LightRain,
    Rain,
    Snow,
    Showers,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// Map a WMO code; codes outside the table map to `Unknown`
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=3 => Self::PartlyCloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::LightRain,
            61 | 63 | 65 => Self::Rain,
            71 | 73 | 75 => Self::Snow,
            80..=82 => Self::Showers,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly cloudy",
            Self::Fog => "fog",
            Self::LightRain => "light rain",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Showers => "showers",
            Self::Thunderstorm => "thunderstorm",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One hourly temperature point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    /// `HH:MM` label
    pub time: String,
    pub temperature: f64,
}

/// Complete weather record for one city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_id: String,
    pub city_name: String,
    pub temperature: f64,
    pub wind_speed: f64,
    pub condition_code: i32,
    pub condition: WeatherCondition,
    pub min_temp: f64,
    pub max_temp: f64,
    pub hourly: Vec<HourlyPoint>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Build a snapshot from a forecast response
    ///
    /// - `min_temp`/`max_temp` come from day 0 of the daily series and fall
    ///   back to the current temperature when the series is empty
    /// - `hourly` keeps the first [`HOURLY_POINTS`] entries
    pub fn from_forecast(
        identity: &CityIdentity,
        response: &ForecastResponse,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let current = &response.current;

        let min_temp = response
            .daily
            .min_temp
            .first()
            .copied()
            .flatten()
            .unwrap_or(current.temperature);
        let max_temp = response
            .daily
            .max_temp
            .first()
            .copied()
            .flatten()
            .unwrap_or(current.temperature);

        let hourly = response
            .hourly
            .time
            .iter()
            .zip(response.hourly.temperature.iter())
            .take(HOURLY_POINTS)
            .map(|(time, temperature)| HourlyPoint {
                time: hour_label(time),
                temperature: *temperature,
            })
            .collect();

        Self {
            city_id: identity.id().to_string(),
            city_name: identity.display_name().to_string(),
            temperature: current.temperature,
            wind_speed: current.wind_speed,
            condition_code: current.condition_code,
            condition: WeatherCondition::from_wmo_code(current.condition_code),
            min_temp,
            max_temp,
            hourly,
            fetched_at,
        }
    }

    /// Age of the snapshot at `now` (zero if `fetched_at` is in the future)
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.fetched_at)
            .max(chrono::Duration::zero())
    }

    /// Fresh while `now - fetched_at < ttl`
    ///
    /// A `fetched_at` up to [`MAX_CLOCK_SKEW_SECS`] in the future counts as
    /// age zero. Further ahead means the clock went backwards, and the
    /// snapshot is treated as stale so it gets refreshed.
    pub fn is_fresh(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        let ahead_ms = i128::from(self.fetched_at.signed_duration_since(now).num_milliseconds());
        if ahead_ms > i128::from(MAX_CLOCK_SKEW_SECS) * 1000 {
            return false;
        }

        let age_ms = i128::from(self.age(now).num_milliseconds());
        age_ms < i128::from(ttl_secs) * 1000
    }
}

/// Normalize a provider time value to an `HH:MM` label
///
/// Accepts `YYYY-MM-DDTHH:MM` (with optional seconds). Anything else falls
/// back to the text after `T`, or the raw value.
pub fn hour_label(raw: &str) -> String {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return parsed.format("%H:%M").to_string();
        }
    }

    match raw.split_once('T') {
        Some((_, time)) => time.to_string(),
        None => raw.to_string(),
    }
}

/// Derived per-favorite state, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// No snapshot and no failed attempt yet
    Unloaded,
    /// Snapshot younger than the TTL
    Fresh,
    /// Snapshot exists but is older than the TTL
    Stale,
    /// Last refresh failed and nothing is cached
    Failed,
}

impl EntryState {
    /// Derive the state from the cached snapshot and the last refresh outcome
    pub fn derive(
        snapshot: Option<&WeatherSnapshot>,
        last_refresh_failed: bool,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        match snapshot {
            Some(s) if s.is_fresh(ttl_secs, now) => Self::Fresh,
            Some(_) => Self::Stale,
            None if last_refresh_failed => Self::Failed,
            None => Self::Unloaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::forecast::{CurrentConditions, DailySeries, HourlySeries};

    fn paris() -> CityIdentity {
        CityIdentity::new("Paris", 48.8566, 2.3522, "France", Some("Île-de-France".into()))
            .unwrap()
    }

    fn response(daily_min: Vec<Option<f64>>, daily_max: Vec<Option<f64>>, hours: usize) -> ForecastResponse {
        ForecastResponse {
            current: CurrentConditions {
                temperature: 12.5,
                wind_speed: 8.0,
                condition_code: 61,
            },
            daily: DailySeries {
                min_temp: daily_min,
                max_temp: daily_max,
            },
            hourly: HourlySeries {
                time: (0..hours)
                    .map(|h| format!("2025-03-0{}T{:02}:00", 1 + h / 24, h % 24))
                    .collect(),
                temperature: (0..hours).map(|h| h as f64).collect(),
            },
        }
    }

    #[test]
    fn id_uses_six_decimal_places() {
        assert_eq!(paris().id(), "48.856600_2.352200");
        assert_eq!(city_id_for(-33.8688, 151.2093), "-33.868800_151.209300");
    }

    #[test]
    fn id_is_stable_across_resolution_paths() {
        let searched = CityIdentity::new("Paris", 48.8566, 2.3522, "France", None).unwrap();
        let located = CityIdentity::current_location(48.85660001, 2.35219999).unwrap();
        assert_eq!(searched.id(), located.id());
        assert_eq!(located.display_name(), CURRENT_LOCATION_NAME);
    }

    #[test]
    fn id_folds_negative_zero() {
        assert_eq!(city_id_for(-0.0000001, 0.0), "0.000000_0.000000");
        assert_eq!(city_id_for(-0.0, -0.0), city_id_for(0.0, 0.0));
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        assert!(CityIdentity::new("x", 91.0, 0.0, "", None).is_err());
        assert!(CityIdentity::new("x", 0.0, -180.5, "", None).is_err());
        assert!(CityIdentity::new("x", f64::NAN, 0.0, "", None).is_err());
        assert!(CityIdentity::new("x", 90.0, 180.0, "", None).is_ok());
    }

    #[test]
    fn blank_admin_region_is_dropped() {
        let city = CityIdentity::new("Lyon", 45.764, 4.8357, "France", Some("  ".into())).unwrap();
        assert_eq!(city.admin_region(), None);
    }

    #[test]
    fn condition_table() {
        let cases: &[(&[i32], &str)] = &[
            (&[0], "clear"),
            (&[1, 2, 3], "partly cloudy"),
            (&[45, 48], "fog"),
            (&[51, 53, 55], "light rain"),
            (&[61, 63, 65], "rain"),
            (&[71, 73, 75], "snow"),
            (&[80, 81, 82], "showers"),
            (&[95, 96, 99], "thunderstorm"),
            (&[-1, 4, 56, 77, 85, 100], "unknown"),
        ];

        for (codes, label) in cases {
            for code in *codes {
                assert_eq!(
                    WeatherCondition::from_wmo_code(*code).label(),
                    *label,
                    "code {}",
                    code
                );
            }
        }
    }

    #[test]
    fn hour_label_normalizes_iso_times() {
        assert_eq!(hour_label("2025-03-01T14:00"), "14:00");
        assert_eq!(hour_label("2025-03-01T07:30:00"), "07:30");
        assert_eq!(hour_label("garbageT9h"), "9h");
        assert_eq!(hour_label("noon"), "noon");
    }

    #[test]
    fn snapshot_mapping_takes_day_zero_and_24_hours() {
        let now = Utc::now();
        let snapshot =
            WeatherSnapshot::from_forecast(&paris(), &response(
                vec![Some(3.0), Some(1.0)],
                vec![Some(15.0), Some(9.0)],
                48,
            ), now);

        assert_eq!(snapshot.city_id, "48.856600_2.352200");
        assert_eq!(snapshot.city_name, "Paris");
        assert_eq!(snapshot.temperature, 12.5);
        assert_eq!(snapshot.wind_speed, 8.0);
        assert_eq!(snapshot.condition, WeatherCondition::Rain);
        assert_eq!(snapshot.min_temp, 3.0);
        assert_eq!(snapshot.max_temp, 15.0);
        assert_eq!(snapshot.hourly.len(), HOURLY_POINTS);
        assert_eq!(snapshot.hourly[0].time, "00:00");
        assert_eq!(snapshot.hourly[23].time, "23:00");
        assert_eq!(snapshot.fetched_at, now);
    }

    #[test]
    fn snapshot_mapping_defaults_min_max_to_current() {
        let snapshot =
            WeatherSnapshot::from_forecast(&paris(), &response(vec![], vec![], 5), Utc::now());
        assert_eq!(snapshot.min_temp, 12.5);
        assert_eq!(snapshot.max_temp, 12.5);
        assert_eq!(snapshot.hourly.len(), 5);
    }

    #[test]
    fn snapshot_mapping_missing_today_does_not_take_tomorrow() {
        let snapshot = WeatherSnapshot::from_forecast(
            &paris(),
            &response(vec![None, Some(2.0)], vec![None, Some(20.0)], 0),
            Utc::now(),
        );
        assert_eq!(snapshot.min_temp, 12.5);
        assert_eq!(snapshot.max_temp, 12.5);
    }

    #[test]
    fn freshness_is_strictly_less_than_ttl() {
        let now = Utc::now();
        let mut snapshot =
            WeatherSnapshot::from_forecast(&paris(), &response(vec![], vec![], 0), now);

        assert!(snapshot.is_fresh(60, now));
        assert!(!snapshot.is_fresh(0, now));

        snapshot.fetched_at = now - chrono::Duration::seconds(60);
        assert!(!snapshot.is_fresh(60, now));
        assert!(snapshot.is_fresh(61, now));
    }

    #[test]
    fn far_future_fetched_at_is_stale() {
        let now = Utc::now();
        let mut snapshot =
            WeatherSnapshot::from_forecast(&paris(), &response(vec![], vec![], 0), now);

        snapshot.fetched_at = now + chrono::Duration::seconds(MAX_CLOCK_SKEW_SECS as i64 - 1);
        assert!(snapshot.is_fresh(60, now));

        snapshot.fetched_at = now + chrono::Duration::hours(3);
        assert!(!snapshot.is_fresh(86_400, now));
        assert_eq!(snapshot.age(now), chrono::Duration::zero());
    }

    #[test]
    fn entry_state_derivation() {
        let now = Utc::now();
        let mut snapshot =
            WeatherSnapshot::from_forecast(&paris(), &response(vec![], vec![], 0), now);

        assert_eq!(EntryState::derive(None, false, 60, now), EntryState::Unloaded);
        assert_eq!(EntryState::derive(None, true, 60, now), EntryState::Failed);
        assert_eq!(EntryState::derive(Some(&snapshot), true, 60, now), EntryState::Fresh);

        snapshot.fetched_at = now - chrono::Duration::hours(2);
        assert_eq!(EntryState::derive(Some(&snapshot), false, 60, now), EntryState::Stale);
    }
}
