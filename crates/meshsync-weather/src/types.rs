use meshsync_core::NetworkError;
use serde::{Deserialize, Serialize};

/// Display placeholders substituted for data that could not be obtained.
pub mod sentinel {
    /// Temperature before any result arrived
    pub const PENDING: &str = "--";
    pub const NOT_AVAILABLE: &str = "N/A";
    pub const ERROR: &str = "Error";
    pub const TIMEOUT: &str = "Timeout";
    pub const NET_ERROR: &str = "Net Error";

    pub const LOADING: &str = "Loading...";
    pub const CITY_NOT_FOUND: &str = "City Not Found";
    pub const GEOCODE_ERROR: &str = "Geocode Error";
    pub const PARSE_ERROR: &str = "Parse Error";
    pub const GPS_ERROR: &str = "GPS Error";
    pub const NO_GPS: &str = "No GPS";
    /// Reverse geocoding failed but GPS coordinates are known
    pub const GPS_LOC: &str = "GPS Loc";
    /// Reverse geocoding succeeded without a usable place component
    pub const UNKNOWN: &str = "Unknown";
}

/// Condition code meaning "no weather data". Code 0 is a real "clear sky".
pub const CONDITION_UNAVAILABLE: i32 = -1;

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Coordinates plus the name shown on the watch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub display_name: String,
}

/// Successful weather lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Rounded integer as text, e.g. "-3"
    pub temperature: String,
    pub condition: i32,
    pub is_day: bool,
}

/// Everything the watch displays about the weather.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherState {
    pub temperature: String,
    pub location: String,
    pub condition: i32,
    pub is_day: bool,
}

impl WeatherState {
    /// State shown before the first run completes.
    pub fn loading() -> Self {
        Self {
            temperature: sentinel::PENDING.to_string(),
            location: sentinel::LOADING.to_string(),
            condition: CONDITION_UNAVAILABLE,
            is_day: true,
        }
    }

    /// Location could not be resolved: no weather lookup happened.
    pub fn location_failed(location_sentinel: &str) -> Self {
        Self {
            temperature: sentinel::NOT_AVAILABLE.to_string(),
            location: location_sentinel.to_string(),
            condition: CONDITION_UNAVAILABLE,
            is_day: true,
        }
    }

    /// Location resolved but the weather lookup failed; the display name is kept.
    pub fn weather_failed(display_name: &str, temperature_sentinel: &str) -> Self {
        Self {
            temperature: temperature_sentinel.to_string(),
            location: display_name.to_string(),
            condition: CONDITION_UNAVAILABLE,
            is_day: true,
        }
    }

    pub fn resolved(display_name: &str, current: CurrentConditions) -> Self {
        Self {
            temperature: current.temperature,
            location: display_name.to_string(),
            condition: current.condition,
            is_day: current.is_day,
        }
    }
}

impl Default for WeatherState {
    fn default() -> Self {
        Self::loading()
    }
}

/// Device geolocation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    /// The host has no geolocation capability at all
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

impl LocationError {
    pub fn sentinel(&self) -> &'static str {
        match self {
            LocationError::ServiceUnavailable => sentinel::NO_GPS,
            _ => sentinel::GPS_ERROR,
        }
    }
}

/// Forward geocoding (place name to coordinates) errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("No results for {0:?}")]
    NotFound(String),
    #[error("Geocoding parse error: {0}")]
    Parse(String),
    #[error("Geocoding returned status {0}")]
    Status(u16),
    #[error("Geocoding transport error: {0}")]
    Transport(#[from] NetworkError),
}

impl GeocodeError {
    pub fn sentinel(&self) -> &'static str {
        match self {
            GeocodeError::NotFound(_) => sentinel::CITY_NOT_FOUND,
            GeocodeError::Parse(_) => sentinel::PARSE_ERROR,
            GeocodeError::Status(_) => sentinel::GEOCODE_ERROR,
            GeocodeError::Transport(e) if e.is_timeout() => sentinel::TIMEOUT,
            GeocodeError::Transport(_) => sentinel::NET_ERROR,
        }
    }
}

/// Reverse geocoding errors. All of them degrade to [`sentinel::GPS_LOC`].
#[derive(Debug, thiserror::Error)]
pub enum ReverseGeocodeError {
    #[error("Reverse geocode parse error: {0}")]
    Parse(String),
    #[error("Reverse geocode returned status {0}")]
    Status(u16),
    #[error("Reverse geocode returned no address")]
    NoAddress,
    #[error("Reverse geocode transport error: {0}")]
    Transport(#[from] NetworkError),
}

/// Either step of location resolution failed; the run ends without a weather lookup.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

impl ResolveError {
    pub fn sentinel(&self) -> &'static str {
        match self {
            ResolveError::Location(e) => e.sentinel(),
            ResolveError::Geocode(e) => e.sentinel(),
        }
    }
}

/// Current-weather lookup errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherFetchError {
    #[error("Weather parse error: {0}")]
    Parse(String),
    #[error("Weather response has no current conditions")]
    MissingCurrent,
    #[error("Weather API returned status {0}")]
    Status(u16),
    #[error("Weather transport error: {0}")]
    Transport(#[from] NetworkError),
}

impl WeatherFetchError {
    pub fn sentinel(&self) -> &'static str {
        match self {
            WeatherFetchError::Parse(_) => sentinel::ERROR,
            WeatherFetchError::MissingCurrent => sentinel::NOT_AVAILABLE,
            WeatherFetchError::Transport(e) if e.is_timeout() => sentinel::TIMEOUT,
            WeatherFetchError::Transport(_) => sentinel::NET_ERROR,
            WeatherFetchError::Status(_) => sentinel::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_failed_state() {
        let state = WeatherState::location_failed(sentinel::CITY_NOT_FOUND);
        assert_eq!(state.temperature, "N/A");
        assert_eq!(state.location, "City Not Found");
        assert_eq!(state.condition, CONDITION_UNAVAILABLE);
        assert!(state.is_day);
    }

    #[test]
    fn test_location_error_sentinels() {
        assert_eq!(LocationError::ServiceUnavailable.sentinel(), "No GPS");
        assert_eq!(LocationError::PermissionDenied.sentinel(), "GPS Error");
        assert_eq!(LocationError::Timeout.sentinel(), "GPS Error");
    }

    #[test]
    fn test_geocode_error_sentinels() {
        assert_eq!(GeocodeError::NotFound("x".into()).sentinel(), "City Not Found");
        assert_eq!(GeocodeError::Parse("x".into()).sentinel(), "Parse Error");
        assert_eq!(GeocodeError::Status(500).sentinel(), "Geocode Error");
        assert_eq!(GeocodeError::Transport(NetworkError::Timeout).sentinel(), "Timeout");
        assert_eq!(
            GeocodeError::Transport(NetworkError::ConnectionFailed("refused".into())).sentinel(),
            "Net Error"
        );
    }

    #[test]
    fn test_weather_error_sentinels() {
        assert_eq!(WeatherFetchError::Parse("x".into()).sentinel(), "Error");
        assert_eq!(WeatherFetchError::MissingCurrent.sentinel(), "N/A");
        assert_eq!(WeatherFetchError::Status(502).sentinel(), "Error");
        assert_eq!(WeatherFetchError::Transport(NetworkError::Timeout).sentinel(), "Timeout");
    }
}
