use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_REVERSE_GEOCODING_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_USER_AGENT: &str = "meshsync/0.1.0 (companion weather sync)";

/// Environment variable prefix, e.g. `MESHSYNC_REFRESH_MINUTES=15`.
const ENV_PREFIX: &str = "MESHSYNC";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Service-level settings: endpoints, timeouts and scheduling.
///
/// User preferences (location, theme, ...) live in
/// [`Configuration`](crate::Configuration) and are persisted separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Open-Meteo geocoding search endpoint
    pub geocoding_url: String,

    /// Nominatim reverse geocoding endpoint
    pub reverse_geocoding_url: String,

    /// Open-Meteo forecast endpoint
    pub forecast_url: String,

    /// User-Agent sent with every request (Nominatim rejects anonymous clients)
    pub user_agent: String,

    /// Timeout for forward and reverse geocoding requests
    pub geocode_timeout_secs: u64,

    /// Timeout for the current-weather request
    pub weather_timeout_secs: u64,

    /// Timeout for a device location fix
    pub location_timeout_secs: u64,

    /// Maximum accepted age of a cached device location fix
    pub location_max_age_secs: u64,

    /// Periodic refresh interval in minutes (0 disables the timer)
    pub refresh_minutes: u32,

    /// SQLite file holding persisted user settings
    pub settings_db: PathBuf,

    /// Inbox size of the device message channel
    pub max_message_bytes: usize,

    /// Static coordinates reported as the device location, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_longitude: Option<f64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            reverse_geocoding_url: DEFAULT_REVERSE_GEOCODING_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            geocode_timeout_secs: 10,
            weather_timeout_secs: 15,
            location_timeout_secs: 30,
            location_max_age_secs: 60,
            refresh_minutes: 30,
            settings_db: Self::config_dir().join("settings.db"),
            max_message_bytes: 256,
            fixed_latitude: None,
            fixed_longitude: None,
        }
    }
}

impl ServiceConfig {
    /// Load from `path` (optional) plus `MESHSYNC_*` environment overrides.
    /// Fields missing from every source keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read service configuration")?;

        let config: ServiceConfig = settings
            .try_deserialize()
            .context("Failed to parse service configuration")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.geocoding_url, "geocoding_url", &mut result);
        self.validate_url(
            &self.reverse_geocoding_url,
            "reverse_geocoding_url",
            &mut result,
        );
        self.validate_url(&self.forecast_url, "forecast_url", &mut result);

        if self.user_agent.trim().is_empty() {
            result.add_error("user_agent", "User-Agent must not be empty");
        }

        for (field, secs) in [
            ("geocode_timeout_secs", self.geocode_timeout_secs),
            ("weather_timeout_secs", self.weather_timeout_secs),
            ("location_timeout_secs", self.location_timeout_secs),
        ] {
            if secs == 0 {
                result.add_error(field, "Timeout must be greater than 0");
            } else if secs > 120 {
                result.add_warning(field, "Timeout is unusually long (>120s)");
            }
        }

        if self.refresh_minutes == 0 {
            result.add_warning("refresh_minutes", "Periodic refresh disabled (0 minutes)");
        } else if self.refresh_minutes > 1440 {
            result.add_warning(
                "refresh_minutes",
                "Refresh interval is more than 24 hours",
            );
        }

        if self.max_message_bytes < 64 {
            result.add_error(
                "max_message_bytes",
                "Device inbox must hold at least 64 bytes",
            );
        }

        match (self.fixed_latitude, self.fixed_longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("fixed_latitude", "Latitude must be within [-90, 90]");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("fixed_longitude", "Longitude must be within [-180, 180]");
                }
            }
            (None, None) => {}
            _ => result.add_error(
                "fixed_latitude",
                "fixed_latitude and fixed_longitude must be set together",
            ),
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocode_timeout_secs)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_secs(self.weather_timeout_secs)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }

    /// `None` when the periodic timer is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_minutes > 0).then(|| Duration::from_secs(u64::from(self.refresh_minutes) * 60))
    }

    /// Write the default configuration as a TOML template, creating parent directories.
    pub fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// `<platform config dir>/meshsync`
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("meshsync")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = ServiceConfig::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let config = ServiceConfig {
            forecast_url: "not-a-url".to_string(),
            ..ServiceConfig::default()
        };
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "forecast_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let config = ServiceConfig {
            geocoding_url: "ftp://localhost:8080".to_string(),
            ..ServiceConfig::default()
        };
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let config = ServiceConfig {
            weather_timeout_secs: 0,
            ..ServiceConfig::default()
        };
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather_timeout_secs"));
    }

    #[test]
    fn test_zero_refresh_is_warning() {
        let config = ServiceConfig {
            refresh_minutes: 0,
            ..ServiceConfig::default()
        };
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "refresh_minutes"));
        assert!(config.refresh_interval().is_none());
    }

    #[test]
    fn test_half_fixed_location_is_error() {
        let config = ServiceConfig {
            fixed_latitude: Some(48.2),
            ..ServiceConfig::default()
        };
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.weather_timeout_secs, 15);
        assert_eq!(config.geocode_timeout_secs, 10);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(30 * 60)));
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh_minutes = 5\nfixed_latitude = 48.21\nfixed_longitude = 16.37\n")
            .unwrap();

        let config = ServiceConfig::load_from(&path).unwrap();
        assert_eq!(config.refresh_minutes, 5);
        assert_eq!(config.fixed_latitude, Some(48.21));
        assert_eq!(config.forecast_url, DEFAULT_FORECAST_URL);
    }

    #[test]
    fn test_save_default_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        ServiceConfig::save_default(&path).unwrap();

        let config = ServiceConfig::load_from(&path).unwrap();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.max_message_bytes, 256);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
