use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable consulted for the COVID Act Now API key.
pub const API_KEY_ENV: &str = "COVID_ACT_NOW_API_KEY";

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

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream endpoints and credentials
    #[serde(default)]
    pub api: ApiConfig,

    /// Local cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Fixed coordinates for hosts without a location service
    #[serde(default)]
    pub location: LocationConfig,

    /// Widget-level settings
    #[serde(default)]
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the COVID Act Now v2 API
    #[serde(default = "default_covid_api_url")]
    pub covid_api_url: String,

    /// API key appended as `apiKey` to every metrics request.
    /// Falls back to the `COVID_ACT_NOW_API_KEY` environment variable.
    #[serde(default = "default_covid_api_key")]
    pub covid_api_key: String,

    /// Base URL of the FCC area API used for county FIPS lookup
    #[serde(default = "default_geo_api_url")]
    pub geo_api_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_covid_api_url() -> String {
    "https://api.covidactnow.org/v2".to_string()
}

fn default_covid_api_key() -> String {
    std::env::var(API_KEY_ENV).unwrap_or_default()
}

fn default_geo_api_url() -> String {
    "https://geo.fcc.gov/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("actnow-widget/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            covid_api_url: default_covid_api_url(),
            covid_api_key: default_covid_api_key(),
            geo_api_url: default_geo_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one JSON file per cache key
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,

    /// A cached region id younger than this is used without a live lookup
    #[serde(default = "default_location_max_age_minutes")]
    pub location_max_age_minutes: u32,

    /// Cached metrics older than this are refused as a fallback
    #[serde(default = "default_data_max_age_minutes")]
    pub data_max_age_minutes: u32,
}

fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("covid-act-now")
}

fn default_location_max_age_minutes() -> u32 {
    15
}

fn default_data_max_age_minutes() -> u32 {
    120
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            location_max_age_minutes: default_location_max_age_minutes(),
            data_max_age_minutes: default_data_max_age_minutes(),
        }
    }
}

impl CacheConfig {
    /// Cache rooted at `directory` with the default freshness windows.
    pub fn in_dir(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn location_max_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.location_max_age_minutes) * 60)
    }

    pub fn data_max_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.data_max_age_minutes) * 60)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationConfig {
    /// Both coordinates, when configured.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Default 5-digit county FIPS code, used when the host passes none
    #[serde(default)]
    pub region: Option<String>,

    /// Hours until the host should refresh the widget again
    #[serde(default = "default_refresh_hours")]
    pub refresh_hours: u32,
}

fn default_refresh_hours() -> u32 {
    4
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            region: None,
            refresh_hours: default_refresh_hours(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing the defaults there first when
    /// the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Created default config at {}", path.display());
            return Ok(config);
        }

        Self::load_from(path)
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_or_create(path)?;
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

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.covid_api_url, "api.covid_api_url", &mut result);
        self.validate_url(&self.api.geo_api_url, "api.geo_api_url", &mut result);

        if self.api.covid_api_key.trim().is_empty() {
            result.add_warning(
                "api.covid_api_key",
                format!("No API key configured (set {}); requests will be rejected", API_KEY_ENV),
            );
        }

        if self.api.request_timeout_secs == 0 {
            result.add_error("api.request_timeout_secs", "Timeout must be greater than 0");
        }

        if self.cache.location_max_age_minutes == 0 {
            result.add_warning(
                "cache.location_max_age_minutes",
                "Cached location is never reused (0 minutes)",
            );
        }

        if self.cache.data_max_age_minutes == 0 {
            result.add_warning(
                "cache.data_max_age_minutes",
                "Cached metrics are never used as a fallback (0 minutes)",
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_warning("location.latitude", "Latitude is outside -90..90");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_warning("location.longitude", "Longitude is outside -180..180");
                }
            }
            (None, None) => {}
            _ => result.add_warning(
                "location",
                "Only one coordinate configured; fixed location is ignored",
            ),
        }

        if let Some(region) = &self.widget.region {
            let trimmed = region.trim();
            if trimmed.len() != 5 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                result.add_warning(
                    "widget.region",
                    format!("'{}' is not a 5-digit county FIPS code", region),
                );
            }
        }

        result
    }

    /// Validate a URL field
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

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("actnow");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn keyed_config() -> Config {
        let mut config = Config::default();
        config.api.covid_api_key = "test-key".to_string();
        config
    }

    #[test]
    fn test_valid_default_config() {
        let result = keyed_config().validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_windows() {
        let config = Config::default();
        assert_eq!(config.cache.location_max_age(), Duration::from_secs(15 * 60));
        assert_eq!(config.cache.data_max_age(), Duration::from_secs(2 * 60 * 60));
        assert_eq!(config.widget.refresh_hours, 4);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = keyed_config();
        config.api.covid_api_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.covid_api_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = keyed_config();
        config.api.geo_api_url = "ftp://geo.fcc.gov/api".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = keyed_config();
        config.api.request_timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_missing_api_key_is_warning() {
        let mut config = Config::default();
        config.api.covid_api_key = String::new();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "api.covid_api_key"));
    }

    #[test]
    fn test_non_fips_region_is_warning() {
        let mut config = keyed_config();
        config.widget.region = Some("LA county".to_string());
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "widget.region"));
    }

    #[test]
    fn test_half_configured_location_is_warning() {
        let mut config = keyed_config();
        config.location.latitude = Some(34.05);
        let result = config.validate();
        assert!(result.warnings.iter().any(|w| w.field == "location"));
        assert!(config.location.coordinates().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = keyed_config();
        config.widget.region = Some("06037".to_string());
        config.cache.data_max_age_minutes = 90;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.widget.region.as_deref(), Some("06037"));
        assert_eq!(loaded.cache.data_max_age_minutes, 90);
        assert_eq!(loaded.api.covid_api_key, "test-key");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[widget]\nregion = \"17031\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.widget.region.as_deref(), Some("17031"));
        assert_eq!(loaded.widget.refresh_hours, 4);
        assert_eq!(loaded.cache.location_max_age_minutes, 15);
        assert_eq!(loaded.api.geo_api_url, "https://geo.fcc.gov/api");
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actnow").join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.widget.refresh_hours, 4);

        std::fs::write(&path, "[widget]\nregion = \"06037\"\n").unwrap();
        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(reloaded.widget.region.as_deref(), Some("06037"));
    }

    #[test]
    fn test_load_validated_from_rejects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nrequest_timeout_secs = 0\n").unwrap();

        let err = Config::load_validated_from(&path).unwrap_err();
        assert!(err.to_string().contains("api.request_timeout_secs"));
    }

    #[test]
    fn test_load_validated_from_keeps_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\ncovid_api_key = \"\"\n[widget]\nregion = \"LA\"\n",
        )
        .unwrap();

        let (config, validation) = Config::load_validated_from(&path).unwrap();
        assert_eq!(config.widget.region.as_deref(), Some("LA"));
        assert!(validation.warnings.iter().any(|w| w.field == "widget.region"));
        assert!(validation.warnings.iter().any(|w| w.field == "api.covid_api_key"));
    }

    #[test]
    fn test_config_path_under_actnow() {
        if let Ok(path) = Config::config_path() {
            assert!(path.ends_with("actnow/config.toml"));
        }
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
