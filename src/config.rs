//! Configuration management for the `tenki` application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TenkiError;
use crate::models::region::{RegionCatalog, RegionEntry, builtin_entries};
use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the `tenki` application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenkiConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote forecast API settings
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Regions listed on the index page
    #[serde(default = "builtin_entries")]
    pub regions: Vec<RegionEntry>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    /// PEM certificate chain, enables HTTPS together with `tls_key_path`
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    /// PEM private key
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
    /// Linked as "Source Code" at the top of the index page
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Remote forecast API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Base URL, `/{code}.json` is appended
    #[serde(default = "default_forecast_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_forecast_timeout")]
    pub timeout_seconds: u32,
    /// Retries for transient failures
    #[serde(default)]
    pub max_retries: u32,
    /// Hold successful results back this long so the loading state is visible
    #[serde(default = "default_artificial_delay")]
    pub artificial_delay_ms: u64,
    /// How long a first page view waits for data before showing the placeholder
    #[serde(default = "default_render_wait")]
    pub render_wait_ms: u64,
    /// IANA zone used to display report timestamps
    #[serde(default = "default_display_timezone")]
    pub display_timezone: String,
    /// Fetch every catalog region at start-up
    #[serde(default)]
    pub prefetch: bool,
    /// Codes outside the catalog kept in memory at once
    #[serde(default = "default_max_cached_codes")]
    pub max_cached_codes: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP traces endpoint; spans are exported only when set
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_request_timeout() -> u32 {
    30
}

fn default_forecast_base_url() -> String {
    "https://www.jma.go.jp/bosai/forecast/data/overview_forecast".to_string()
}

fn default_forecast_timeout() -> u32 {
    30
}

fn default_artificial_delay() -> u64 {
    500
}

fn default_render_wait() -> u64 {
    3000
}

fn default_max_cached_codes() -> usize {
    64
}

fn default_display_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            request_timeout_seconds: default_request_timeout(),
            tls_cert_path: None,
            tls_key_path: None,
            source_url: None,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_base_url(),
            timeout_seconds: default_forecast_timeout(),
            max_retries: 0,
            artificial_delay_ms: default_artificial_delay(),
            render_wait_ms: default_render_wait(),
            display_timezone: default_display_timezone(),
            prefetch: false,
            max_cached_codes: default_max_cached_codes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl Default for TenkiConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            forecast: ForecastConfig::default(),
            logging: LoggingConfig::default(),
            regions: builtin_entries(),
        }
    }
}

impl ForecastConfig {
    #[must_use]
    pub fn artificial_delay(&self) -> Duration {
        Duration::from_millis(self.artificial_delay_ms)
    }

    #[must_use]
    pub fn render_wait(&self) -> Duration {
        Duration::from_millis(self.render_wait_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    /// Parsed display timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.display_timezone.parse::<Tz>().map_err(|_| {
            TenkiError::config(format!(
                "Unknown display timezone '{}'",
                self.display_timezone
            ))
            .into()
        })
    }
}

impl TenkiConfig {
    /// Load configuration from `config_path` (or the default location) and the environment
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.or_else(|| {
            Self::get_config_path()
                .filter(|p| p.exists())
                .or_else(|| Some(PathBuf::from("config.toml")))
        });

        if let Some(config_file) = config_file.filter(|p| p.exists()) {
            tracing::debug!("Reading configuration from {}", config_file.display());
            builder = builder.add_source(
                File::from(config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. TENKI_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("TENKI")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TenkiConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tenki").join("config.toml"))
    }

    /// Apply default values to fields left empty
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_server_host();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.forecast.base_url.is_empty() {
            self.forecast.base_url = default_forecast_base_url();
        }
        if self.forecast.timeout_seconds == 0 {
            self.forecast.timeout_seconds = default_forecast_timeout();
        }
        if self.forecast.display_timezone.is_empty() {
            self.forecast.display_timezone = default_display_timezone();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.regions.is_empty() {
            self.regions = builtin_entries();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_regions()?;
        Ok(())
    }

    /// The region catalog described by this configuration
    #[must_use]
    pub fn catalog(&self) -> RegionCatalog {
        RegionCatalog::new(self.regions.iter().cloned())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(TenkiError::config("Server port cannot be 0").into());
        }

        if self.server.request_timeout_seconds > 300 {
            return Err(TenkiError::config("Request timeout cannot exceed 300 seconds").into());
        }

        if self.forecast.timeout_seconds > 300 {
            return Err(TenkiError::config("Forecast API timeout cannot exceed 300 seconds").into());
        }

        if self.forecast.max_retries > 10 {
            return Err(TenkiError::config("Forecast API max retries cannot exceed 10").into());
        }

        if self.forecast.artificial_delay_ms > 60_000 {
            return Err(TenkiError::config("Artificial delay cannot exceed 60000 ms").into());
        }

        if self.forecast.render_wait_ms > 60_000 {
            return Err(TenkiError::config("Render wait cannot exceed 60000 ms").into());
        }

        if self.forecast.max_cached_codes > 10_000 {
            return Err(TenkiError::config("Max cached codes cannot exceed 10000").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TenkiError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TenkiError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.forecast.base_url.starts_with("http://")
            && !self.forecast.base_url.starts_with("https://")
        {
            return Err(TenkiError::config(
                "Forecast API base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        self.forecast.timezone()?;

        if let Some(url) = &self.server.source_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TenkiError::config(format!(
                    "Source URL '{url}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.server.tls_cert_path.is_some() != self.server.tls_key_path.is_some() {
            return Err(TenkiError::config(
                "tls_cert_path and tls_key_path must be set together",
            )
            .into());
        }

        Ok(())
    }

    fn validate_regions(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                return Err(TenkiError::config(format!(
                    "Region {} has an empty name",
                    region.code
                ))
                .into());
            }
            if !seen.insert(region.code) {
                return Err(TenkiError::config(format!(
                    "Region {} is listed more than once",
                    region.code
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionCode;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TenkiConfig::default();
        assert_eq!(
            config.forecast.base_url,
            "https://www.jma.go.jp/bosai/forecast/data/overview_forecast"
        );
        assert_eq!(config.forecast.artificial_delay_ms, 500);
        assert_eq!(config.forecast.max_retries, 0);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.regions.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_timezone_is_tokyo() {
        let config = TenkiConfig::default();
        assert_eq!(config.forecast.timezone().unwrap(), chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TenkiConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TenkiConfig::default();
        config.forecast.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_unknown_timezone() {
        let mut config = TenkiConfig::default();
        config.forecast.display_timezone = "JST".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown display timezone"));
    }

    #[test]
    fn test_config_validation_duplicate_region() {
        let mut config = TenkiConfig::default();
        config.regions.push(RegionEntry {
            code: RegionCode::new(120000),
            name: "千葉again".into(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_config_validation_cache_limit() {
        let mut config = TenkiConfig::default();
        assert_eq!(config.forecast.max_cached_codes, 64);
        config.forecast.max_cached_codes = 0;
        assert!(config.validate().is_ok());
        config.forecast.max_cached_codes = 20_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Max cached codes"));
    }

    #[test]
    fn test_config_validation_source_url() {
        let mut config = TenkiConfig::default();
        config.server.source_url = Some("https://example.com/tenki".into());
        assert!(config.validate().is_ok());
        config.server.source_url = Some("example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_half_tls() {
        let mut config = TenkiConfig::default();
        config.server.tls_cert_path = Some(PathBuf::from("cert.pem"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("tenki-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[forecast]
artificial_delay_ms = 0
display_timezone = "UTC"

[[regions]]
code = 270000
name = "大阪"
"#
        )
        .unwrap();

        let config = TenkiConfig::load_from_path(Some(path)).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(config.forecast.artificial_delay_ms, 0);
        assert_eq!(config.forecast.display_timezone, "UTC");
        // untouched sections keep their defaults
        assert_eq!(config.server.port, 3000);
        let catalog = config.catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.name(RegionCode::new(270000)), Some("大阪"));
    }

    #[test]
    fn test_environment_variable_override() {
        // SAFETY: Test environment, no other test reads this variable
        unsafe {
            std::env::set_var("TENKI_FORECAST__MAX_RETRIES", "4");
        }

        let result = TenkiConfig::load_from_path(Some(PathBuf::from("does-not-exist.toml")));

        // SAFETY: Test cleanup
        unsafe {
            std::env::remove_var("TENKI_FORECAST__MAX_RETRIES");
        }

        assert_eq!(result.unwrap().forecast.max_retries, 4);
    }

    #[test]
    fn test_config_path_generation() {
        let path = TenkiConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("tenki"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
