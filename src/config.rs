//! Configuration management for Wende
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{Result, WendeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "WENDE_CONFIG";

/// Environment variable carrying the ENTSO-E security token
pub const ENTSOE_API_KEY_ENV: &str = "ENTSOE_API_KEY";

/// Upper bound for `aggregation.staleness_horizon_days`
pub const MAX_STALENESS_HORIZON_DAYS: i64 = 366;

/// Upper bound for `cache.today_ttl_secs` (one week)
pub const MAX_TODAY_TTL_SECS: i64 = 7 * 24 * 3600;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timezone that decides the calendar year and "today"
    pub timezone: String,

    /// Seconds between background dashboard refreshes
    pub refresh_interval_secs: u64,

    /// Upstream data sources
    pub sources: SourcesConfig,

    /// Incremental yearly aggregation
    pub aggregation: AggregationConfig,

    /// Cache lifetimes
    pub cache: CacheConfig,

    /// Fallback reference values used for comparisons
    pub baseline: BaselineConfig,

    /// Expansion target the trend is measured against
    pub target: TargetConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Shared HTTP behaviour plus one block per upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Upper bound for a single upstream fetch
    pub fetch_timeout_secs: u64,

    /// Attempts per request on timeout or connection failure
    pub retry_attempts: u32,

    /// Delay between attempts
    pub retry_delay_ms: u64,

    pub entsoe: EntsoeConfig,
    pub smard: SmardConfig,
    pub open_meteo: OpenMeteoConfig,
}

/// ENTSO-E transparency platform (generation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntsoeConfig {
    pub base_url: String,

    /// Security token; `ENTSOE_API_KEY` overrides this
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// EIC bidding zone code
    pub domain: String,

    /// Production types counted as renewable
    pub psr_types: Vec<String>,
}

/// SMARD (consumption)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmardConfig {
    pub base_url: String,

    /// SMARD filter id; 410 is total grid load
    pub filter: u32,

    pub region: String,

    /// Block resolution name used in SMARD paths
    pub resolution: String,
}

/// Open-Meteo (weather)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoConfig {
    pub base_url: String,

    /// Reference points averaged into a national value
    pub locations: Vec<LocationConfig>,
}

/// A named coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Incremental aggregation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Data older than this is treated as final
    pub staleness_horizon_days: i64,

    /// Yearly averages below this are rejected as incomplete data
    pub min_plausible_share: f64,
}

/// Cache lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of today's share
    pub today_ttl_secs: i64,
}

/// Long-term reference values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Used when no yearly average is available
    pub renewable_share: f64,
    pub sun_hours: f64,
    pub wind_speed_kmh: f64,
}

/// Renewable share target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub share: f64,
    pub year: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Log directory or file path; rotated files are named `wende.<date>.log`
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,

    /// Optional per-output overrides of `level`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_level: Option<String>,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `$WENDE_CONFIG` or the default locations,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(&path)?,
            _ => Self::from_default_paths()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_default_paths() -> Result<Self> {
        let default_paths = ["wende_config.yaml", "/etc/wende/config.yaml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Secrets are taken from the environment when present
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENTSOE_API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.sources.entsoe.api_key = key.trim().to_string();
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parsed display timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| WendeError::validation("timezone", "Unknown IANA timezone"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tz()?;

        if self.refresh_interval_secs == 0 {
            return Err(WendeError::validation(
                "refresh_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.sources.fetch_timeout_secs == 0 {
            return Err(WendeError::validation(
                "sources.fetch_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.sources.retry_attempts == 0 {
            return Err(WendeError::validation(
                "sources.retry_attempts",
                "At least one attempt is required",
            ));
        }

        for (field, url) in [
            ("sources.entsoe.base_url", &self.sources.entsoe.base_url),
            ("sources.smard.base_url", &self.sources.smard.base_url),
            ("sources.open_meteo.base_url", &self.sources.open_meteo.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WendeError::validation(field, "Must be an http(s) URL"));
            }
        }

        if self.sources.entsoe.psr_types.is_empty() {
            return Err(WendeError::validation(
                "sources.entsoe.psr_types",
                "At least one production type is required",
            ));
        }

        if self.sources.open_meteo.locations.is_empty() {
            return Err(WendeError::validation(
                "sources.open_meteo.locations",
                "At least one location is required",
            ));
        }

        for loc in &self.sources.open_meteo.locations {
            if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude)
            {
                return Err(WendeError::validation(
                    "sources.open_meteo.locations",
                    "Coordinates out of range",
                ));
            }
        }

        if !(1..=MAX_STALENESS_HORIZON_DAYS).contains(&self.aggregation.staleness_horizon_days) {
            return Err(WendeError::validation(
                "aggregation.staleness_horizon_days",
                "Must be between 1 and 366 days",
            ));
        }

        if !(0.0..1.0).contains(&self.aggregation.min_plausible_share) {
            return Err(WendeError::validation(
                "aggregation.min_plausible_share",
                "Must be within [0, 1)",
            ));
        }

        if !(1..=MAX_TODAY_TTL_SECS).contains(&self.cache.today_ttl_secs) {
            return Err(WendeError::validation(
                "cache.today_ttl_secs",
                "Must be between 1 second and one week",
            ));
        }

        for (field, share) in [
            ("baseline.renewable_share", self.baseline.renewable_share),
            ("target.share", self.target.share),
        ] {
            if !(0.0..=1.0).contains(&share) {
                return Err(WendeError::validation(field, "Must be within [0, 1]"));
            }
        }

        if self.web.port == 0 {
            return Err(WendeError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        Ok(())
    }
}
