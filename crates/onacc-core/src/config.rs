use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_SEASONAL_URL: &str = "https://seasonal-api.open-meteo.com/v1/seasonal";
pub const DEFAULT_CLIMATE_URL: &str = "https://climate-api.open-meteo.com/v1/climate";

/// A config key that failed a check
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    /// Dotted key, e.g. `api.timeout_secs`
    pub key: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key, self.message)
    }
}

/// Issues found by `Config::validate`. Errors block a run, warnings are logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, key: &'static str, message: impl Into<String>) {
        let message = message.into();
        self.errors.push(ConfigIssue { key, message });
    }

    fn warn(&mut self, key: &'static str, message: impl Into<String>) {
        let message = message.into();
        self.warnings.push(ConfigIssue { key, message });
    }

    pub fn error_summary(&self) -> String {
        let issues: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        issues.join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote forecast service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Fan-out and retry settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Endpoint for daily forecasts (1-14 days)
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Endpoint for seasonal forecasts (45 days to 9 months)
    #[serde(default = "default_seasonal_url")]
    pub seasonal_url: String,

    /// Endpoint for climate projections
    #[serde(default = "default_climate_url")]
    pub climate_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_forecast_url() -> String {
    DEFAULT_FORECAST_URL.to_string()
}

fn default_seasonal_url() -> String {
    DEFAULT_SEASONAL_URL.to_string()
}

fn default_climate_url() -> String {
    DEFAULT_CLIMATE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("onacc/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            seasonal_url: default_seasonal_url(),
            climate_url: default_climate_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of localities fetched at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retry once when a request fails at the network level
    #[serde(default = "default_retry_network_errors")]
    pub retry_network_errors: bool,

    /// Delay before the retry, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_retry_network_errors() -> bool {
    true
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry_network_errors: default_retry_network_errors(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// File format used for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
    Xlsx,
}

impl ExportFormat {
    /// Field separator of the delimited-text formats; `None` for spreadsheets
    pub fn delimiter(self) -> Option<u8> {
        match self {
            ExportFormat::Csv => Some(b','),
            ExportFormat::Tsv => Some(b'\t'),
            ExportFormat::Xlsx => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(ConfigError::Invalid(format!(
                "unknown export format '{}' (expected csv, tsv or xlsx)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: ExportFormat,
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration (from `path` when given) and validate it.
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult), ConfigError> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.api.forecast_url, "api.forecast_url", &mut result);
        validate_url(&self.api.seasonal_url, "api.seasonal_url", &mut result);
        validate_url(&self.api.climate_url, "api.climate_url", &mut result);

        match self.api.timeout_secs {
            0 => result.error("api.timeout_secs", "must be greater than 0"),
            t if t > 300 => result.warn("api.timeout_secs", "is over 5 minutes"),
            _ => {}
        }
        if self.api.user_agent.trim().is_empty() {
            result.warn("api.user_agent", "is empty");
        }

        match self.pipeline.max_concurrency {
            0 => result.error("pipeline.max_concurrency", "must be greater than 0"),
            n if n > 64 => result.warn(
                "pipeline.max_concurrency",
                "is over 64; Open-Meteo may rate limit the run",
            ),
            _ => {}
        }
        if self.pipeline.retry_delay_ms > 60_000 {
            result.warn("pipeline.retry_delay_ms", "is over a minute");
        }

        result
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("user configuration directory".to_string()))?
            .join("onacc");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(raw: &str, key: &'static str, result: &mut ValidationResult) {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => return result.error(key, format!("is not a URL ({})", e)),
    };
    if !matches!(url.scheme(), "http" | "https") {
        result.error(key, format!("must use http or https, got {}", url.scheme()));
    }
    if url.host().is_none() {
        result.error(key, "has no host");
    }
}
