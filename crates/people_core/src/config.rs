//! Runtime configuration read from environment variables.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - Set but unusable values are errors, never silently replaced.

use crate::enrich::{EnrichmentEndpoints, DEFAULT_LOOKUP_TIMEOUT};
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "PEOPLE_DB_PATH";
pub const ENV_AGE_URL: &str = "PEOPLE_AGE_URL";
pub const ENV_GENDER_URL: &str = "PEOPLE_GENDER_URL";
pub const ENV_NATIONALITY_URL: &str = "PEOPLE_NATIONALITY_URL";
pub const ENV_HTTP_TIMEOUT_MS: &str = "PEOPLE_HTTP_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "PEOPLE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PEOPLE_LOG_DIR";

const DEFAULT_DB_PATH: &str = "people.sqlite3";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl ConfigError {
    fn new(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.key, self.message)
    }
}

impl Error for ConfigError {}

/// Settings needed to wire storage, enrichment and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub endpoints: EnrichmentEndpoints,
    pub http_timeout: Duration,
    pub log_level: String,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            endpoints: EnrichmentEndpoints::default(),
            http_timeout: DEFAULT_LOOKUP_TIMEOUT,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = value(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(url) = value(ENV_AGE_URL) {
            config.endpoints.age_url = parse_url(ENV_AGE_URL, url)?;
        }
        if let Some(url) = value(ENV_GENDER_URL) {
            config.endpoints.gender_url = parse_url(ENV_GENDER_URL, url)?;
        }
        if let Some(url) = value(ENV_NATIONALITY_URL) {
            config.endpoints.nationality_url = parse_url(ENV_NATIONALITY_URL, url)?;
        }
        if let Some(raw) = value(ENV_HTTP_TIMEOUT_MS) {
            config.http_timeout = parse_timeout(&raw)?;
        }
        if let Some(level) = value(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = value(ENV_LOG_DIR) {
            if !Path::new(&dir).is_absolute() {
                return Err(ConfigError::new(
                    ENV_LOG_DIR,
                    format!("`{dir}` is not an absolute path"),
                ));
            }
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

fn parse_url(key: &'static str, url: String) -> Result<String, ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(ConfigError::new(
            key,
            format!("`{url}` must start with http:// or https://"),
        ))
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::new(ENV_HTTP_TIMEOUT_MS, "must be greater than zero")),
        Ok(millis) => Ok(Duration::from_millis(millis)),
        Err(_) => Err(ConfigError::new(
            ENV_HTTP_TIMEOUT_MS,
            format!("`{raw}` is not a whole number of milliseconds"),
        )),
    }
}
