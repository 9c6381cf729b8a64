//! Configuration infrastructure
//!
//! Settings are resolved in three layers:
//! 1. Built-in defaults (`HarvesterConfig::default()`, seeded key by key)
//! 2. An optional config file (TOML / JSON / YAML, picked by extension)
//! 3. Environment overrides, `HARVESTER__SECTION__KEY=value`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::retry::BackoffPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete harvester configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Fixed URL topology of the remote site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme + host prefixed to relative links
    pub origin: String,
    /// Search listing URL without the page parameter
    pub listing_url: String,
    /// Path segment identifying a contract detail page
    pub detail_segment: String,
    pub documents_segment: String,
    pub announcements_segment: String,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub keep_alive: bool,
    pub timeout_seconds: u64,
    /// Idle connections kept per host; `None` leaves the reqwest default
    pub pool_idle_per_host: Option<usize>,
}

/// Retry budgets for the two retry layers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Transport failures (connection reset, timeout, DNS)
    pub transport: BackoffPolicy,
    /// Pages that rendered without the expected element
    pub page: BackoffPolicy,
}

/// Task issuance pacing for the stage runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between issuing two tasks of a stage
    pub issue_delay_ms: u64,
    /// Pause before a stage issues its first task
    pub warmup_delay_ms: u64,
    /// Log a progress milestone every N completed items
    pub progress_every: usize,
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub snapshot_path: PathBuf,
    pub table_path: PathBuf,
    /// Dump `<snapshot>.<stage>.json` after every stage
    pub write_stage_snapshots: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the log file: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// Level for console output
    pub console_level: String,
    /// Enable JSON formatted file logs
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Log file, truncated on every run
    pub file_path: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: defaults::SITE_ORIGIN.to_string(),
            listing_url: defaults::LISTING_URL.to_string(),
            detail_segment: defaults::DETAIL_SEGMENT.to_string(),
            documents_segment: defaults::DOCUMENTS_SEGMENT.to_string(),
            announcements_segment: defaults::ANNOUNCEMENTS_SEGMENT.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            keep_alive: true,
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            pool_idle_per_host: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transport: BackoffPolicy::transport(),
            page: BackoffPolicy::page(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            issue_delay_ms: defaults::ISSUE_DELAY_MS,
            warmup_delay_ms: defaults::WARMUP_DELAY_MS,
            progress_every: defaults::PROGRESS_EVERY,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(defaults::SNAPSHOT_PATH),
            table_path: PathBuf::from(defaults::TABLE_PATH),
            write_stage_snapshots: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_level: defaults::LOG_CONSOLE_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            file_path: PathBuf::from(defaults::LOG_FILE_PATH),
        }
    }
}

impl PacingConfig {
    pub fn issue_delay(&self) -> Duration {
        Duration::from_millis(self.issue_delay_ms)
    }

    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }

    /// No pacing at all; tests and snapshot replays.
    pub fn immediate() -> Self {
        Self {
            issue_delay_ms: 0,
            warmup_delay_ms: 0,
            progress_every: defaults::PROGRESS_EVERY,
        }
    }
}

impl HarvesterConfig {
    /// Load from an optional file plus `HARVESTER__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Every key starts at its default; a partial table overrides only what it names
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.listing_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "site.listing_url must not be empty".to_string(),
            });
        }
        if self.site.origin.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "site.origin must not be empty".to_string(),
            });
        }
        for (name, policy) in [("transport", &self.retry.transport), ("page", &self.retry.page)] {
            if policy.max_attempts == 0 {
                return Err(ConfigError::Validation {
                    message: format!("retry.{name}.max_attempts must be greater than 0"),
                });
            }
        }
        if self.pacing.progress_every == 0 {
            return Err(ConfigError::Validation {
                message: "pacing.progress_every must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const ENV_PREFIX: &str = "HARVESTER";

    pub const SITE_ORIGIN: &str = "https://www.uvo.gov.sk";
    pub const LISTING_URL: &str =
        "https://www.uvo.gov.sk/vyhladavanie/vyhladavanie-zakaziek?cpv=48000000-8+72000000-5+73000000-2";
    pub const DETAIL_SEGMENT: &str = "/detail/";
    pub const DOCUMENTS_SEGMENT: &str = "/dokumenty/";
    pub const ANNOUNCEMENTS_SEGMENT: &str = "/oznamenia/";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Transport retries are effectively unbounded; the site resets connections often
    pub const TRANSPORT_MAX_ATTEMPTS: u32 = 100;
    pub const PAGE_MAX_ATTEMPTS: u32 = 10;
    pub const BACKOFF_BASE_DELAY_MS: u64 = 3000;
    pub const BACKOFF_STEP_DELAY_MS: u64 = 1000;
    pub const MAX_BACKOFF_DELAY_MS: u64 = 120_000;

    /// Lower values get the client blocked
    pub const ISSUE_DELAY_MS: u64 = 100;
    pub const WARMUP_DELAY_MS: u64 = 5000;
    pub const PROGRESS_EVERY: usize = 100;

    pub const SNAPSHOT_PATH: &str = "contracts.json";
    pub const TABLE_PATH: &str = "contracts.tsv";

    pub const LOG_LEVEL: &str = "debug";
    pub const LOG_CONSOLE_LEVEL: &str = "info";
    pub const LOG_FILE_PATH: &str = "harvester.log";
}
