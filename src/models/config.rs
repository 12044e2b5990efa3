//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SourceConfig;

/// Environment variable overriding the first source's page URL.
pub const ENV_TARGET_URL: &str = "TARGET_URL";
/// Environment variable overriding the status server port.
pub const ENV_PORT: &str = "PORT";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Polling schedule and storage location
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Page fetch settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Webhook delivery settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Status endpoint settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Monitored sources, polled in this order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `TARGET_URL` and `PORT` from the environment.
    pub fn apply_env(&mut self) -> Result<()> {
        let target = std::env::var(ENV_TARGET_URL).ok();
        let port = std::env::var(ENV_PORT).ok();
        self.apply_overrides(target.as_deref(), port.as_deref())
    }

    fn apply_overrides(&mut self, target_url: Option<&str>, port: Option<&str>) -> Result<()> {
        if let Some(url) = target_url.map(str::trim).filter(|u| !u.is_empty()) {
            match self.sources.first_mut() {
                Some(source) => source.url = url.to_string(),
                None => {
                    return Err(AppError::config(format!(
                        "{ENV_TARGET_URL} is set but no source is configured to receive it"
                    )));
                }
            }
        }

        if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .map_err(|_| AppError::config(format!("{ENV_PORT} is not a valid port: {port}")))?;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_secs == 0 {
            return Err(AppError::validation("monitor.interval_secs must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.notify.timeout_secs == 0 {
            return Err(AppError::validation("notify.timeout_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut names = HashSet::new();
        let mut files = HashSet::new();
        for source in &self.sources {
            validate_source(source)?;
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate source name: {}",
                    source.name
                )));
            }
            if !files.insert(source.storage_file_name()) {
                return Err(AppError::validation(format!(
                    "Source {} shares its storage file with another source",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Polling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }
}

fn validate_source(source: &SourceConfig) -> Result<()> {
    if source.name.trim().is_empty() {
        return Err(AppError::validation(format!(
            "Source with url {} has no name",
            source.url
        )));
    }
    validate_http_url(&source.name, "url", &source.url)?;
    validate_http_url(&source.name, "webhook_url", &source.webhook_url)?;

    if let Some(file) = &source.storage_file {
        if file.trim().is_empty() || file.contains(['/', '\\']) {
            return Err(AppError::validation(format!(
                "Source {}: storage_file must be a plain file name",
                source.name
            )));
        }
    }

    for selector in source.extractor.selectors() {
        Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
    }
    Ok(())
}

fn validate_http_url(name: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("Source {name}: {field} is empty")));
    }
    let url = Url::parse(value)
        .map_err(|e| AppError::validation(format!("Source {name}: invalid {field} {value}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::validation(format!(
            "Source {name}: {field} must be http(s), got {}",
            url.scheme()
        )));
    }
    Ok(())
}

/// Polling schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between passes
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Directory holding one snapshot file per source
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            storage_dir: defaults::storage_dir(),
        }
    }
}

/// HTTP client settings for page fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Embed accent color for batch messages
    #[serde(default = "defaults::batch_color")]
    pub batch_color: u32,

    /// Embed accent color for per-record messages
    #[serde(default = "defaults::record_color")]
    pub record_color: u32,

    /// Re-posts allowed per message after a 429 before delivery fails
    #[serde(default = "defaults::rate_limit_retries")]
    pub rate_limit_retries: u32,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::timeout(),
            batch_color: defaults::batch_color(),
            record_color: defaults::record_color(),
            rate_limit_retries: defaults::rate_limit_retries(),
        }
    }
}

/// Status endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: defaults::port(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn interval() -> u64 {
        300
    }
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn batch_color() -> u32 {
        0x00ff00
    }
    pub fn record_color() -> u32 {
        0xcc0000
    }
    pub fn rate_limit_retries() -> u32 {
        5
    }
    pub fn port() -> u16 {
        4567
    }
}
