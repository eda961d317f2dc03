//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/wpmirror/config.toml)
//! 3. Environment variables (WPMIRROR_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "WPMIRROR";

/// Largest page size the WordPress REST API accepts
pub const MAX_PER_PAGE: u32 = 100;

/// Most pages one round may plan
pub const MAX_PAGES_PER_ROUND: u32 = 1000;

/// Upper bound for the fetch worker pool
const MAX_WORKERS: usize = 32;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Posts endpoint of the remote WordPress REST API
    pub remote_url: String,

    /// Basic auth user
    pub username: String,

    /// Basic auth password (may be empty)
    pub password: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Posts per page requested from the remote (1..=100)
    pub per_page: u32,

    /// Maximum number of page fetches dispatched in one round
    pub max_pages_per_round: u32,

    /// Concurrent fetches per round
    pub workers: usize,

    /// Sleep between rounds once the mirror has caught up
    pub update_period_secs: u64,

    /// Sleep between rounds while still catching up
    pub retry_delay_ms: u64,

    /// Timeout for a single remote request
    pub request_timeout_secs: u64,

    /// Address the WebSocket server binds to
    pub bind_addr: String,

    /// Disconnect clients silent for this long
    pub client_idle_timeout_secs: u64,

    /// Default tracing filter when RUST_LOG is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_url: "https://www.thekey.academy/wp-json/wp/v2/posts".to_string(),
            username: "guest".to_string(),
            password: String::new(),
            user_agent: "Custom".to_string(),
            per_page: 3,
            max_pages_per_round: 16,
            workers: default_workers(),
            update_period_secs: 10,
            retry_delay_ms: 100,
            request_timeout_secs: 30,
            bind_addr: "127.0.0.1:8000".to_string(),
            client_idle_timeout_secs: 600,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (WPMIRROR_REMOTE_URL, WPMIRROR_PER_PAGE, ...)
    /// 2. Config file (~/.config/wpmirror/config.toml or WPMIRROR_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_string("REMOTE_URL") {
            self.remote_url = val;
        }
        if let Some(val) = env_string("USERNAME") {
            self.username = val;
        }
        if let Some(val) = env_string("PASSWORD") {
            self.password = val;
        }
        if let Some(val) = env_parse("PER_PAGE") {
            self.per_page = val;
        }
        if let Some(val) = env_parse("MAX_PAGES_PER_ROUND") {
            self.max_pages_per_round = val;
        }
        if let Some(val) = env_parse("WORKERS") {
            self.workers = val;
        }
        if let Some(val) = env_string("USER_AGENT") {
            self.user_agent = val;
        }
        if let Some(val) = env_parse("UPDATE_PERIOD_SECS") {
            self.update_period_secs = val;
        }
        if let Some(val) = env_parse("RETRY_DELAY_MS") {
            self.retry_delay_ms = val;
        }
        if let Some(val) = env_parse("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = val;
        }
        if let Some(val) = env_string("BIND_ADDR") {
            self.bind_addr = val;
        }
        if let Some(val) = env_parse("CLIENT_IDLE_TIMEOUT_SECS") {
            self.client_idle_timeout_secs = val;
        }
        if let Some(val) = env_string("LOG_LEVEL") {
            self.log_level = val;
        }
    }

    /// Reject values the sync engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.remote_url.trim().is_empty() {
            bail!("remote_url must not be empty");
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            bail!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE,
                self.per_page
            );
        }
        if self.max_pages_per_round == 0 || self.max_pages_per_round > MAX_PAGES_PER_ROUND {
            bail!(
                "max_pages_per_round must be between 1 and {}, got {}",
                MAX_PAGES_PER_ROUND,
                self.max_pages_per_round
            );
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            bail!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS,
                self.workers
            );
        }
        if self.client_idle_timeout_secs == 0 {
            bail!("client_idle_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with WPMIRROR_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wpmirror")
            .join("config.toml")
    }

    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_period_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn client_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.client_idle_timeout_secs)
    }
}

/// Default fetch worker count: 4 + logical CPUs, capped
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(MAX_WORKERS)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}_{}={:?}: not a valid value", ENV_PREFIX, name, raw);
            None
        }
    }
}
