//! Configuration management for reviewscrape.
//!
//! Settings come from defaults, then a config file (TOML, YAML, or JSON),
//! then `REVIEWSCRAPE_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scrapers::requester::{
    RequesterConfig, DEFAULT_BACKOFF_OFFSET, DEFAULT_MAX_INTERVAL, DEFAULT_MAX_RETRIES,
    DEFAULT_RATE_LIMIT, DEFAULT_RETRY_STATUSES, DEFAULT_TIMEOUT, USER_AGENT,
};
use crate::scrapers::reviews::DEFAULT_REVIEWS_URL;

/// Config filename looked up in the working directory.
pub const CONFIG_FILENAME: &str = "reviewscrape.toml";

/// Default output filename.
const OUTPUT_FILENAME: &str = "reviews.jsonl";

/// Effective application settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Maximum requests per minute.
    pub rate_limit: u32,
    /// Attempts per request.
    pub max_retries: u32,
    /// Per-attempt timeout in seconds.
    pub request_timeout: u64,
    /// Statuses retried in addition to 429.
    pub retry_statuses: Vec<u16>,
    /// Additive backoff kick-off in seconds.
    pub backoff_offset: f64,
    /// Backoff ceiling in seconds.
    pub max_interval: u64,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Review endpoint base URL.
    pub reviews_url: String,
    /// JSON-lines file reviews are appended to.
    pub output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reviewscrape");

        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_TIMEOUT.as_secs(),
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            backoff_offset: DEFAULT_BACKOFF_OFFSET,
            max_interval: DEFAULT_MAX_INTERVAL.as_secs(),
            user_agent: USER_AGENT.to_string(),
            reviews_url: DEFAULT_REVIEWS_URL.to_string(),
            output: data_dir.join(OUTPUT_FILENAME),
        }
    }
}

impl Settings {
    /// Requester options derived from these settings.
    pub fn requester_config(&self) -> RequesterConfig {
        RequesterConfig {
            rate_limit: self.rate_limit,
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.request_timeout),
            retry_statuses: self.retry_statuses.clone(),
            backoff_offset: self.backoff_offset,
            max_interval: Duration::from_secs(self.max_interval),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Apply `REVIEWSCRAPE_*` overrides from a variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rate_limit) = parse_env(&lookup, "REVIEWSCRAPE_RATE_LIMIT") {
            self.rate_limit = rate_limit;
        }
        if let Some(max_retries) = parse_env(&lookup, "REVIEWSCRAPE_MAX_RETRIES") {
            self.max_retries = max_retries;
        }
        if let Some(timeout) = parse_env(&lookup, "REVIEWSCRAPE_TIMEOUT") {
            self.request_timeout = timeout;
        }
        if let Some(output) = lookup("REVIEWSCRAPE_OUTPUT").filter(|s| !s.is_empty()) {
            tracing::debug!("Using REVIEWSCRAPE_OUTPUT from environment: {}", output);
            self.output = PathBuf::from(shellexpand::tilde(&output).as_ref());
        }
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).filter(|s| !s.is_empty())?;
    match raw.trim().parse() {
        Ok(value) => {
            tracing::debug!("Using {} from environment: {}", key, raw);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse '{}'", key, raw);
            None
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Per-attempt timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_statuses: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_offset: Option<f64>,
    /// Backoff ceiling in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_url: Option<String>,
    /// Output path, relative to the config file unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// The format is picked from the extension, defaulting to TOML.
    pub async fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse YAML config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Overlay the values present in this file onto `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(rate_limit) = self.rate_limit {
            settings.rate_limit = rate_limit;
        }
        if let Some(max_retries) = self.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref statuses) = self.retry_statuses {
            settings.retry_statuses = statuses.clone();
        }
        if let Some(offset) = self.backoff_offset {
            settings.backoff_offset = offset;
        }
        if let Some(max_interval) = self.max_interval {
            settings.max_interval = max_interval;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(ref url) = self.reviews_url {
            settings.reviews_url = url.clone();
        }
        if let Some(ref output) = self.output {
            settings.output = self.resolve_path(output, base_dir);
        }
    }
}

/// Options controlling where configuration is loaded from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (from `--config`).
    pub config_path: Option<PathBuf>,
}

/// Find a config file when none was given explicitly.
fn discover_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("reviewscrape").join("config.toml"))
        .filter(|p| p.is_file())
}

/// Load settings: defaults, then config file, then environment.
/// Returns (Settings, Config) tuple.
pub async fn load_settings(options: &LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let config_path = options.config_path.clone().or_else(discover_config_path);

    let config = match config_path {
        Some(ref path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(path).await?
        }
        None => Config::default(),
    };

    let base_dir = config
        .base_dir()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env_overrides(|key| std::env::var(key).ok());

    Ok((settings, config))
}
