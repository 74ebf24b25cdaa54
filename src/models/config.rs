//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Page cache location and freshness window
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP and worker pool behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Remote endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
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

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_workers == 0 {
            return Err(AppError::validation("crawler.max_workers must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.crawler.retry_max_delay_ms < self.crawler.retry_base_delay_ms {
            return Err(AppError::validation(
                "crawler.retry_max_delay_ms must be >= crawler.retry_base_delay_ms",
            ));
        }
        if !self.sources.syllabus_url.contains("{dep}") {
            return Err(AppError::validation(
                "sources.syllabus_url must contain a {dep} placeholder",
            ));
        }
        if self.cache.dir.as_os_str().is_empty() {
            return Err(AppError::validation("cache.dir is empty"));
        }
        Ok(())
    }
}

/// Page cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding numbered content files and the index
    #[serde(default = "defaults::cache_dir")]
    pub dir: PathBuf,

    /// Entries older than this are treated as misses
    #[serde(default = "defaults::max_age_days")]
    pub max_age_days: u64,
}

impl CacheConfig {
    /// Freshness window as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 24 * 60 * 60)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: defaults::cache_dir(),
            max_age_days: defaults::max_age_days(),
        }
    }
}

/// HTTP client and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Upper bound of the worker pool (used for a completely cold cache)
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,

    /// Attempts per request before a connection failure becomes fatal
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// First retry delay in milliseconds; doubles on every further attempt
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Ceiling for the retry delay in milliseconds
    #[serde(default = "defaults::retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_workers: defaults::max_workers(),
            retry_attempts: defaults::retry_attempts(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            retry_max_delay_ms: defaults::retry_max_delay(),
        }
    }
}

/// Remote endpoints consumed by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Static page listing department codes in `<option>` values
    #[serde(default = "defaults::discovery_url")]
    pub discovery_url: String,

    /// Per-department schedule page; `{dep}` and `{year}` are substituted
    #[serde(default = "defaults::syllabus_url")]
    pub syllabus_url: String,

    /// Form endpoint queried with POST
    #[serde(default = "defaults::form_url")]
    pub form_url: String,

    /// Academic year, empty for the current one
    #[serde(default)]
    pub year: Option<String>,
}

impl SourcesConfig {
    /// Build the schedule page URL for one department code.
    pub fn syllabus_url_for(&self, dep: &str) -> String {
        self.syllabus_url
            .replace("{dep}", dep)
            .replace("{year}", self.year.as_deref().unwrap_or(""))
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            discovery_url: defaults::discovery_url(),
            syllabus_url: defaults::syllabus_url(),
            form_url: defaults::form_url(),
            year: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Log every processed page at info level
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: false,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Cache defaults
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("cache")
    }
    pub fn max_age_days() -> u64 {
        21
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/49.0.2623.87 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_workers() -> usize {
        32
    }
    pub fn retry_attempts() -> u32 {
        5
    }
    pub fn retry_base_delay() -> u64 {
        1000
    }
    pub fn retry_max_delay() -> u64 {
        30_000
    }

    // Source defaults
    pub fn discovery_url() -> String {
        "http://www20.tau.ac.il/yedion/yedion.html".into()
    }
    pub fn syllabus_url() -> String {
        "http://www2.tau.ac.il/yedion/syllabus/?deployment=10&dep={dep}&year={year}".into()
    }
    pub fn form_url() -> String {
        "http://yedion.tau.ac.il/yed/yednew.dll".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
