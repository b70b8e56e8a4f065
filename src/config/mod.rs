//! Configuration management for the prospector crawler
//!
//! Configuration is loaded from a TOML file or from `PROSPECTOR_*` environment
//! variables. Every section has defaults, so a file only needs to name the
//! values it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler tick configuration
    pub scheduler: SchedulerConfig,

    /// Crawl loop configuration
    pub crawl: CrawlConfig,

    /// Redis configuration (lock backend, enrichment queue)
    pub redis: RedisConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Enrichment handoff configuration
    pub enrichment: EnrichmentConfig,

    /// Browser session configuration
    pub browser: BrowserConfig,

    /// Metrics endpoint configuration
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum campaigns processed per tick
    pub batch_size: usize,

    /// Cluster lock key (namespaced by the Redis key prefix)
    pub lock_key: String,

    /// Lock TTL in seconds; fail-safe for runs that never release
    pub lock_ttl_secs: u64,

    /// Interval between ticks in `serve` mode, in seconds
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            lock_key: "scheduler:run".to_string(),
            lock_ttl_secs: 7200,
            interval_secs: 86_400,
        }
    }
}

/// Crawl loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Search page URL; the query is appended as the `keywords` parameter
    pub search_url: String,

    /// Hard cap on pages visited per campaign run
    pub page_cap: u32,

    /// Scroll increments per page
    pub scroll_steps: u32,

    /// Pixels per scroll increment
    pub scroll_px: u32,

    /// Settling delay after scrolling, lower bound (ms)
    pub settle_delay_min_ms: u64,

    /// Settling delay after scrolling, upper bound (ms)
    pub settle_delay_max_ms: u64,

    /// Delay between UI actions, lower bound (ms)
    pub action_delay_min_ms: u64,

    /// Delay between UI actions, upper bound (ms)
    pub action_delay_max_ms: u64,

    /// Timeout for element waits (ms)
    pub element_timeout_ms: u64,

    /// Path segment preceding the profile identifier in result links
    pub profile_path_segment: String,

    /// Page selectors
    pub selectors: SelectorConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.example.com/search/results/people/".to_string(),
            page_cap: 100,
            scroll_steps: 5,
            scroll_px: 600,
            settle_delay_min_ms: 1500,
            settle_delay_max_ms: 3500,
            action_delay_min_ms: 400,
            action_delay_max_ms: 1200,
            element_timeout_ms: 10_000,
            profile_path_segment: "in".to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Element wait timeout as Duration
    #[must_use]
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

/// CSS selectors used by the page adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// One search result entry
    pub result_entry: String,

    /// Profile link inside a result entry
    pub result_link: String,

    /// Approximate result count indicator
    pub total_results: String,

    /// "Next page" control
    pub next_button: String,

    /// Button that opens the filter panel
    pub filter_panel_button: String,

    /// Company filter input
    pub company_input: String,

    /// Past company filter input
    pub past_company_input: String,

    /// School filter input
    pub school_input: String,

    /// First typeahead suggestion after typing into a filter input
    pub filter_suggestion: String,

    /// Button that applies the filter panel
    pub filter_apply_button: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            result_entry: "ul.search-results > li.search-result".to_string(),
            result_link: "a.search-result__profile-link".to_string(),
            total_results: ".search-results__total".to_string(),
            next_button: "button.pagination__next".to_string(),
            filter_panel_button: "button.search-filters__all".to_string(),
            company_input: "input[data-filter='currentCompany']".to_string(),
            past_company_input: "input[data-filter='pastCompany']".to_string(),
            school_input: "input[data-filter='school']".to_string(),
            filter_suggestion: ".search-filters__typeahead li:first-child".to_string(),
            filter_apply_button: "button.search-filters__apply".to_string(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,

    /// Connection pool size
    pub pool_size: usize,

    /// Key prefix for namespacing
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 4,
            key_prefix: "prospector".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,

    /// Maximum pool size
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost/prospector".to_string(),
            pool_size: 5,
        }
    }
}

/// Enrichment handoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Whether to enqueue enrichment requests at all
    pub enabled: bool,

    /// Redis list the requests are pushed onto
    pub queue_key: String,

    /// Batch size handed to the enrichment stage
    pub max_batch_size: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_key: "enrichment:requests".to_string(),
            max_batch_size: 25,
        }
    }
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// DevTools websocket URL of the authenticated browser
    pub devtools_url: String,

    /// Navigation timeout (ms)
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            devtools_url: "ws://127.0.0.1:9222/devtools/browser".to_string(),
            navigation_timeout_ms: 30_000,
        }
    }
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` and `/health` in `serve` mode
    pub enabled: bool,

    /// Bind address for the metrics endpoint
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9187".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let scheduler = SchedulerConfig {
            batch_size: env_parse("PROSPECTOR_BATCH_SIZE", defaults.scheduler.batch_size),
            lock_key: env_string("PROSPECTOR_LOCK_KEY", defaults.scheduler.lock_key),
            lock_ttl_secs: env_parse("PROSPECTOR_LOCK_TTL", defaults.scheduler.lock_ttl_secs),
            interval_secs: env_parse("PROSPECTOR_INTERVAL", defaults.scheduler.interval_secs),
        };

        let crawl = CrawlConfig {
            search_url: env_string("PROSPECTOR_SEARCH_URL", defaults.crawl.search_url),
            page_cap: env_parse("PROSPECTOR_PAGE_CAP", defaults.crawl.page_cap),
            element_timeout_ms: env_parse(
                "PROSPECTOR_ELEMENT_TIMEOUT_MS",
                defaults.crawl.element_timeout_ms,
            ),
            ..defaults.crawl
        };

        let redis = RedisConfig {
            url: env_string("REDIS_URL", defaults.redis.url),
            pool_size: env_parse("REDIS_POOL_SIZE", defaults.redis.pool_size),
            key_prefix: env_string("PROSPECTOR_KEY_PREFIX", defaults.redis.key_prefix),
        };

        let postgres_url = std::env::var("POSTGRES_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or(defaults.database.postgres_url);

        let database = DatabaseConfig {
            postgres_url,
            pool_size: env_parse("DB_POOL_SIZE", defaults.database.pool_size),
        };

        let enrichment = EnrichmentConfig {
            enabled: env_parse("PROSPECTOR_ENRICHMENT_ENABLED", defaults.enrichment.enabled),
            queue_key: env_string("PROSPECTOR_ENRICHMENT_QUEUE", defaults.enrichment.queue_key),
            max_batch_size: env_parse(
                "PROSPECTOR_ENRICHMENT_BATCH",
                defaults.enrichment.max_batch_size,
            ),
        };

        let browser = BrowserConfig {
            devtools_url: env_string("PROSPECTOR_DEVTOOLS_URL", defaults.browser.devtools_url),
            ..defaults.browser
        };

        let metrics = MetricsConfig {
            enabled: env_parse("PROSPECTOR_METRICS_ENABLED", defaults.metrics.enabled),
            bind_address: env_string("PROSPECTOR_METRICS_BIND", defaults.metrics.bind_address),
        };

        let logging = LoggingConfig {
            level: env_string("PROSPECTOR_LOG_LEVEL", defaults.logging.level),
            format: env_string("PROSPECTOR_LOG_FORMAT", defaults.logging.format),
        };

        Ok(Self {
            scheduler,
            crawl,
            redis,
            database,
            enrichment,
            browser,
            metrics,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.batch_size == 0 {
            anyhow::bail!("scheduler.batch_size must be greater than 0");
        }

        if self.scheduler.lock_ttl_secs == 0 {
            anyhow::bail!("scheduler.lock_ttl_secs must be greater than 0");
        }

        if self.scheduler.interval_secs == 0 {
            anyhow::bail!("scheduler.interval_secs must be greater than 0");
        }

        if self.crawl.page_cap == 0 {
            anyhow::bail!("crawl.page_cap must be greater than 0");
        }

        if self.crawl.settle_delay_min_ms > self.crawl.settle_delay_max_ms {
            anyhow::bail!("crawl.settle_delay_min_ms must not exceed settle_delay_max_ms");
        }

        if self.crawl.action_delay_min_ms > self.crawl.action_delay_max_ms {
            anyhow::bail!("crawl.action_delay_min_ms must not exceed action_delay_max_ms");
        }

        url::Url::parse(&self.crawl.search_url).context("crawl.search_url is not a valid URL")?;

        if self.crawl.profile_path_segment.trim().is_empty() {
            anyhow::bail!("crawl.profile_path_segment must not be empty");
        }

        if self.database.pool_size == 0 || self.redis.pool_size == 0 {
            anyhow::bail!("pool_size must be greater than 0");
        }

        if self.enrichment.max_batch_size == 0 {
            anyhow::bail!("enrichment.max_batch_size must be greater than 0");
        }

        Ok(())
    }
}
