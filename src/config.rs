//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub amqp: AmqpConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    8
}

/// Shared store for sliding windows and cached alert pages.
///
/// An empty URL keeps both in process memory, which is only correct while a
/// single consumer process runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: String,
}

impl RedisConfig {
    pub fn enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    pub url: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Routing keys bound from the exchange to the queue
    #[serde(default = "default_bind_keys")]
    pub bind_keys: Vec<String>,
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
}

fn default_exchange() -> String {
    "api-security-logs".to_string()
}

fn default_queue() -> String {
    "secumon-access-logs".to_string()
}

fn default_bind_keys() -> Vec<String> {
    vec!["#".to_string()]
}

fn default_prefetch() -> u16 {
    32
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_brute_force")]
    pub brute_force: RuleConfig,
    #[serde(default = "default_high_traffic")]
    pub high_traffic: RuleConfig,
    /// Deadline for one delivery's detector fan-out
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            brute_force: default_brute_force(),
            high_traffic: default_high_traffic(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
        }
    }
}

impl DetectionConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// Threshold for one sliding-window detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    pub limit: u32,
    pub window_secs: u64,
}

impl RuleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_brute_force() -> RuleConfig {
    RuleConfig { limit: 5, window_secs: 60 }
}

fn default_high_traffic() -> RuleConfig {
    RuleConfig { limit: 10, window_secs: 60 }
}

fn default_dispatch_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Page size kept in the cache; only smaller queries read through it
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Limit used when a query names none
    #[serde(default = "default_page_size")]
    pub default_limit: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Timeout of detached cache writes and invalidations
    #[serde(default = "default_side_effect_timeout_ms")]
    pub side_effect_timeout_ms: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            default_limit: default_page_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            side_effect_timeout_ms: default_side_effect_timeout_ms(),
        }
    }
}

impl AlertsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effect_timeout_ms)
    }
}

fn default_page_size() -> usize {
    10
}

fn default_cache_ttl_secs() -> u64 {
    15 * 60
}

fn default_side_effect_timeout_ms() -> u64 {
    1000
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";

        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(
                config::Environment::with_prefix("SECUMON")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("amqp.bind_keys")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.http_port == 0 {
            anyhow::bail!("Invalid http_port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        if self.amqp.url.is_empty() {
            anyhow::bail!("AMQP URL cannot be empty");
        }
        if self.amqp.exchange.is_empty() || self.amqp.queue.is_empty() {
            anyhow::bail!("AMQP exchange and queue names cannot be empty");
        }
        if self.amqp.bind_keys.is_empty() {
            anyhow::bail!("At least one AMQP bind key is required");
        }

        for (name, rule) in [
            ("brute_force", &self.detection.brute_force),
            ("high_traffic", &self.detection.high_traffic),
        ] {
            if rule.limit == 0 || rule.window_secs == 0 {
                anyhow::bail!("detection.{}: limit and window_secs must be positive", name);
            }
        }
        if self.detection.dispatch_timeout_ms == 0 {
            anyhow::bail!("detection.dispatch_timeout_ms must be positive");
        }

        if self.alerts.page_size == 0 || self.alerts.default_limit == 0 {
            anyhow::bail!("alerts.page_size and alerts.default_limit must be positive");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid logging level '{}'. Must be one of: {:?}", self.logging.level, valid_levels);
        }

        Ok(())
    }
}
