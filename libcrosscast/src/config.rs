//! Configuration management for Crosscast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::retry::BackoffPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// File containing the passphrase used to encrypt tokens at rest.
    pub passphrase_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2.0,
            timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_retries,
            self.backoff_factor,
            Duration::from_secs(self.timeout_secs),
        )
    }
}

/// Platform API base URLs. Overridable so tests can point clients at a local
/// mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub twitter_base_url: String,
    pub linkedin_base_url: String,
    pub meta_base_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            twitter_base_url: "https://api.twitter.com".to_string(),
            linkedin_base_url: "https://api.linkedin.com".to_string(),
            meta_base_url: "https://graph.facebook.com/v18.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Daemon poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Pending posts due within this window are queued by the sweep.
    pub queue_window_secs: i64,
    /// Pending posts more than this far past due are left for expiry.
    pub grace_secs: i64,
    /// Pending/queued posts this many days past due are expired.
    pub expiry_days: i64,
    /// Failed executions are re-enqueued until retry_count reaches this.
    pub max_publish_retries: i64,
    /// Instagram container processing delay between create and publish.
    pub instagram_container_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            queue_window_secs: 60,
            grace_secs: 300,
            expiry_days: 7,
            max_publish_retries: 3,
            instagram_container_delay_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Platforms considered when a command is given no explicit filter.
    pub platforms: Vec<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/crosscast/crosscast.db".to_string(),
            },
            credentials: CredentialsConfig {
                passphrase_file: "~/.config/crosscast/passphrase".to_string(),
            },
            http: HttpConfig::default(),
            endpoints: EndpointsConfig::default(),
            scheduler: SchedulerConfig::default(),
            defaults: DefaultsConfig {
                platforms: vec![
                    "linkedin".to_string(),
                    "twitter".to_string(),
                    "meta".to_string(),
                ],
            },
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("crosscast"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default_config();
        assert!(config.database.path.ends_with("crosscast.db"));
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.scheduler.expiry_days, 7);
        assert_eq!(config.endpoints.twitter_base_url, "https://api.twitter.com");
        assert_eq!(config.defaults.platforms.len(), 3);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
            [database]
            path = "/tmp/test.db"

            [credentials]
            passphrase_file = "/tmp/passphrase"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.path, "/tmp/test.db");
        // omitted sections fall back to defaults
        assert_eq!(config.http.backoff_factor, 2.0);
        assert_eq!(config.scheduler.max_publish_retries, 3);
        assert_eq!(
            config.endpoints.meta_base_url,
            "https://graph.facebook.com/v18.0"
        );
    }

    #[test]
    fn test_parse_endpoint_overrides() {
        let toml_str = r#"
            [database]
            path = "/tmp/test.db"

            [credentials]
            passphrase_file = "/tmp/passphrase"

            [endpoints]
            twitter_base_url = "http://127.0.0.1:9999"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoints.twitter_base_url, "http://127.0.0.1:9999");
        // untouched endpoints keep their defaults
        assert_eq!(
            config.endpoints.linkedin_base_url,
            "https://api.linkedin.com"
        );
    }

    #[test]
    fn test_backoff_policy_from_http_config() {
        let http = HttpConfig {
            max_retries: 5,
            backoff_factor: 1.5,
            timeout_secs: 10,
        };
        let policy = http.backoff_policy();
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result: std::result::Result<Config, _> = toml::from_str("not valid [ toml");
        assert!(result.is_err());
    }
}
