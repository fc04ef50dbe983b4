//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Posting engine configuration.
    #[serde(default)]
    pub posting: PostingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Posting engine configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PostingConfig {
    /// Account code of the inventory asset account used for cost journals.
    #[serde(default = "default_inventory_account_code")]
    pub inventory_account_code: String,
    /// Account code of the cost-of-goods-sold account used for cost journals.
    #[serde(default = "default_cogs_account_code")]
    pub cogs_account_code: String,
    /// Prefix prepended to line descriptions of reversal entries.
    #[serde(default = "default_reversal_line_prefix")]
    pub reversal_line_prefix: String,
}

fn default_inventory_account_code() -> String {
    "1300".to_string()
}

fn default_cogs_account_code() -> String {
    "5000".to_string()
}

fn default_reversal_line_prefix() -> String {
    "Reversal: ".to_string()
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            inventory_account_code: default_inventory_account_code(),
            cogs_account_code: default_cogs_account_code(),
            reversal_line_prefix: default_reversal_line_prefix(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "tally=info,audit=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_config_defaults() {
        let config = PostingConfig::default();
        assert_eq!(config.inventory_account_code, "1300");
        assert_eq!(config.cogs_account_code, "5000");
        assert_eq!(config.reversal_line_prefix, "Reversal: ");
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", Some("postgres://localhost/tally_test")),
                ("TALLY__POSTING__COGS_ACCOUNT_CODE", Some("5100")),
                ("TALLY__LOGGING__JSON", Some("true")),
                ("RUN_MODE", Some("config-test")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/tally_test");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.posting.cogs_account_code, "5100");
                assert_eq!(config.posting.inventory_account_code, "1300");
                assert!(config.logging.json);
            },
        );
    }

    #[test]
    fn test_load_requires_database_url() {
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("config-test")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
