//! Configuration for the token ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Highest amount a fast (unchecked) transfer may move
    pub limit_tokens: i64,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Bulk initialization applied to an empty store
    pub seed: SeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/token-ledger"),
            service_name: "token-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            limit_tokens: 10,
            rocksdb: RocksDBConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Initial account seeding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Number of accounts to create ("1".."accounts")
    pub accounts: u32,

    /// Tokens credited to each seeded account
    pub tokens: i64,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("TOKEN_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(limit) = std::env::var("TOKEN_LEDGER_LIMIT_TOKENS") {
            config.limit_tokens = parse_env("TOKEN_LEDGER_LIMIT_TOKENS", &limit)?;
        }

        if let Ok(accounts) = std::env::var("TOKEN_LEDGER_SEED_ACCOUNTS") {
            config.seed.accounts = parse_env("TOKEN_LEDGER_SEED_ACCOUNTS", &accounts)?;
        }

        if let Ok(tokens) = std::env::var("TOKEN_LEDGER_SEED_TOKENS") {
            config.seed.tokens = parse_env("TOKEN_LEDGER_SEED_TOKENS", &tokens)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.limit_tokens < 0 {
            return Err(crate::Error::Config(format!(
                "limit_tokens must be zero or positive, got {}",
                self.limit_tokens
            )));
        }
        if self.seed.tokens < 0 {
            return Err(crate::Error::Config(format!(
                "seed.tokens must be zero or positive, got {}",
                self.seed.tokens
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| crate::Error::Config(format!("{} is not a valid number: {}", name, value)))
}
