//! Bank configuration, loaded from TOML.
//!
//! ```toml
//! database_path = "/var/lib/blood-bank/stock.db"
//! fulfill_policy = "require_approval"
//! donor_cooldown_days = 90
//! busy_timeout_ms = 5000
//! ```
//!
//! Every key is optional. A missing `database_path` opens an in-memory store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::models::FulfillPolicy;

/// Days a donor must wait between completed donations.
pub const DEFAULT_DONOR_COOLDOWN_DAYS: i64 = 90;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BankConfig {
    pub database_path: Option<PathBuf>,
    pub fulfill_policy: FulfillPolicy,
    pub donor_cooldown_days: i64,
    pub busy_timeout_ms: u64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            fulfill_policy: FulfillPolicy::default(),
            donor_cooldown_days: DEFAULT_DONOR_COOLDOWN_DAYS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl BankConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// In-memory config with the given fulfill policy.
    pub fn in_memory(fulfill_policy: FulfillPolicy) -> Self {
        Self {
            fulfill_policy,
            ..Self::default()
        }
    }

    /// File-backed config with default settings.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.donor_cooldown_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "donor_cooldown_days must not be negative, got {}",
                self.donor_cooldown_days
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for BankConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: BankConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: BankConfig = "".parse().unwrap();
        assert_eq!(config, BankConfig::default());
        assert_eq!(config.fulfill_policy, FulfillPolicy::RequireApproval);
        assert_eq!(config.donor_cooldown_days, 90);
        assert_eq!(config.busy_timeout(), Duration::from_millis(5000));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config: BankConfig = r#"
            database_path = "stock.db"
            fulfill_policy = "allow_pending"
            donor_cooldown_days = 56
            busy_timeout_ms = 250
        "#
        .parse()
        .unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("stock.db")));
        assert_eq!(config.fulfill_policy, FulfillPolicy::AllowPending);
        assert_eq!(config.donor_cooldown_days, 56);
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_rejects_unknown_policy_and_keys() {
        assert!(matches!(
            "fulfill_policy = \"whenever\"".parse::<BankConfig>(),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            "cooldown = 3".parse::<BankConfig>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_negative_cooldown() {
        assert!(matches!(
            "donor_cooldown_days = -1".parse::<BankConfig>(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fulfill_policy = \"allow_pending\"").unwrap();

        let config = BankConfig::load(file.path()).unwrap();
        assert_eq!(config.fulfill_policy, FulfillPolicy::AllowPending);

        let missing = BankConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
