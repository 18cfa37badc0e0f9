//! Broker configuration.
//!
//! Loaded from a TOML file and overlaid with `ESCROW_*` environment
//! variables; command-line flags override both.

use crate::domain::account::AccountId;
use crate::error::{EscrowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Actor ids that carry the admin flag.
    pub admin_ids: Vec<AccountId>,

    /// Currency tag stamped on newly created deals.
    pub currency: String,

    /// How long an operation waits for a per-key lock before reporting `Busy`.
    pub lock_timeout_ms: u64,

    /// Default number of deals returned by the recent-deals listing.
    pub recent_limit: usize,

    /// Maximum rows returned by the payment history.
    pub history_limit: usize,

    /// Lifetime of a pending step-by-step admin operation.
    pub admin_session_ttl_secs: u64,

    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            currency: "TON".to_string(),
            lock_timeout_ms: 2_000,
            recent_limit: 20,
            history_limit: 100,
            admin_session_ttl_secs: 300,
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// RocksDB directory. In-memory storage when unset.
    pub db_path: Option<PathBuf>,

    /// Fsync the write-ahead log before a write reports success.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| EscrowError::Config(format!("Failed to parse config: {e}")))
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(ids) = lookup("ESCROW_ADMIN_IDS") {
            self.admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse().map_err(|_| {
                        EscrowError::Config(format!("invalid admin id in ESCROW_ADMIN_IDS: {id}"))
                    })
                })
                .collect::<Result<_>>()?;
        }

        if let Some(currency) = lookup("ESCROW_CURRENCY") {
            self.currency = currency;
        }

        if let Some(timeout) = lookup("ESCROW_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = timeout.trim().parse().map_err(|_| {
                EscrowError::Config(format!("invalid ESCROW_LOCK_TIMEOUT_MS: {timeout}"))
            })?;
        }

        if let Some(path) = lookup("ESCROW_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }

        Ok(self)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn admin_session_ttl(&self) -> Duration {
        Duration::from_secs(self.admin_session_ttl_secs)
    }

    pub fn is_admin(&self, id: AccountId) -> bool {
        self.admin_ids.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.currency, "TON");
        assert_eq!(config.lock_timeout(), Duration::from_secs(2));
        assert!(config.storage.db_path.is_none());
        assert!(config.storage.sync_writes);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "admin_ids = [1727085454]").unwrap();
        writeln!(file, "currency = \"USDT\"").unwrap();
        writeln!(file, "[storage]").unwrap();
        writeln!(file, "db_path = \"data/ledger\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.is_admin(1727085454));
        assert_eq!(config.currency, "USDT");
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.storage.db_path, Some(PathBuf::from("data/ledger")));
        assert!(config.storage.sync_writes);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "admin_ids = \"not a list\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(EscrowError::Config(_))
        ));
    }

    #[test]
    fn test_lookup_overlay() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ESCROW_ADMIN_IDS", "1, 2,3"),
            ("ESCROW_LOCK_TIMEOUT_MS", "50"),
            ("ESCROW_DB_PATH", "/tmp/ledger"),
        ]);
        let config = Config::default()
            .with_lookup(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.admin_ids, vec![1, 2, 3]);
        assert_eq!(config.lock_timeout_ms, 50);
        assert_eq!(config.currency, "TON");
        assert_eq!(config.storage.db_path, Some(PathBuf::from("/tmp/ledger")));
    }

    #[test]
    fn test_lookup_overlay_rejects_bad_admin_id() {
        let result = Config::default().with_lookup(|key| {
            (key == "ESCROW_ADMIN_IDS").then(|| "1,abc".to_string())
        });
        assert!(matches!(result, Err(EscrowError::Config(_))));
    }
}
