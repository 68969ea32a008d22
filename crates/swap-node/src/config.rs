//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use swap_core::{CoordinatorConfig, LedgerId, RetrySettings, WatcherSettings};

/// Full configuration for the atomicswaps node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Swap policy: margins, sweep cadence, refund behaviour.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Retry policy for transient ledger failures.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulated ledgers the node drives.
    #[serde(default = "default_ledgers")]
    pub ledgers: Vec<LedgerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Persist swap records. Without it nothing survives a restart.
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub id: String,
    /// Blocks before a funding counts as final.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Watcher polling interval (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Opening balances, address -> amount.
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,
}

impl LedgerConfig {
    pub fn ledger_id(&self) -> LedgerId {
        LedgerId::new(self.id.clone())
    }

    pub fn watcher_settings(&self) -> WatcherSettings {
        WatcherSettings {
            poll_interval_ms: self.poll_interval_ms,
            confirmations_required: self.confirmations,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_confirmations() -> u64 {
    1
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_ledgers() -> Vec<LedgerConfig> {
    vec![
        LedgerConfig {
            id: "ledger-a".into(),
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            balances: BTreeMap::from([("alice".to_string(), 1_000_000)]),
        },
        LedgerConfig {
            id: "ledger-b".into(),
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            balances: BTreeMap::from([("bob".to_string(), 1_000_000)]),
        },
    ]
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            retry: RetrySettings::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            ledgers: default_ledgers(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: NodeConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations the coordinator cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for ledger in &self.ledgers {
            if ledger.id.is_empty() {
                anyhow::bail!("ledger id must not be empty");
            }
            if !seen.insert(ledger.id.as_str()) {
                anyhow::bail!("ledger '{}' is configured twice", ledger.id);
            }
            if ledger.confirmations == 0 {
                anyhow::bail!("ledger '{}' needs at least one confirmation", ledger.id);
            }
        }
        if self.coordinator.sweep_interval_ms == 0 {
            anyhow::bail!("coordinator.sweep_interval_ms must be positive");
        }
        if self.coordinator.resubmit_after_ms == 0 {
            anyhow::bail!("coordinator.resubmit_after_ms must be positive");
        }
        Ok(())
    }
}
