//! Configuration loading and management

mod io;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duel::RewardPolicy;
use crate::progression::{default_quests, QuestDefinition};
use crate::store::RetryPolicy;

/// Main configuration structure (`~/.quizduel/config.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Conflict retry behaviour of store transactions
    #[serde(default)]
    pub settlement: SettlementSettings,

    /// Rewards per duel outcome
    #[serde(default)]
    pub rewards: RewardPolicy,

    #[serde(default)]
    pub storage: StorageSettings,

    /// Daily quest table. Replaces the built-in one when present.
    #[serde(default = "default_quests")]
    pub quests: Vec<QuestDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settlement: SettlementSettings::default(),
            rewards: RewardPolicy::default(),
            storage: StorageSettings::default(),
            quests: default_quests(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
    pub max_attempts: u32,
    /// Linear backoff step between conflicting attempts
    pub retry_backoff_ms: u64,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            retry_backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file. Defaults to `~/.quizduel/duels.db`.
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.settlement.max_attempts,
            Duration::from_millis(self.settlement.retry_backoff_ms),
        )
    }

    /// Database location: `[storage] path` or the default under the config dir
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("duels.db"))
    }
}
