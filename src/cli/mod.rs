//! CLI command implementations

pub mod duel;
pub mod init;
pub mod notifications;
pub mod show;
pub mod simulate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use quizduel::clock::SystemClock;
use quizduel::config::Config;
use quizduel::store::SqliteStore;
use quizduel::{DuelError, Engine};

/// Global options shared by every command
pub struct Context {
    config_path: PathBuf,
    db_path: Option<PathBuf>,
}

impl Context {
    pub fn new(config_path: Option<PathBuf>, db_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(Config::global_config_path),
            db_path,
        }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(&self.config_path)
    }

    /// Engine over the SQLite store and the wall clock
    pub fn engine(&self) -> Result<Engine> {
        let config = self.load_config()?;
        let db_path = self
            .db_path
            .clone()
            .unwrap_or_else(|| config.database_path());
        let store = SqliteStore::open(&db_path)?;
        Ok(Engine::new(Arc::new(store), Arc::new(SystemClock), &config))
    }
}

/// Log the real cause and hand the user the generic failure text
pub fn user_facing(err: DuelError) -> anyhow::Error {
    warn!("{}", err);
    anyhow::anyhow!(err.user_message())
}
