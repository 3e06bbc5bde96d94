//! Daemon configuration: a TOML file with sane defaults for every field.

use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use fluxscan_chain::parameters::NetworkParams;
use fluxscan_indexer::SyncConfig;
use fluxscan_rpc::RpcConfig;
use fluxscan_store::StoreConfig;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub rpc: RpcSection,
    pub store: StoreSection,
    pub sync: SyncSection,
    /// Chain parameters; defaults are Flux mainnet.
    pub chain: NetworkParams,
    pub log: LogSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcSection {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for RpcSection {
    fn default() -> Self {
        let defaults = RpcConfig::default();
        RpcSection {
            url: defaults.url,
            user: None,
            password: None,
            timeout_secs: defaults.timeout.as_secs(),
            max_attempts: defaults.max_attempts,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        StoreSection {
            url: defaults.url,
            database: defaults.database,
            user: None,
            password: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    pub batch_size: usize,
    pub fetch_concurrency: usize,
    pub sync_mode_threshold: u32,
    /// Set to resync from a specific height instead of the stored state.
    pub start_height: Option<u32>,
    pub poll_interval_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        SyncSection {
            batch_size: defaults.batch_size,
            fetch_concurrency: defaults.fetch_concurrency,
            sync_mode_threshold: defaults.sync_mode_threshold,
            start_height: None,
            poll_interval_secs: defaults.poll_interval.as_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Tracing filter directive; `RUST_LOG` overrides it.
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw)
                    .wrap_err_with(|| format!("parsing config file {}", path.display()))
            }
            None => Ok(Config::default()),
        }
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            url: self.rpc.url.clone(),
            user: self.rpc.user.clone(),
            password: self.rpc.password.clone(),
            timeout: Duration::from_secs(self.rpc.timeout_secs),
            max_attempts: self.rpc.max_attempts,
            ..RpcConfig::default()
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.store.url.clone(),
            database: self.store.database.clone(),
            user: self.store.user.clone(),
            password: self.store.password.clone(),
            ..StoreConfig::default()
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_size: self.sync.batch_size.max(1),
            fetch_concurrency: self.sync.fetch_concurrency.max(1),
            sync_mode_threshold: self.sync.sync_mode_threshold,
            start_height: self.sync.start_height,
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs.max(1)),
        }
    }
}
