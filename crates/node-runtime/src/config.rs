//! # Node Configuration
//!
//! Runtime configuration, read from `DS_*` environment variables.
//!
//! | Variable                   | Default   | Meaning                               |
//! |----------------------------|-----------|---------------------------------------|
//! | `DS_NETWORK`               | `regtest` | built-in network parameters           |
//! | `DS_CHAIN_PARAMS`          | unset     | JSON file with full network params    |
//! | `DS_MAX_REORG_DEPTH`       | `500`     | deepest accepted reorganization       |
//! | `DS_MAX_FUTURE_DRIFT_SECS` | `7200`    | allowed header clock drift            |
//! | `DS_INBOUND_QUEUE`         | `1024`    | pending submissions before backpressure |
//! | `DS_LOG_LEVEL`             | `info`    | tracing filter when `RUST_LOG` is unset |

use ds_consensus::{ConsensusConfig, NetworkParams};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_INBOUND_QUEUE: usize = 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Consensus parameters handed to the engine.
    pub consensus: ConsensusConfig,
    /// Capacity of the inbound submission queue.
    pub inbound_queue: usize,
    /// Default tracing filter.
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusConfig::regtest(),
            inbound_queue: DEFAULT_INBOUND_QUEUE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown network '{0}' (set DS_CHAIN_PARAMS to load custom parameters)")]
    UnknownNetwork(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to read chain params from {path:?}: {source}")]
    ReadChainParams {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse chain params from {path:?}: {source}")]
    ParseChainParams {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup("DS_CHAIN_PARAMS") {
            Some(path) => load_network_params(PathBuf::from(path))?,
            None => {
                let name = lookup("DS_NETWORK").unwrap_or_else(|| "regtest".to_string());
                builtin_network(&name)?
            }
        };

        let mut consensus = ConsensusConfig::new(network);
        if let Some(depth) = parse_var(&lookup, "DS_MAX_REORG_DEPTH")? {
            consensus = consensus.with_max_reorg_depth(depth);
        }
        if let Some(drift) = parse_var(&lookup, "DS_MAX_FUTURE_DRIFT_SECS")? {
            consensus = consensus.with_max_future_drift(drift);
        }

        let inbound_queue = match parse_var::<usize, _>(&lookup, "DS_INBOUND_QUEUE")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "DS_INBOUND_QUEUE",
                    value: "0".to_string(),
                })
            }
            Some(n) => n,
            None => DEFAULT_INBOUND_QUEUE,
        };

        Ok(Self {
            consensus,
            inbound_queue,
            log_level: lookup("DS_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

fn builtin_network(name: &str) -> Result<NetworkParams, ConfigError> {
    match name {
        "main" => Ok(NetworkParams::main(NetworkParams::main_genesis())),
        "regtest" => Ok(NetworkParams::regtest(NetworkParams::regtest_genesis())),
        other => Err(ConfigError::UnknownNetwork(other.to_string())),
    }
}

fn load_network_params(path: PathBuf) -> Result<NetworkParams, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadChainParams {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::ParseChainParams { path, source })
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}
