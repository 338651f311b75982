// src/config.rs
use crate::error::{DappError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// Rinkeby and the local development chain.
pub const DEFAULT_SUPPORTED_CHAINS: [u64; 2] = [4, 1337];
pub const DEFAULT_BALANCE_POLL_SECS: u64 = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub private_key: Option<String>,
    pub bind_addr: SocketAddr,
    pub deployment_map: Option<PathBuf>,
    pub supported_chains: Vec<u64>,
    pub balance_poll_interval: Duration,
}

impl Config {
    /// Reads the process environment. `.env` should already be loaded by the caller.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let rpc_url = get("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| DappError::Config(format!("BIND_ADDR: {}", e)))?;

        let supported_chains = match get("SUPPORTED_CHAINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u64>()
                        .map_err(|e| DappError::Config(format!("SUPPORTED_CHAINS entry {:?}: {}", s, e)))
                })
                .collect::<Result<Vec<_>>>()?,
            None => DEFAULT_SUPPORTED_CHAINS.to_vec(),
        };

        let poll_secs = match get("BALANCE_POLL_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .map_err(|e| DappError::Config(format!("BALANCE_POLL_SECS: {}", e)))?,
            None => DEFAULT_BALANCE_POLL_SECS,
        };
        if poll_secs == 0 {
            return Err(DappError::Config("BALANCE_POLL_SECS must be positive".into()));
        }

        Ok(Self {
            rpc_url,
            private_key: get("PRIVATE_KEY"),
            bind_addr,
            deployment_map: get("DEPLOYMENT_MAP").map(PathBuf::from),
            supported_chains,
            balance_poll_interval: Duration::from_secs(poll_secs),
        })
    }
}
