// src/session.rs
use crate::config::Config;
use crate::error::{DappError, Result};
use crate::notifications::NotificationLog;
use crate::transaction::{EthersSender, TransactionSender};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::info;

/// The connected wallet as seen by everything else: who, on which chain, and how to send.
#[async_trait]
pub trait WalletSession: Send + Sync {
    fn account(&self) -> Option<Address>;

    fn chain_id(&self) -> Option<u64>;

    fn is_connected(&self) -> bool {
        self.account().is_some()
    }

    async fn connect(&self) -> Result<()>;

    fn disconnect(&self);

    fn notifications(&self) -> NotificationLog;

    /// A sender signing as the connected account, `None` while disconnected.
    fn transactions(&self) -> Option<Arc<dyn TransactionSender>>;

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { account: self.account(), chain_id: self.chain_id() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

pub struct LocalWalletSession<P = Http> {
    provider: Provider<P>,
    wallet: Option<LocalWallet>,
    supported_chains: Vec<u64>,
    current: RwLock<SessionSnapshot>,
    notifications: NotificationLog,
}

impl LocalWalletSession<Http> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| DappError::Config(format!("RPC_URL {:?}: {}", config.rpc_url, e)))?;
        let wallet = config
            .private_key
            .as_deref()
            .map(|key| key.parse::<LocalWallet>())
            .transpose()
            .map_err(|e| DappError::Config(format!("PRIVATE_KEY: {}", e)))?;
        Ok(Self::new(provider, wallet, config.supported_chains.clone()))
    }
}

impl<P: JsonRpcClient + Clone + 'static> LocalWalletSession<P> {
    pub fn new(provider: Provider<P>, wallet: Option<LocalWallet>, supported_chains: Vec<u64>) -> Self {
        Self {
            provider,
            wallet,
            supported_chains,
            current: RwLock::new(SessionSnapshot::default()),
            notifications: NotificationLog::new(),
        }
    }

    pub fn provider(&self) -> &Provider<P> {
        &self.provider
    }

    fn current(&self) -> SessionSnapshot {
        *self.current.read().unwrap_or_else(|p| p.into_inner())
    }

    fn set_current(&self, snapshot: SessionSnapshot) {
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = snapshot;
    }
}

#[async_trait]
impl<P: JsonRpcClient + Clone + 'static> WalletSession for LocalWalletSession<P> {
    fn account(&self) -> Option<Address> {
        self.current().account
    }

    fn chain_id(&self) -> Option<u64> {
        self.current().chain_id
    }

    async fn connect(&self) -> Result<()> {
        let wallet = self.wallet.as_ref().ok_or(DappError::NoWallet)?;
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| DappError::Provider(e.to_string()))?
            .as_u64();
        if !self.supported_chains.contains(&chain_id) {
            return Err(DappError::UnsupportedChain(chain_id));
        }

        self.set_current(SessionSnapshot { account: Some(wallet.address()), chain_id: Some(chain_id) });
        info!(account = ?wallet.address(), chain_id, "wallet connected");
        Ok(())
    }

    fn disconnect(&self) {
        self.set_current(SessionSnapshot::default());
        info!("wallet disconnected");
    }

    fn notifications(&self) -> NotificationLog {
        self.notifications.clone()
    }

    fn transactions(&self) -> Option<Arc<dyn TransactionSender>> {
        let chain_id = self.chain_id()?;
        let wallet = self.wallet.clone()?.with_chain_id(chain_id);
        let client = SignerMiddleware::new(self.provider.clone(), wallet);
        Some(Arc::new(EthersSender::new(Arc::new(client), self.notifications.clone())))
    }
}
