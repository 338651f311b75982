// src/transaction.rs
use crate::notifications::{NotificationKind, NotificationLog};
use crate::{ERC20, TokenFarm};
use ethers::abi::Detokenize;
use ethers::contract::ContractCall;
use ethers::providers::Middleware;
use ethers::types::{Address, TxHash, U256, U64};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const APPROVE_TX_NAME: &str = "Approve ERC20 transfer";
pub const STAKE_TX_NAME: &str = "Stake Tokens";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason")]
pub enum TxStatus {
    Idle,
    PendingSignature,
    Mining,
    Success,
    Failed(String),
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionState {
    pub status: TxStatus,
    pub transaction_name: Option<String>,
    pub hash: Option<TxHash>,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::idle()
    }
}

impl TransactionState {
    pub fn idle() -> Self {
        Self { status: TxStatus::Idle, transaction_name: None, hash: None }
    }

    pub fn named(name: &str, status: TxStatus) -> Self {
        Self { status, transaction_name: Some(name.to_string()), hash: None }
    }

    pub fn with_hash(mut self, hash: TxHash) -> Self {
        self.hash = Some(hash);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFunction {
    /// `approve(spender, amount)` on an ERC-20 token
    Approve { spender: Address, amount: String },
    /// `stake(token, amount)` on the farm
    Stake { token: Address, amount: String },
}

/// A named call against a deployed contract. Amounts stay strings until encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub contract: Address,
    pub function: CallFunction,
    pub transaction_name: String,
}

impl CallRequest {
    pub fn approve(token: Address, spender: Address, amount: &str) -> Self {
        Self {
            contract: token,
            function: CallFunction::Approve { spender, amount: amount.to_string() },
            transaction_name: APPROVE_TX_NAME.to_string(),
        }
    }

    pub fn stake(farm: Address, token: Address, amount: &str) -> Self {
        Self {
            contract: farm,
            function: CallFunction::Stake { token, amount: amount.to_string() },
            transaction_name: STAKE_TX_NAME.to_string(),
        }
    }
}

pub struct TransactionHandle {
    pub name: String,
    pub status: watch::Receiver<TransactionState>,
}

/// Submits calls through a wallet. Progress is reported on the handle, never as an error.
pub trait TransactionSender: Send + Sync + 'static {
    fn send(&self, call: CallRequest) -> TransactionHandle;
}

pub struct EthersSender<M> {
    client: Arc<M>,
    notifications: NotificationLog,
}

impl<M: Middleware + 'static> EthersSender<M> {
    pub fn new(client: Arc<M>, notifications: NotificationLog) -> Self {
        Self { client, notifications }
    }
}

impl<M: Middleware + 'static> TransactionSender for EthersSender<M> {
    fn send(&self, call: CallRequest) -> TransactionHandle {
        let name = call.transaction_name.clone();
        let (tx, rx) = watch::channel(TransactionState::named(&name, TxStatus::PendingSignature));
        let client = self.client.clone();
        let notifications = self.notifications.clone();

        tokio::spawn(async move {
            let reporter = Reporter { name: call.transaction_name.clone(), tx, notifications };
            match call.function {
                CallFunction::Approve { spender, amount } => match parse_amount(&amount) {
                    Ok(amount) => {
                        let erc20 = ERC20::new(call.contract, client);
                        submit(erc20.approve(spender, amount), &reporter).await
                    }
                    Err(reason) => reporter.fail(None, reason),
                },
                CallFunction::Stake { token, amount } => match parse_amount(&amount) {
                    Ok(amount) => {
                        let farm = TokenFarm::new(call.contract, client);
                        submit(farm.stake(token, amount), &reporter).await
                    }
                    Err(reason) => reporter.fail(None, reason),
                },
            }
        });

        TransactionHandle { name, status: rx }
    }
}

fn parse_amount(amount: &str) -> Result<U256, String> {
    U256::from_dec_str(amount.trim()).map_err(|e| format!("invalid amount {:?}: {}", amount, e))
}

struct Reporter {
    name: String,
    tx: watch::Sender<TransactionState>,
    notifications: NotificationLog,
}

impl Reporter {
    fn mining(&self, hash: TxHash) {
        info!(transaction = %self.name, ?hash, "transaction submitted");
        self.notifications.push(NotificationKind::TransactionStarted, &self.name, Some(hash));
        self.tx.send_replace(TransactionState::named(&self.name, TxStatus::Mining).with_hash(hash));
    }

    fn succeed(&self, hash: TxHash) {
        info!(transaction = %self.name, ?hash, "transaction succeeded");
        self.notifications.push(NotificationKind::TransactionSucceed, &self.name, Some(hash));
        self.tx.send_replace(TransactionState::named(&self.name, TxStatus::Success).with_hash(hash));
    }

    fn fail(&self, hash: Option<TxHash>, reason: String) {
        warn!(transaction = %self.name, ?hash, %reason, "transaction failed");
        self.notifications.push(NotificationKind::TransactionFailed, &self.name, hash);
        let mut state = TransactionState::named(&self.name, TxStatus::Failed(reason));
        state.hash = hash;
        self.tx.send_replace(state);
    }
}

async fn submit<M, D>(call: ContractCall<M, D>, reporter: &Reporter)
where
    M: Middleware + 'static,
    D: Detokenize,
{
    debug!(transaction = %reporter.name, "requesting signature");
    let pending = match call.send().await {
        Ok(pending) => pending,
        Err(e) => return reporter.fail(None, e.to_string()),
    };

    let hash = pending.tx_hash();
    reporter.mining(hash);

    match pending.await {
        Ok(Some(receipt)) if receipt.status == Some(U64::from(1)) => reporter.succeed(hash),
        Ok(Some(_)) => reporter.fail(Some(hash), "transaction reverted".into()),
        Ok(None) => reporter.fail(Some(hash), "transaction dropped".into()),
        Err(e) => reporter.fail(Some(hash), e.to_string()),
    }
}
