#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, U256};
use stake_yield_dapp::balance::BalanceReader;
use stake_yield_dapp::error::{DappError, Result};
use stake_yield_dapp::notifications::{NotificationKind, NotificationLog};
use stake_yield_dapp::session::{SessionSnapshot, WalletSession};
use stake_yield_dapp::transaction::{CallRequest, TransactionHandle, TransactionSender, TransactionState, TxStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// Records every call and lets the test decide how each one progresses.
#[derive(Default)]
pub struct ScriptedSender {
    calls: Mutex<Vec<(CallRequest, watch::Sender<TransactionState>)>>,
    notifications: NotificationLog,
}

impl ScriptedSender {
    pub fn with_log(notifications: NotificationLog) -> Self {
        Self { calls: Mutex::new(Vec::new()), notifications }
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.calls.lock().unwrap().iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn report(&self, index: usize, status: TxStatus) {
        let calls = self.calls.lock().unwrap();
        let (call, tx) = &calls[index];
        let kind = match status {
            TxStatus::Mining => Some(NotificationKind::TransactionStarted),
            TxStatus::Success => Some(NotificationKind::TransactionSucceed),
            TxStatus::Failed(_) => Some(NotificationKind::TransactionFailed),
            _ => None,
        };
        if let Some(kind) = kind {
            self.notifications.push(kind, &call.transaction_name, None);
        }
        tx.send_replace(TransactionState::named(&call.transaction_name, status));
    }
}

impl TransactionSender for ScriptedSender {
    fn send(&self, call: CallRequest) -> TransactionHandle {
        let name = call.transaction_name.clone();
        let (tx, rx) = watch::channel(TransactionState::named(&name, TxStatus::PendingSignature));
        self.calls.lock().unwrap().push((call, tx));
        TransactionHandle { name, status: rx }
    }
}

pub struct FakeSession {
    current: RwLock<SessionSnapshot>,
    connect_to: SessionSnapshot,
    sender: Arc<ScriptedSender>,
    notifications: NotificationLog,
}

impl FakeSession {
    pub fn new(account: Address, chain_id: u64) -> Self {
        let notifications = NotificationLog::new();
        Self {
            current: RwLock::new(SessionSnapshot::default()),
            connect_to: SessionSnapshot { account: Some(account), chain_id: Some(chain_id) },
            sender: Arc::new(ScriptedSender::with_log(notifications.clone())),
            notifications,
        }
    }

    pub fn sender(&self) -> Arc<ScriptedSender> {
        self.sender.clone()
    }
}

#[async_trait]
impl WalletSession for FakeSession {
    fn account(&self) -> Option<Address> {
        self.current.read().unwrap().account
    }

    fn chain_id(&self) -> Option<u64> {
        self.current.read().unwrap().chain_id
    }

    async fn connect(&self) -> Result<()> {
        if self.connect_to.chain_id == Some(5) {
            return Err(DappError::UnsupportedChain(5));
        }
        *self.current.write().unwrap() = self.connect_to;
        Ok(())
    }

    fn disconnect(&self) {
        *self.current.write().unwrap() = SessionSnapshot::default();
    }

    fn notifications(&self) -> NotificationLog {
        self.notifications.clone()
    }

    fn transactions(&self) -> Option<Arc<dyn TransactionSender>> {
        self.is_connected().then(|| self.sender.clone() as Arc<dyn TransactionSender>)
    }
}

#[derive(Default)]
pub struct FakeBalances {
    balances: Mutex<HashMap<Address, U256>>,
    queries: AtomicUsize,
}

impl FakeBalances {
    pub fn set(&self, token: Address, value: U256) {
        self.balances.lock().unwrap().insert(token, value);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceReader for FakeBalances {
    async fn balance_of(&self, token: Address, _account: Address) -> anyhow::Result<U256> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances.lock().unwrap().get(&token).copied().unwrap_or_default())
    }
}

pub async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Gives spawned watchers a chance to run before asserting that nothing happened.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}
