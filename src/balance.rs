// src/balance.rs
use crate::ERC20;
use crate::registry::Token;
use crate::utils::{TOKEN_DECIMALS, u256_to_human};
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn balance_of(&self, token: Address, account: Address) -> anyhow::Result<U256>;
}

pub struct Erc20Balances<M> {
    client: Arc<M>,
}

impl<M: Middleware + 'static> Erc20Balances<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<M: Middleware + 'static> BalanceReader for Erc20Balances<M> {
    async fn balance_of(&self, token: Address, account: Address) -> anyhow::Result<U256> {
        let contract = ERC20::new(token, self.client.clone());
        Ok(contract.balance_of(account).call().await?)
    }
}

/// Zero without querying when there is no account or the token is unmapped; read errors also give zero.
pub async fn read_balance(reader: &dyn BalanceReader, token: Address, account: Option<Address>) -> U256 {
    let Some(account) = account else {
        return U256::zero();
    };
    if token.is_zero() {
        return U256::zero();
    }
    match reader.balance_of(token, account).await {
        Ok(balance) => balance,
        Err(e) => {
            warn!(?token, ?account, "balance query failed: {:#}", e);
            U256::zero()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMessage {
    pub label: String,
    pub amount: String,
    pub image: String,
}

impl BalanceMessage {
    pub fn new(token: &Token, balance: U256) -> Self {
        Self {
            label: format!("Your un-staked {} balance", token.name),
            amount: u256_to_human(balance, TOKEN_DECIMALS),
            image: token.image.clone(),
        }
    }
}

/// Polls one token balance in the background and publishes it only when it changes.
pub struct BalanceWatch {
    balance: watch::Receiver<Option<U256>>,
    task: JoinHandle<()>,
}

impl BalanceWatch {
    pub fn spawn(
        reader: Arc<dyn BalanceReader>,
        token: Address,
        account: Option<Address>,
        period: Duration,
    ) -> Self {
        let (tx, balance) = watch::channel(None);

        let task = tokio::spawn(async move {
            let account = match account {
                Some(account) if !token.is_zero() => account,
                _ => {
                    tx.send_replace(Some(U256::zero()));
                    return;
                }
            };

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match reader.balance_of(token, account).await {
                    Ok(value) => {
                        let changed = tx.send_if_modified(|current| {
                            if *current == Some(value) {
                                false
                            } else {
                                *current = Some(value);
                                true
                            }
                        });
                        if changed {
                            debug!(?token, ?account, %value, "balance changed");
                        }
                    }
                    Err(e) => warn!(?token, ?account, "balance query failed: {:#}", e),
                }
                if tx.is_closed() {
                    return;
                }
            }
        });

        Self { balance, task }
    }

    /// Zero until the first read resolves.
    pub fn current(&self) -> U256 {
        self.balance.borrow().unwrap_or_default()
    }

    pub fn is_resolved(&self) -> bool {
        self.balance.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<U256>> {
        self.balance.clone()
    }
}

impl Drop for BalanceWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeReader {
        balance: Mutex<U256>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BalanceReader for FakeReader {
        async fn balance_of(&self, _token: Address, _account: Address) -> anyhow::Result<U256> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("node unreachable");
            }
            Ok(*self.balance.lock().unwrap())
        }
    }

    fn token() -> Token {
        Token { image: "eth.png".into(), address: Address::repeat_byte(0xee), name: "WETH".into() }
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn no_account_reads_zero_without_query() {
        let reader = FakeReader { balance: Mutex::new(U256::from(7)), ..Default::default() };
        assert_eq!(read_balance(&reader, token().address, None).await, U256::zero());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unmapped_token_reads_zero() {
        let reader = FakeReader { balance: Mutex::new(U256::from(7)), ..Default::default() };
        let account = Some(Address::repeat_byte(1));
        assert_eq!(read_balance(&reader, Address::zero(), account).await, U256::zero());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_errors_are_absorbed() {
        let reader = FakeReader { fail: true, ..Default::default() };
        let account = Some(Address::repeat_byte(1));
        assert_eq!(read_balance(&reader, token().address, account).await, U256::zero());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn message_formats_eighteen_decimals() {
        let balance = U256::from(2_250_000_000_000_000_000u64);
        let message = BalanceMessage::new(&token(), balance);
        assert_eq!(message.label, "Your un-staked WETH balance");
        assert_eq!(message.amount, "2.25");
        assert_eq!(message.image, "eth.png");
    }

    #[tokio::test]
    async fn watch_publishes_changes() {
        let reader = Arc::new(FakeReader { balance: Mutex::new(U256::from(5)), ..Default::default() });
        let watch = BalanceWatch::spawn(
            reader.clone(),
            token().address,
            Some(Address::repeat_byte(1)),
            Duration::from_millis(10),
        );

        wait_for(|| watch.is_resolved()).await;
        assert_eq!(watch.current(), U256::from(5));

        *reader.balance.lock().unwrap() = U256::from(9);
        wait_for(|| watch.current() == U256::from(9)).await;
    }

    #[tokio::test]
    async fn watch_without_account_resolves_to_zero() {
        let reader = Arc::new(FakeReader { balance: Mutex::new(U256::from(5)), ..Default::default() });
        let watch = BalanceWatch::spawn(reader.clone(), token().address, None, Duration::from_millis(10));
        wait_for(|| watch.is_resolved()).await;
        assert_eq!(watch.current(), U256::zero());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_watch_stays_at_zero() {
        let reader = Arc::new(FakeReader { fail: true, ..Default::default() });
        let watch = BalanceWatch::spawn(
            reader.clone(),
            token().address,
            Some(Address::repeat_byte(1)),
            Duration::from_millis(10),
        );
        wait_for(|| reader.calls.load(Ordering::SeqCst) >= 2).await;
        assert!(!watch.is_resolved());
        assert_eq!(watch.current(), U256::zero());
    }
}
