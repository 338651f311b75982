// src/notifications.rs
use crate::transaction::{APPROVE_TX_NAME, STAKE_TX_NAME};
use crate::utils::now_millis;
use ethers::types::TxHash;
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    TransactionStarted,
    TransactionSucceed,
    TransactionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub transaction_name: String,
    pub hash: Option<TxHash>,
    pub at: u64,
}

/// Append-only, shared between the sender that produces events and whoever reads them.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: NotificationKind, transaction_name: &str, hash: Option<TxHash>) {
        let notification = Notification {
            kind,
            transaction_name: transaction_name.to_string(),
            hash,
            at: now_millis(),
        };
        // a poisoned log still holds every entry pushed before the panic
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.push(notification);
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn is_transaction_success(notification: &Notification, name: &str) -> bool {
    notification.kind == NotificationKind::TransactionSucceed && notification.transaction_name == name
}

pub fn is_approved(notifications: &[Notification]) -> bool {
    notifications.iter().any(|n| is_transaction_success(n, APPROVE_TX_NAME))
}

pub fn is_staked(notifications: &[Notification]) -> bool {
    notifications.iter().any(|n| is_transaction_success(n, STAKE_TX_NAME))
}
