// src/flow.rs
//! Approve-then-stake as an explicit state machine.
//!
//! Every call to [`StakeFlow::begin`] opens a new sequence. Status reports are
//! tagged with the sequence they belong to, and reports for any sequence but
//! the latest are dropped, so a superseded approval can never lead to a stake.
//! The stake request is produced only by the `Approving -> Staking` transition,
//! which happens at most once per sequence.

use crate::transaction::{TransactionState, TxStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    Approve,
    Stake,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Approving,
    Staking,
    Done,
    Failed(Step),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Approve(u64, TransactionState),
    Stake(u64, TransactionState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeRequest {
    pub seq: u64,
    pub amount: String,
}

#[derive(Debug, Clone, Default)]
pub struct StakeFlow {
    phase: Phase,
    seq: u64,
    amount: String,
    approve: TransactionState,
    stake: TransactionState,
}

impl StakeFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.seq == seq
    }

    pub fn pending_amount(&self) -> &str {
        &self.amount
    }

    /// Records `amount` and opens a new sequence, superseding any previous one.
    pub fn begin(&mut self, amount: &str) -> u64 {
        self.seq += 1;
        self.amount = amount.to_string();
        self.phase = Phase::Approving;
        self.approve = TransactionState::idle();
        self.stake = TransactionState::idle();
        self.seq
    }

    pub fn apply(&mut self, event: FlowEvent) -> Option<StakeRequest> {
        match event {
            FlowEvent::Approve(seq, state) if self.is_current(seq) => self.on_approve(state),
            FlowEvent::Stake(seq, state) if self.is_current(seq) => {
                self.on_stake(state);
                None
            }
            _ => None,
        }
    }

    fn on_approve(&mut self, state: TransactionState) -> Option<StakeRequest> {
        // once the approval resolved, later reports of it change nothing
        if self.phase() != Phase::Approving {
            return None;
        }
        let status = state.status.clone();
        self.approve = state;
        match status {
            TxStatus::Success => {
                self.phase = Phase::Staking;
                Some(StakeRequest { seq: self.seq, amount: self.amount.clone() })
            }
            TxStatus::Failed(_) => {
                self.phase = Phase::Failed(Step::Approve);
                None
            }
            _ => None,
        }
    }

    fn on_stake(&mut self, state: TransactionState) {
        if self.phase() != Phase::Staking {
            return;
        }
        let status = state.status.clone();
        self.stake = state;
        match status {
            TxStatus::Success => self.phase = Phase::Done,
            TxStatus::Failed(_) => self.phase = Phase::Failed(Step::Stake),
            _ => {}
        }
    }

    /// The approval's state until it succeeds, the stake's state afterwards.
    pub fn state(&self) -> &TransactionState {
        match self.phase() {
            Phase::Idle | Phase::Approving | Phase::Failed(Step::Approve) => &self.approve,
            Phase::Staking | Phase::Done | Phase::Failed(Step::Stake) => &self.stake,
        }
    }
}
