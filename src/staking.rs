// src/staking.rs
use crate::flow::{FlowEvent, Phase, StakeFlow, StakeRequest};
use crate::transaction::{CallRequest, TransactionHandle, TransactionSender, TransactionState};
use ethers::types::Address;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

/// Approve-then-stake for one token against one farm.
pub struct StakeTokens {
    token: Address,
    farm: Address,
    sender: Arc<dyn TransactionSender>,
    shared: Arc<Shared>,
}

struct Shared {
    flow: Mutex<StakeFlow>,
    state: watch::Sender<TransactionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StakeFlow> {
        self.flow.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Applies `event` and returns the stake to submit, plus whether `event`'s sequence is still current.
    fn apply(&self, event: FlowEvent, seq: u64) -> (Option<StakeRequest>, bool) {
        let mut flow = self.lock();
        let request = flow.apply(event);
        self.publish(&flow);
        (request, flow.is_current(seq))
    }

    fn publish(&self, flow: &StakeFlow) {
        let next = flow.state();
        self.state.send_if_modified(|current| {
            if current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
    }
}

impl StakeTokens {
    pub fn new(token: Address, farm: Address, sender: Arc<dyn TransactionSender>) -> Self {
        let (state, _) = watch::channel(TransactionState::idle());
        Self {
            token,
            farm,
            sender,
            shared: Arc::new(Shared { flow: Mutex::new(StakeFlow::new()), state }),
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn farm(&self) -> Address {
        self.farm
    }

    /// Must be called from within a tokio runtime.
    pub fn approve_and_stake(&self, amount: &str) -> TransactionState {
        let seq = {
            let mut flow = self.shared.lock();
            let seq = flow.begin(amount);
            self.shared.publish(&flow);
            seq
        };
        info!(token = ?self.token, amount, seq, "approving stake");

        let mut approval = self.sender.send(CallRequest::approve(self.token, self.farm, amount));
        let submitted = approval.status.borrow_and_update().clone();
        let (request, _) = self.shared.apply(FlowEvent::Approve(seq, submitted), seq);
        tokio::spawn(run_sequence(
            seq,
            approval,
            request,
            self.token,
            self.farm,
            self.sender.clone(),
            self.shared.clone(),
        ));

        self.state()
    }

    pub fn state(&self) -> TransactionState {
        self.shared.state.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionState> {
        self.shared.state.subscribe()
    }
}

async fn run_sequence(
    seq: u64,
    mut approval: TransactionHandle,
    resolved: Option<StakeRequest>,
    token: Address,
    farm: Address,
    sender: Arc<dyn TransactionSender>,
    shared: Arc<Shared>,
) {
    // the approval may already have resolved by the time it was first applied
    let request = match resolved {
        Some(request) => request,
        None => loop {
            let state = approval.status.borrow_and_update().clone();
            let terminal = state.status.is_terminal();
            let (request, current) = shared.apply(FlowEvent::Approve(seq, state), seq);
            if let Some(request) = request {
                break request;
            }
            if !current || terminal {
                debug!(seq, current, "approval watcher finished without staking");
                return;
            }
            if approval.status.changed().await.is_err() {
                return;
            }
        },
    };

    info!(token = ?token, amount = %request.amount, seq, "approval confirmed, staking");
    let mut stake = sender.send(CallRequest::stake(farm, token, &request.amount));
    loop {
        let state = stake.status.borrow_and_update().clone();
        let terminal = state.status.is_terminal();
        let (_, current) = shared.apply(FlowEvent::Stake(seq, state), seq);
        if !current || terminal {
            return;
        }
        if stake.status.changed().await.is_err() {
            return;
        }
    }
}
