// src/shell.rs
use crate::balance::{BalanceMessage, BalanceReader, BalanceWatch};
use crate::error::DappError;
use crate::flow::Phase;
use crate::notifications::{Notification, is_approved, is_staked};
use crate::registry::{ContractName, DeploymentMap, Token, find_token, supported_tokens};
use crate::session::{SessionSnapshot, WalletSession};
use crate::staking::StakeTokens;
use crate::transaction::TransactionState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

pub const APP_TITLE: &str = "Dapp Token App";

/// Token names stay distinct even when an unmapped chain resolves every token to zero.
type SessionKey = (u64, Address, String);

pub struct AppState {
    session: Arc<dyn WalletSession>,
    registry: Arc<DeploymentMap>,
    balances: Arc<dyn BalanceReader>,
    poll_interval: Duration,
    // keyed by (chain, account, token name); only the current session's entries are kept
    watches: Mutex<HashMap<SessionKey, BalanceWatch>>,
    stakers: Mutex<HashMap<SessionKey, Arc<StakeTokens>>>,
}

impl AppState {
    pub fn new(
        session: Arc<dyn WalletSession>,
        registry: Arc<DeploymentMap>,
        balances: Arc<dyn BalanceReader>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            registry,
            balances,
            poll_interval,
            watches: Mutex::new(HashMap::new()),
            stakers: Mutex::new(HashMap::new()),
        }
    }

    fn tokens(&self) -> Vec<Token> {
        supported_tokens(&self.registry.resolve(self.session.chain_id()))
    }

    fn token(&self, name: &str) -> Result<Token, DappError> {
        find_token(&self.tokens(), name).ok_or_else(|| DappError::UnknownToken(name.to_string()))
    }

    fn balance(&self, token: &Token, snapshot: SessionSnapshot) -> U256 {
        let mut watches = self.watches.lock().unwrap_or_else(|p| p.into_inner());
        let (Some(chain_id), Some(account)) = (snapshot.chain_id, snapshot.account) else {
            watches.clear();
            return U256::zero();
        };
        watches.retain(|(chain, owner, _), _| *chain == chain_id && *owner == account);
        watches
            .entry((chain_id, account, token.name.clone()))
            .or_insert_with(|| {
                BalanceWatch::spawn(self.balances.clone(), token.address, Some(account), self.poll_interval)
            })
            .current()
    }

    fn existing_staker(&self, token: &Token) -> Option<Arc<StakeTokens>> {
        let snapshot = self.session.snapshot();
        let key = (snapshot.chain_id?, snapshot.account?, token.name.clone());
        self.stakers.lock().unwrap_or_else(|p| p.into_inner()).get(&key).cloned()
    }

    fn staker(&self, token: &Token) -> Result<Arc<StakeTokens>, DappError> {
        let snapshot = self.session.snapshot();
        let (Some(chain_id), Some(account)) = (snapshot.chain_id, snapshot.account) else {
            return Err(DappError::NotConnected);
        };
        let mut stakers = self.stakers.lock().unwrap_or_else(|p| p.into_inner());
        stakers.retain(|(chain, owner, _), _| *chain == chain_id && *owner == account);

        let key = (chain_id, account, token.name.clone());
        if let Some(staker) = stakers.get(&key) {
            return Ok(staker.clone());
        }

        let sender = self.session.transactions().ok_or(DappError::NotConnected)?;
        let farm = self.registry.address(Some(chain_id), ContractName::TokenFarm);
        let staker = Arc::new(StakeTokens::new(token.address, farm, sender));
        stakers.insert(key, staker.clone());
        Ok(staker)
    }

    fn forget_session(&self) {
        self.watches.lock().unwrap_or_else(|p| p.into_inner()).clear();
        self.stakers.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Number of live balance pollers.
    pub fn balance_watch_count(&self) -> usize {
        self.watches.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/session", get(session))
        .route("/session/connect", post(connect))
        .route("/session/disconnect", post(disconnect))
        .route("/stake/{token}", get(stake_state).post(stake))
        .route("/notifications", get(notifications))
        .with_state(state)
}

pub struct ApiError(DappError);

impl From<DappError> for ApiError {
    fn from(e: DappError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DappError::UnknownToken(_) => StatusCode::NOT_FOUND,
            DappError::NotConnected | DappError::NoWallet => StatusCode::CONFLICT,
            DappError::UnsupportedChain(_) => StatusCode::BAD_REQUEST,
            DappError::Provider(_) => StatusCode::BAD_GATEWAY,
            DappError::Config(_) | DappError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Header {
    connected: bool,
    account: Option<Address>,
    action: &'static str,
}

impl Header {
    fn new(snapshot: SessionSnapshot) -> Self {
        let connected = snapshot.account.is_some();
        Self {
            connected,
            account: snapshot.account,
            action: if connected { "Disconnect" } else { "Connect" },
        }
    }
}

#[derive(Serialize)]
struct Page {
    title: &'static str,
    header: Header,
    chain_id: Option<u64>,
    balances: Vec<BalanceMessage>,
}

async fn page(State(state): State<Arc<AppState>>) -> Json<Page> {
    let snapshot = state.session.snapshot();
    let balances = state
        .tokens()
        .iter()
        .map(|token| BalanceMessage::new(token, state.balance(token, snapshot)))
        .collect();

    Json(Page {
        title: APP_TITLE,
        header: Header::new(snapshot),
        chain_id: snapshot.chain_id,
        balances,
    })
}

#[derive(Serialize)]
struct SessionView {
    header: Header,
    chain_id: Option<u64>,
}

fn session_view(state: &AppState) -> SessionView {
    let snapshot = state.session.snapshot();
    SessionView { header: Header::new(snapshot), chain_id: snapshot.chain_id }
}

async fn session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(session_view(&state))
}

async fn connect(State(state): State<Arc<AppState>>) -> Result<Json<SessionView>, ApiError> {
    if let Err(e) = state.session.connect().await {
        warn!("connect failed: {}", e);
        return Err(e.into());
    }
    Ok(Json(session_view(&state)))
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    state.session.disconnect();
    state.forget_session();
    Json(session_view(&state))
}

#[derive(Deserialize)]
struct StakeBody {
    amount: String,
}

#[derive(Serialize)]
struct StakeView {
    token: String,
    phase: Phase,
    state: TransactionState,
}

async fn stake(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<StakeBody>,
) -> Result<Json<StakeView>, ApiError> {
    if !state.session.is_connected() {
        return Err(DappError::NotConnected.into());
    }
    let token = state.token(&name)?;
    let staker = state.staker(&token)?;
    let current = staker.approve_and_stake(&body.amount);
    Ok(Json(StakeView { token: token.name, phase: staker.phase(), state: current }))
}

async fn stake_state(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StakeView>, ApiError> {
    let token = state.token(&name)?;
    let view = match state.existing_staker(&token) {
        Some(staker) => StakeView { token: token.name, phase: staker.phase(), state: staker.state() },
        None => StakeView { token: token.name, phase: Phase::Idle, state: TransactionState::idle() },
    };
    Ok(Json(view))
}

#[derive(Serialize)]
struct NotificationsView {
    approved: bool,
    staked: bool,
    notifications: Vec<Notification>,
}

async fn notifications(State(state): State<Arc<AppState>>) -> Json<NotificationsView> {
    let notifications = state.session.notifications().snapshot();
    Json(NotificationsView {
        approved: is_approved(&notifications),
        staked: is_staked(&notifications),
        notifications,
    })
}
