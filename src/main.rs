// src/main.rs
use anyhow::Result as AnyhowResult;
use dotenvy::dotenv;
use stake_yield_dapp::balance::Erc20Balances;
use stake_yield_dapp::config::Config;
use stake_yield_dapp::registry::DeploymentMap;
use stake_yield_dapp::session::LocalWalletSession;
use stake_yield_dapp::shell::{self, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let registry = match &config.deployment_map {
        Some(path) => DeploymentMap::load(path)?,
        None => DeploymentMap::bundled()?,
    };
    registry.validate()?;

    let session = Arc::new(LocalWalletSession::from_config(&config)?);
    let balances = Arc::new(Erc20Balances::new(Arc::new(session.provider().clone())));

    let state = Arc::new(AppState::new(
        session,
        Arc::new(registry),
        balances,
        config.balance_poll_interval,
    ));

    let app = shell::router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, rpc = %config.rpc_url, "serving staking dapp");
    axum::serve(listener, app).await?;

    Ok(())
}
