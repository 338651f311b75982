// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DappError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("deployment map error: {0}")]
    Registry(String),

    #[error("no wallet configured")]
    NoWallet,

    #[error("wallet not connected")]
    NotConnected,

    #[error("unsupported chain id {0}")]
    UnsupportedChain(u64),

    #[error("unknown token {0}")]
    UnknownToken(String),

    #[error("provider error: {0}")]
    Provider(String),
}

pub type Result<T, E = DappError> = std::result::Result<T, E>;
