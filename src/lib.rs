// src/lib.rs
#![allow(clippy::module_inception)]

use ethers::contract::abigen;

abigen!(ERC20, r#"[
    function balanceOf(address) external view returns (uint256)
    function approve(address spender, uint256 amount) external returns (bool)
]"#);

abigen!(TokenFarm, r#"[
    function stake(address token, uint256 amount) external
]"#);

pub mod balance;
pub mod config;
pub mod error;
pub mod flow;
pub mod notifications;
pub mod registry;
pub mod session;
pub mod shell;
pub mod staking;
pub mod transaction;
pub mod utils;
