// src/registry.rs
use crate::error::{DappError, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const BUNDLED_MAP: &str = include_str!("../config/deployments/map.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractName {
    TokenFarm,
    DappToken,
    MockWeth,
    MockFau,
}

impl ContractName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractName::TokenFarm => "TokenFarm",
            ContractName::DappToken => "DappToken",
            ContractName::MockWeth => "MockWETH",
            ContractName::MockFau => "MockFAU",
        }
    }
}

/// Deployed addresses keyed by chain id, then contract name. Newest deployment first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DeploymentMap(HashMap<String, HashMap<String, Vec<Address>>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContractAddresses {
    pub farm: Address,
    pub dapp: Address,
    pub weth: Address,
    pub fau: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub image: String,
    pub address: Address,
    pub name: String,
}

impl DeploymentMap {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| DappError::Registry(e.to_string()))
    }

    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_MAP)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DappError::Registry(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Zero address whenever the chain is unknown, unmapped, or lacks the contract.
    pub fn address(&self, chain_id: Option<u64>, contract: ContractName) -> Address {
        chain_id
            .and_then(|id| self.0.get(&id.to_string()))
            .and_then(|contracts| contracts.get(contract.as_str()))
            .and_then(|addresses| addresses.first().copied())
            .unwrap_or_else(Address::zero)
    }

    pub fn resolve(&self, chain_id: Option<u64>) -> ContractAddresses {
        ContractAddresses {
            farm: self.address(chain_id, ContractName::TokenFarm),
            dapp: self.address(chain_id, ContractName::DappToken),
            weth: self.address(chain_id, ContractName::MockWeth),
            fau: self.address(chain_id, ContractName::MockFau),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (chain, contracts) in &self.0 {
            if chain != "default" && chain.parse::<u64>().is_err() {
                problems.push(format!("chain key {:?} is not numeric", chain));
            }
            for (name, addresses) in contracts {
                if addresses.is_empty() {
                    problems.push(format!("chain {}: {} has no deployed address", chain, name));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.sort();
            Err(DappError::Registry(problems.join("; ")))
        }
    }
}

pub fn supported_tokens(addresses: &ContractAddresses) -> Vec<Token> {
    vec![
        Token { image: "dapp.png".into(), address: addresses.dapp, name: "DAPP".into() },
        Token { image: "eth.png".into(), address: addresses.weth, name: "WETH".into() },
        Token { image: "dai.png".into(), address: addresses.fau, name: "DAI".into() },
    ]
}

pub fn find_token(tokens: &[Token], name: &str) -> Option<Token> {
    tokens.iter().find(|t| t.name.eq_ignore_ascii_case(name)).cloned()
}
