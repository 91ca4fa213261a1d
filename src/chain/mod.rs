//! Chain module - the network collaborators around the signing pipeline
//!
//! This module provides:
//! - `ChainState`: the live reads a build needs (chain id, nonce, fees)
//! - `Broadcaster`: submission of the final signed bytes
//! - `ChainProvider`: a JSON-RPC implementation of both with read failover

pub mod provider;

pub use provider::ChainProvider;

use crate::error::ActivatorResult;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

/// EIP-1559 fee levels for one submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeLevels {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Read-only chain state consumed before a build
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainState: Send + Sync {
    /// Chain identifier reported by the node
    async fn chain_id(&self) -> ActivatorResult<u64>;

    /// Number of transactions sent from `account` (its next nonce)
    async fn transaction_count(&self, account: Address) -> ActivatorResult<u64>;

    /// Current fee levels
    async fn fee_levels(&self) -> ActivatorResult<FeeLevels>;
}

/// Submits a signed transaction and returns the node's transaction hash
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn send_raw_transaction(&self, raw: &[u8]) -> ActivatorResult<H256>;
}
