//! Chain provider with multi-RPC support and automatic failover

use super::{Broadcaster, ChainState, FeeLevels};
use crate::codec::quantity::Quantity;
use crate::config::NetworkConfig;
use crate::error::{ActivatorError, ActivatorResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Multi-provider wrapper with automatic failover for reads
pub struct ChainProvider {
    /// Network configuration
    config: NetworkConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
    /// Tip used when the node cannot suggest one
    default_priority_fee: U256,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: NetworkConfig, default_priority_fee: U256) -> ActivatorResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(ActivatorError::Transport {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        info!(
            "Chain {} provider ready with {} endpoint(s)",
            config.chain_id,
            http_providers.len()
        );

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
            default_priority_fee,
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!(
            "Chain {} failover to provider {}",
            self.config.chain_id, next
        );
    }

    fn transport_error(&self, message: impl Into<String>) -> ActivatorError {
        ActivatorError::Transport {
            chain_id: self.config.chain_id,
            message: message.into(),
        }
    }

    /// Get the chain id reported by the node, with failover
    pub async fn get_chain_id(&self) -> ActivatorResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_chainid().await {
                Ok(id) => return Quantity::from(id).as_u64(),
                Err(e) => {
                    warn!(
                        "Failed to get chain id from chain {}: {}",
                        self.config.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(self.transport_error("All providers failed to report chain id"))
    }

    /// Get the account's transaction count at the latest block, with failover
    pub async fn get_transaction_count(&self, account: Address) -> ActivatorResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_transaction_count(account, None).await {
                Ok(count) => return Quantity::from(count).as_u64(),
                Err(e) => {
                    warn!(
                        "Failed to get transaction count from chain {}: {}",
                        self.config.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(self.transport_error("All providers failed to report transaction count"))
    }

    /// Estimate EIP-1559 fees from the latest block, with failover.
    ///
    /// Buffering and the configured ceiling are applied by `GasEstimator`.
    pub async fn estimate_eip1559_fees(&self) -> ActivatorResult<FeeLevels> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_block(BlockNumber::Latest).await {
                Ok(Some(block)) => {
                    let base_fee = block
                        .base_fee_per_gas
                        .ok_or_else(|| self.transport_error("No base fee in block"))?;
                    let priority_fee = self.priority_fee().await;

                    let fees = fee_levels(base_fee, priority_fee)?;
                    debug!(
                        "Chain {} base fee {} -> max fee {}, priority {}",
                        self.config.chain_id, base_fee, fees.max_fee_per_gas, priority_fee
                    );
                    return Ok(fees);
                }
                Ok(None) => {
                    warn!("Chain {} returned no latest block", self.config.chain_id);
                    self.failover();
                }
                Err(e) => {
                    warn!(
                        "Failed to get latest block from chain {}: {}",
                        self.config.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(self.transport_error("All providers failed to report the latest block"))
    }

    async fn priority_fee(&self) -> U256 {
        match self
            .http()
            .request::<_, U256>("eth_maxPriorityFeePerGas", ())
            .await
        {
            Ok(fee) => fee,
            Err(e) => {
                warn!(
                    "eth_maxPriorityFeePerGas unavailable on chain {} ({}), using default tip",
                    self.config.chain_id, e
                );
                self.default_priority_fee
            }
        }
    }

    /// Submit raw bytes on the active endpoint only; never resent
    pub async fn send_raw(&self, raw: &[u8]) -> ActivatorResult<H256> {
        let pending = self
            .http()
            .send_raw_transaction(Bytes::from(raw.to_vec()))
            .await
            .map_err(|e| classify_send_error(self.config.chain_id, &e.to_string()))?;

        Ok(pending.tx_hash())
    }
}

/// `max_fee = 2 * base_fee + priority_fee`
pub fn fee_levels(base_fee: U256, priority_fee: U256) -> ActivatorResult<FeeLevels> {
    let max_fee = base_fee
        .checked_mul(U256::from(2u64))
        .and_then(|doubled| doubled.checked_add(priority_fee))
        .ok_or_else(|| ActivatorError::Range("max fee overflows 256 bits".to_string()))?;

    Ok(FeeLevels {
        max_fee_per_gas: max_fee,
        max_priority_fee_per_gas: priority_fee,
    })
}

/// Map a node's rejection message onto a typed error
pub fn classify_send_error(chain_id: u64, message: &str) -> ActivatorError {
    let lower = message.to_lowercase();
    if lower.contains("nonce too low") {
        ActivatorError::NonceTooLow { chain_id }
    } else if lower.contains("insufficient funds") {
        ActivatorError::InsufficientBalance { chain_id }
    } else {
        ActivatorError::Transport {
            chain_id,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ChainState for ChainProvider {
    async fn chain_id(&self) -> ActivatorResult<u64> {
        self.get_chain_id().await
    }

    async fn transaction_count(&self, account: Address) -> ActivatorResult<u64> {
        self.get_transaction_count(account).await
    }

    async fn fee_levels(&self) -> ActivatorResult<FeeLevels> {
        self.estimate_eip1559_fees().await
    }
}

#[async_trait]
impl Broadcaster for ChainProvider {
    async fn send_raw_transaction(&self, raw: &[u8]) -> ActivatorResult<H256> {
        self.send_raw(raw).await
    }
}
