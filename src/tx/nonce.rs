//! Nonce snapshot for a single activation attempt
//!
//! The envelope nonce, and the authorization nonce derived from it, must
//! come from one read of the account's transaction count. The snapshot is
//! taken once and re-checked just before broadcast; a moved count aborts
//! the attempt.

use crate::chain::ChainState;
use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::Address;
use tracing::{debug, warn};

/// One observation of an account's transaction count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSnapshot {
    account: Address,
    tx_count: u64,
}

impl NonceSnapshot {
    /// Read the current transaction count for `account`
    pub async fn take(chain: &dyn ChainState, account: Address) -> ActivatorResult<Self> {
        let tx_count = chain.transaction_count(account).await?;
        debug!("Account {:?} transaction count {}", account, tx_count);
        Ok(Self { account, tx_count })
    }

    /// Nonce for the envelope (the current transaction count)
    pub fn tx_nonce(&self) -> u64 {
        self.tx_count
    }

    /// Fail with `NonceDrift` if the account sent anything since the snapshot
    pub async fn verify_unchanged(&self, chain: &dyn ChainState) -> ActivatorResult<()> {
        let observed = chain.transaction_count(self.account).await?;
        if observed != self.tx_count {
            warn!(
                "Nonce drift for {:?}: snapshot {}, now {}",
                self.account, self.tx_count, observed
            );
            return Err(ActivatorError::NonceDrift {
                expected: self.tx_count,
                observed,
            });
        }
        Ok(())
    }
}
