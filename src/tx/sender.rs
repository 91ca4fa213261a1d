//! Activation sender: reads chain state, builds, and broadcasts once

use super::activation::{build_activation, ActivationPlan};
use super::envelope::SignedEnvelope;
use super::gas::GasEstimator;
use super::nonce::NonceSnapshot;
use crate::chain::{Broadcaster, ChainState};
use crate::codec::quantity::Quantity;
use crate::crypto::EcdsaSigner;
use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::{Address, H256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// What to activate and how to call it afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTarget {
    /// Chain id the configured network is expected to report
    pub expected_chain_id: u64,
    pub delegate: Address,
    pub calldata: Vec<u8>,
    pub gas_limit: Quantity,
    pub value: Quantity,
}

/// Outcome of a broadcast activation
#[derive(Debug, Clone)]
pub struct Activation {
    pub tx_hash: H256,
    pub envelope: SignedEnvelope,
}

/// Drives one activation attempt end to end
pub struct ActivationSender {
    /// Live chain reads
    chain: Arc<dyn ChainState>,
    /// Submission endpoint
    broadcaster: Arc<dyn Broadcaster>,
    /// Gas estimator
    gas_estimator: GasEstimator,
    /// Signer for both the authorization and the envelope
    signer: EcdsaSigner,
    /// Maximum time to wait for the node to accept the transaction
    send_timeout: Duration,
}

impl ActivationSender {
    /// Create a new activation sender
    pub fn new(
        chain: Arc<dyn ChainState>,
        broadcaster: Arc<dyn Broadcaster>,
        gas_estimator: GasEstimator,
        signer: EcdsaSigner,
        send_timeout: Duration,
    ) -> Self {
        info!("Activation sender initialized with EOA: {:?}", signer.address());

        Self {
            chain,
            broadcaster,
            gas_estimator,
            signer,
            send_timeout,
        }
    }

    /// Account being activated
    pub fn wallet_address(&self) -> Address {
        self.signer.address()
    }

    /// Read state, build the signed envelope, check the nonce held still
    pub async fn prepare(&self, target: &ActivationTarget) -> ActivatorResult<SignedEnvelope> {
        let chain_id = self.chain.chain_id().await?;
        if chain_id != target.expected_chain_id {
            return Err(ActivatorError::ChainMismatch {
                expected: target.expected_chain_id,
                actual: chain_id,
            });
        }
        info!("Chain ID: {}", chain_id);
        info!("EOA address: {:?}", self.wallet_address());
        info!("Setting code for EIP-7702 account at: {:?}", target.delegate);

        let snapshot = NonceSnapshot::take(self.chain.as_ref(), self.wallet_address()).await?;
        let fees = self.gas_estimator.get_fee_levels(self.chain.as_ref()).await?;

        let plan = ActivationPlan {
            chain_id,
            account_nonce: snapshot.tx_nonce(),
            fees,
            gas_limit: target.gas_limit,
            delegate: target.delegate,
            destination: None,
            value: target.value,
            data: target.calldata.clone(),
        };
        let envelope = build_activation(&plan, &self.signer)?;

        debug!(
            "Worst-case cost {} wei",
            GasEstimator::calculate_cost(target.gas_limit.value(), &fees)
        );

        snapshot.verify_unchanged(self.chain.as_ref()).await?;
        Ok(envelope)
    }

    /// Prepare and broadcast. No internal retries: a failed build may be
    /// redone from fresh chain state, an unknown broadcast must be checked first.
    pub async fn activate(&self, target: &ActivationTarget) -> ActivatorResult<Activation> {
        let envelope = self.prepare(target).await?;
        let tx_hash = self.broadcast(&envelope).await?;

        Ok(Activation { tx_hash, envelope })
    }

    /// Submit an already-signed envelope under the send timeout.
    ///
    /// A definite node rejection comes back as is. A timeout or transport
    /// failure after the bytes were handed over becomes `BroadcastUnknown`:
    /// the node may hold the transaction, so it must not be rebuilt blindly.
    pub async fn broadcast(&self, envelope: &SignedEnvelope) -> ActivatorResult<H256> {
        let local_hash = envelope.tx_hash();
        let result = timeout(
            self.send_timeout,
            self.broadcaster.send_raw_transaction(envelope.raw()),
        )
        .await;

        let tx_hash = match result {
            Ok(Ok(tx_hash)) => tx_hash,
            Ok(Err(ActivatorError::Transport { message, .. })) => {
                warn!("Transaction send failed, outcome unknown: {}", message);
                return Err(ActivatorError::BroadcastUnknown {
                    tx_hash: local_hash,
                    reason: message,
                });
            }
            Ok(Err(e)) => {
                warn!("Transaction rejected: {}", e);
                return Err(e);
            }
            Err(_) => {
                warn!("Transaction send timeout after {:?}", self.send_timeout);
                return Err(ActivatorError::BroadcastUnknown {
                    tx_hash: local_hash,
                    reason: format!("no response within {:?}", self.send_timeout),
                });
            }
        };

        if tx_hash != local_hash {
            warn!(
                "Node returned hash {:?}, locally computed {:?}",
                tx_hash, local_hash
            );
        }
        info!("tx sent: {:?}", tx_hash);

        Ok(tx_hash)
    }
}
