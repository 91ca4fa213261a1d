//! Pure activation build: chain state in, signed set-code transaction out

use super::authorization;
use super::envelope::{self, SignedEnvelope, UnsignedEnvelope};
use crate::chain::FeeLevels;
use crate::codec::quantity::Quantity;
use crate::crypto::EcdsaSigner;
use crate::error::ActivatorResult;

use ethers::types::Address;
use tracing::debug;

/// Everything a build needs, read from the chain and configuration up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPlan {
    pub chain_id: u64,
    /// The signer's current transaction count
    pub account_nonce: u64,
    pub fees: FeeLevels,
    pub gas_limit: Quantity,
    /// Contract whose code the account delegates to
    pub delegate: Address,
    /// Call target; `None` means the signer's own (now delegated) account
    pub destination: Option<Address>,
    pub value: Quantity,
    pub data: Vec<u8>,
}

/// Build the signed authorization and the envelope carrying it.
///
/// The authorization is signed for `account_nonce + 1` because the envelope,
/// sent from the same account with `account_nonce`, bumps the nonce before
/// the authorization is checked.
pub fn build_activation(plan: &ActivationPlan, signer: &EcdsaSigner) -> ActivatorResult<SignedEnvelope> {
    let chain_id = Quantity::from(plan.chain_id);
    let tx_nonce = Quantity::from(plan.account_nonce);
    let auth_nonce = authorization::self_sponsored_nonce(tx_nonce)?;

    let auth = authorization::build(chain_id, plan.delegate, auth_nonce, signer)?;

    let unsigned = UnsignedEnvelope {
        chain_id,
        nonce: tx_nonce,
        max_priority_fee_per_gas: plan.fees.max_priority_fee_per_gas.into(),
        max_fee_per_gas: plan.fees.max_fee_per_gas.into(),
        gas_limit: plan.gas_limit,
        destination: plan.destination.unwrap_or_else(|| signer.address()),
        value: plan.value,
        data: plan.data.clone(),
        access_list: Vec::new(),
    };

    let signed = envelope::build(unsigned, auth, signer)?;
    debug!(
        "Built set-code transaction {:?} (nonce {}, authorization nonce {})",
        signed.tx_hash(),
        tx_nonce,
        auth_nonce
    );
    Ok(signed)
}
