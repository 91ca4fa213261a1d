//! EIP-7702 authorization tuples
//!
//! The signer commits to `0x05 || rlp([chain_id, address, nonce])`. The nonce
//! is the one the account will have *after* the carrying transaction bumps
//! it, so for a self-sponsored activation it is the transaction nonce plus one.

use crate::codec::quantity::Quantity;
use crate::codec::rlp::RlpItem;
use crate::crypto::{keccak256, EcdsaSigner, Parity, Signature};
use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::{Address, H256};
use tracing::debug;

/// Domain-separation byte for authorization pre-images
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// A signed delegation of the signer's code to `address`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    pub chain_id: Quantity,
    pub address: Address,
    pub nonce: Quantity,
    pub signature: Signature,
}

/// `0x05 || rlp([chain_id, address, nonce])`
pub fn preimage(chain_id: Quantity, address: Address, nonce: Quantity) -> Vec<u8> {
    let payload = RlpItem::List(vec![chain_id.into(), address.into(), nonce.into()]);
    let mut out = vec![AUTHORIZATION_MAGIC];
    out.extend_from_slice(&payload.encode());
    out
}

pub fn signing_hash(chain_id: Quantity, address: Address, nonce: Quantity) -> H256 {
    keccak256(&preimage(chain_id, address, nonce))
}

/// Authorization nonce for an account that sends its own set-code
/// transaction with `tx_nonce`
pub fn self_sponsored_nonce(tx_nonce: Quantity) -> ActivatorResult<Quantity> {
    tx_nonce.checked_add(Quantity::from(1u64))
}

/// Build and sign an authorization.
///
/// A signing failure is final for this authorization; the caller rebuilds
/// from fresh chain state rather than retrying with the same nonce.
pub fn build(
    chain_id: Quantity,
    delegate: Address,
    nonce: Quantity,
    signer: &EcdsaSigner,
) -> ActivatorResult<Authorization> {
    let digest = signing_hash(chain_id, delegate, nonce);
    debug!(
        "Authorization digest {:?} (chain {}, delegate {:?}, nonce {})",
        digest, chain_id, delegate, nonce
    );

    let signature = signer.sign(digest)?;

    Ok(Authorization {
        chain_id,
        address: delegate,
        nonce,
        signature,
    })
}

impl Authorization {
    pub fn signing_hash(&self) -> H256 {
        signing_hash(self.chain_id, self.address, self.nonce)
    }

    /// Address of the account that signed this authorization
    pub fn authority(&self) -> ActivatorResult<Address> {
        self.signature.recover(self.signing_hash())
    }

    /// `[chain_id, address, nonce, y_parity, r, s]` as carried in the envelope
    pub fn rlp_item(&self) -> RlpItem {
        RlpItem::List(vec![
            self.chain_id.into(),
            self.address.into(),
            self.nonce.into(),
            self.signature.parity.into(),
            Quantity::from(self.signature.r).into(),
            Quantity::from(self.signature.s).into(),
        ])
    }

    pub fn from_rlp_item(item: &RlpItem) -> ActivatorResult<Self> {
        let fields = item.expect_list("authorization")?;
        if fields.len() != 6 {
            return Err(ActivatorError::Decoding(format!(
                "authorization must have 6 fields, got {}",
                fields.len()
            )));
        }

        let address = fields[1].expect_bytes("authorization address")?;
        if address.len() != 20 {
            return Err(ActivatorError::Decoding(format!(
                "authorization address must be 20 bytes, got {}",
                address.len()
            )));
        }

        Ok(Self {
            chain_id: Quantity::decode(fields[0].expect_bytes("authorization chain id")?)?,
            address: Address::from_slice(address),
            nonce: Quantity::decode(fields[2].expect_bytes("authorization nonce")?)?,
            signature: Signature {
                parity: Parity::from_bytes(fields[3].expect_bytes("authorization y parity")?)?,
                r: Quantity::decode(fields[4].expect_bytes("authorization r")?)?.value(),
                s: Quantity::decode(fields[5].expect_bytes("authorization s")?)?.value(),
            },
        })
    }
}
