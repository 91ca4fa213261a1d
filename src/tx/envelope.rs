//! Type 0x04 (set-code) transaction envelope
//!
//! Wire form:
//! `0x04 || rlp([chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas,
//! gas_limit, destination, value, data, access_list, authorization_list,
//! y_parity, r, s])`. The signature covers the same bytes without the last
//! three fields.

use super::authorization::Authorization;
use crate::codec::quantity::Quantity;
use crate::codec::rlp::{self, RlpItem};
use crate::crypto::{keccak256, EcdsaSigner, Parity, Signature};
use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::{Address, H256};
use tracing::debug;

/// EIP-2718 type byte of the set-code transaction
pub const SET_CODE_TX_TYPE: u8 = 0x04;

const PAYLOAD_FIELDS: usize = 10;
const SIGNED_FIELDS: usize = PAYLOAD_FIELDS + 3;

/// One access list entry: an address and the storage slots it touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

impl AccessListItem {
    fn rlp_item(&self) -> RlpItem {
        RlpItem::List(vec![
            self.address.into(),
            RlpItem::List(self.storage_keys.iter().map(|k| (*k).into()).collect()),
        ])
    }

    fn from_rlp_item(item: &RlpItem) -> ActivatorResult<Self> {
        let fields = item.expect_list("access list entry")?;
        if fields.len() != 2 {
            return Err(ActivatorError::Decoding(format!(
                "access list entry must have 2 fields, got {}",
                fields.len()
            )));
        }

        let address = decode_address(&fields[0], "access list address")?;
        let storage_keys = fields[1]
            .expect_list("storage keys")?
            .iter()
            .map(|key| {
                let bytes = key.expect_bytes("storage key")?;
                if bytes.len() != 32 {
                    return Err(ActivatorError::Decoding(format!(
                        "storage key must be 32 bytes, got {}",
                        bytes.len()
                    )));
                }
                Ok(H256::from_slice(bytes))
            })
            .collect::<ActivatorResult<Vec<_>>>()?;

        Ok(Self {
            address,
            storage_keys,
        })
    }
}

/// Every envelope field except the authorization list and signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEnvelope {
    pub chain_id: Quantity,
    pub nonce: Quantity,
    pub max_priority_fee_per_gas: Quantity,
    pub max_fee_per_gas: Quantity,
    pub gas_limit: Quantity,
    pub destination: Address,
    pub value: Quantity,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
}

fn payload_fields(unsigned: &UnsignedEnvelope, authorizations: &[Authorization]) -> Vec<RlpItem> {
    vec![
        unsigned.chain_id.into(),
        unsigned.nonce.into(),
        unsigned.max_priority_fee_per_gas.into(),
        unsigned.max_fee_per_gas.into(),
        unsigned.gas_limit.into(),
        unsigned.destination.into(),
        unsigned.value.into(),
        unsigned.data.clone().into(),
        RlpItem::List(unsigned.access_list.iter().map(AccessListItem::rlp_item).collect()),
        RlpItem::List(authorizations.iter().map(Authorization::rlp_item).collect()),
    ]
}

fn typed(payload: &RlpItem) -> Vec<u8> {
    let mut out = vec![SET_CODE_TX_TYPE];
    out.extend_from_slice(&payload.encode());
    out
}

/// `0x04 || rlp(payload fields)`, the bytes the sender signs
pub fn signing_payload(unsigned: &UnsignedEnvelope, authorizations: &[Authorization]) -> Vec<u8> {
    typed(&RlpItem::List(payload_fields(unsigned, authorizations)))
}

/// Build and sign an envelope carrying a single authorization
pub fn build(
    unsigned: UnsignedEnvelope,
    authorization: Authorization,
    signer: &EcdsaSigner,
) -> ActivatorResult<SignedEnvelope> {
    build_with_authorizations(unsigned, vec![authorization], signer)
}

/// Build and sign an envelope.
///
/// The result is immutable: changing any field means building a new one.
pub fn build_with_authorizations(
    unsigned: UnsignedEnvelope,
    authorizations: Vec<Authorization>,
    signer: &EcdsaSigner,
) -> ActivatorResult<SignedEnvelope> {
    if authorizations.is_empty() {
        return Err(ActivatorError::Encoding(
            "set-code transaction needs at least one authorization".to_string(),
        ));
    }

    let mut fields = payload_fields(&unsigned, &authorizations);
    let digest = keccak256(&typed(&RlpItem::List(fields.clone())));
    debug!("Envelope signing digest {:?} (nonce {})", digest, unsigned.nonce);

    let signature = signer.sign(digest)?;

    fields.push(signature.parity.into());
    fields.push(Quantity::from(signature.r).into());
    fields.push(Quantity::from(signature.s).into());
    let raw = typed(&RlpItem::List(fields));

    Ok(SignedEnvelope {
        unsigned,
        authorizations,
        signature,
        raw,
    })
}

/// A signed set-code transaction and its serialized bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    unsigned: UnsignedEnvelope,
    authorizations: Vec<Authorization>,
    signature: Signature,
    raw: Vec<u8>,
}

impl SignedEnvelope {
    pub fn unsigned(&self) -> &UnsignedEnvelope {
        &self.unsigned
    }

    pub fn authorizations(&self) -> &[Authorization] {
        &self.authorizations
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Bytes ready for `eth_sendRawTransaction`
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    /// Transaction hash a node reports for these bytes
    pub fn tx_hash(&self) -> H256 {
        keccak256(&self.raw)
    }

    pub fn signing_hash(&self) -> H256 {
        keccak256(&signing_payload(&self.unsigned, &self.authorizations))
    }

    /// Recover the sending account from the envelope signature
    pub fn sender(&self) -> ActivatorResult<Address> {
        self.signature.recover(self.signing_hash())
    }

    /// Parse a serialized set-code transaction, rejecting non-canonical forms
    pub fn decode(raw: &[u8]) -> ActivatorResult<Self> {
        match raw.first() {
            Some(&SET_CODE_TX_TYPE) => {}
            Some(other) => {
                return Err(ActivatorError::Decoding(format!(
                    "expected transaction type 0x04, got 0x{:02x}",
                    other
                )))
            }
            None => return Err(ActivatorError::Decoding("empty transaction".to_string())),
        }

        let item = rlp::decode(&raw[1..])?;
        let fields = item.expect_list("transaction")?;
        if fields.len() != SIGNED_FIELDS {
            return Err(ActivatorError::Decoding(format!(
                "set-code transaction must have {} fields, got {}",
                SIGNED_FIELDS,
                fields.len()
            )));
        }

        let quantity = |index: usize, what: &str| -> ActivatorResult<Quantity> {
            Quantity::decode(fields[index].expect_bytes(what)?)
        };

        let unsigned = UnsignedEnvelope {
            chain_id: quantity(0, "chain id")?,
            nonce: quantity(1, "nonce")?,
            max_priority_fee_per_gas: quantity(2, "max priority fee")?,
            max_fee_per_gas: quantity(3, "max fee")?,
            gas_limit: quantity(4, "gas limit")?,
            destination: decode_address(&fields[5], "destination")?,
            value: quantity(6, "value")?,
            data: fields[7].expect_bytes("data")?.to_vec(),
            access_list: fields[8]
                .expect_list("access list")?
                .iter()
                .map(AccessListItem::from_rlp_item)
                .collect::<ActivatorResult<Vec<_>>>()?,
        };

        let authorizations = fields[9]
            .expect_list("authorization list")?
            .iter()
            .map(Authorization::from_rlp_item)
            .collect::<ActivatorResult<Vec<_>>>()?;
        if authorizations.is_empty() {
            return Err(ActivatorError::Decoding(
                "authorization list is empty".to_string(),
            ));
        }

        let signature = Signature {
            parity: Parity::from_bytes(fields[10].expect_bytes("y parity")?)?,
            r: quantity(11, "r")?.value(),
            s: quantity(12, "s")?.value(),
        };

        Ok(Self {
            unsigned,
            authorizations,
            signature,
            raw: raw.to_vec(),
        })
    }
}

fn decode_address(item: &RlpItem, what: &str) -> ActivatorResult<Address> {
    let bytes = item.expect_bytes(what)?;
    if bytes.len() != 20 {
        return Err(ActivatorError::Decoding(format!(
            "{} must be 20 bytes, got {}",
            what,
            bytes.len()
        )));
    }
    Ok(Address::from_slice(bytes))
}
