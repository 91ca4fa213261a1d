//! Hashing and signing primitives
//!
//! Keccak-256 is used for both the authorization pre-image and the envelope
//! signing payload; the ECDSA side lives in [`signer`].

pub mod signer;

pub use signer::{EcdsaSigner, Parity, Signature};

use ethers::types::H256;
use sha3::{Digest, Keccak256};

/// Keccak-256 digest of `data`
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(Keccak256::digest(data).as_slice())
}

/// Four-byte function selector for a canonical signature such as `initialize()`
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}
