//! secp256k1 signing over 32-byte digests

use crate::error::{ActivatorError, ActivatorResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature as EthSignature, H256, U256};
use lazy_static::lazy_static;
use std::fmt;

lazy_static! {
    /// Half the secp256k1 group order; canonical signatures have `s` at or below it
    static ref SECP256K1_HALF_ORDER: U256 = U256::from_big_endian(&[
        0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46,
        0x68, 0x1b, 0x20, 0xa0,
    ]);
}

/// Recovery parity of an ECDSA signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    /// Accepts both raw (0/1) and legacy offset (27/28) `v` values
    pub fn from_v(v: u64) -> ActivatorResult<Self> {
        match v {
            0 | 27 => Ok(Parity::Even),
            1 | 28 => Ok(Parity::Odd),
            other => Err(ActivatorError::Signing(format!(
                "unsupported signature v value {}",
                other
            ))),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }

    /// RLP byte-string form: empty for even, a single 0x01 for odd
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Parity::Even => Vec::new(),
            Parity::Odd => vec![0x01],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> ActivatorResult<Self> {
        match bytes {
            [] => Ok(Parity::Even),
            [0x01] => Ok(Parity::Odd),
            other => Err(ActivatorError::Decoding(format!(
                "y parity must be empty or 0x01, got 0x{}",
                hex::encode(other)
            ))),
        }
    }
}

/// An ECDSA signature with its recovery parity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: U256,
    pub s: U256,
    pub parity: Parity,
}

impl Signature {
    pub fn r_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.r.to_big_endian(&mut out);
        out
    }

    pub fn s_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.s.to_big_endian(&mut out);
        out
    }

    pub fn is_low_s(&self) -> bool {
        self.s <= *SECP256K1_HALF_ORDER
    }

    /// Recover the address whose key produced this signature over `digest`
    pub fn recover(&self, digest: H256) -> ActivatorResult<Address> {
        let sig = EthSignature {
            r: self.r,
            s: self.s,
            v: self.parity.as_u8() as u64 + 27,
        };
        sig.recover(digest)
            .map_err(|e| ActivatorError::Signing(format!("signature recovery failed: {}", e)))
    }
}

/// Holds the one private scalar used for both signing stages
#[derive(Clone)]
pub struct EcdsaSigner {
    wallet: LocalWallet,
}

impl EcdsaSigner {
    /// Parse a hex private key, with or without `0x`
    pub fn from_private_key(key: &str) -> ActivatorResult<Self> {
        let wallet = key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| ActivatorError::Wallet(format!("Invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    /// Load the key from an environment variable
    pub fn from_env(var: &str) -> ActivatorResult<Self> {
        let key = std::env::var(var).map_err(|_| {
            ActivatorError::Wallet(format!("No wallet configured. Set {}", var))
        })?;
        Self::from_private_key(&key)
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign a digest (RFC 6979 nonces, low-s normalized)
    pub fn sign(&self, digest: H256) -> ActivatorResult<Signature> {
        let sig = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| ActivatorError::Signing(e.to_string()))?;

        let signature = Signature {
            r: sig.r,
            s: sig.s,
            parity: Parity::from_v(sig.v)?,
        };
        if !signature.is_low_s() {
            return Err(ActivatorError::Signing(
                "signer produced a high-s signature".to_string(),
            ));
        }
        Ok(signature)
    }
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;

    const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn signer() -> EcdsaSigner {
        EcdsaSigner::from_private_key(HARDHAT_KEY).unwrap()
    }

    #[test]
    fn test_address_derivation() {
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(signer().address(), expected);

        let without_prefix = EcdsaSigner::from_private_key(&HARDHAT_KEY[2..]).unwrap();
        assert_eq!(without_prefix.address(), expected);
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            EcdsaSigner::from_private_key("0x1234"),
            Err(ActivatorError::Wallet(_))
        ));
        assert!(matches!(
            EcdsaSigner::from_private_key("not a key"),
            Err(ActivatorError::Wallet(_))
        ));
    }

    #[test]
    fn test_missing_env_key() {
        assert!(matches!(
            EcdsaSigner::from_env("SETCODE_ACTIVATOR_TEST_UNSET_KEY"),
            Err(ActivatorError::Wallet(_))
        ));
    }

    #[test]
    fn test_sign_is_deterministic_and_recoverable() {
        let signer = signer();
        let digest = keccak256(b"activate");

        let first = signer.sign(digest).unwrap();
        let second = signer.sign(digest).unwrap();
        assert_eq!(first, second);
        assert!(first.is_low_s());
        assert_eq!(first.recover(digest).unwrap(), signer.address());
    }

    #[test]
    fn test_different_digests_give_different_signatures() {
        let signer = signer();
        let a = signer.sign(keccak256(&[0x04])).unwrap();
        let b = signer.sign(keccak256(&[0x05])).unwrap();
        assert_ne!(a.r, b.r);
    }

    #[test]
    fn test_parity_bytes() {
        assert_eq!(Parity::Even.to_bytes(), Vec::<u8>::new());
        assert_eq!(Parity::Odd.to_bytes(), vec![0x01]);
        assert_eq!(Parity::from_bytes(&[]).unwrap(), Parity::Even);
        assert_eq!(Parity::from_bytes(&[0x01]).unwrap(), Parity::Odd);
        assert!(Parity::from_bytes(&[0x00]).is_err());
        assert!(Parity::from_bytes(&[0x1b]).is_err());
    }

    #[test]
    fn test_parity_from_v() {
        assert_eq!(Parity::from_v(27).unwrap(), Parity::Even);
        assert_eq!(Parity::from_v(28).unwrap(), Parity::Odd);
        assert_eq!(Parity::from_v(0).unwrap(), Parity::Even);
        assert_eq!(Parity::from_v(1).unwrap(), Parity::Odd);
        assert!(matches!(Parity::from_v(37), Err(ActivatorError::Signing(_))));
        assert!(matches!(Parity::from_v(2), Err(ActivatorError::Signing(_))));
    }

    #[test]
    fn test_fixed_width_components() {
        let sig = Signature {
            r: U256::from(1u64),
            s: U256::from(2u64),
            parity: Parity::Even,
        };
        let r = sig.r_bytes();
        assert_eq!(r[31], 1);
        assert_eq!(r[..31], [0u8; 31]);
        assert_eq!(sig.s_bytes()[31], 2);
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains(&HARDHAT_KEY[2..]));
        assert!(rendered.contains("EcdsaSigner"));
    }
}
