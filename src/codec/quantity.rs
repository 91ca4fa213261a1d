//! Canonical quantity and address formatting
//!
//! A quantity is serialized as its big-endian bytes with every leading zero
//! byte stripped, so zero becomes the empty string. Addresses are always the
//! full 20 bytes.

use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::{Address, U256};
use std::fmt;
use std::str::FromStr;

/// Non-negative integer of at most 256 bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(U256);

impl Quantity {
    pub const ZERO: Quantity = Quantity(U256([0; 4]));

    pub fn value(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Minimal big-endian encoding; zero maps to the empty string
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        let first = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
        buf[first..].to_vec()
    }

    /// Inverse of [`Quantity::encode`], rejecting non-canonical input
    pub fn decode(bytes: &[u8]) -> ActivatorResult<Self> {
        if bytes.len() > 32 {
            return Err(ActivatorError::Range(format!(
                "quantity of {} bytes exceeds 256 bits",
                bytes.len()
            )));
        }
        if bytes.first() == Some(&0) {
            return Err(ActivatorError::Range(
                "quantity has a leading zero byte".to_string(),
            ));
        }
        Ok(Self(U256::from_big_endian(bytes)))
    }

    pub fn checked_add(self, other: Quantity) -> ActivatorResult<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| ActivatorError::Range(format!("{} + {} overflows 256 bits", self, other)))
    }

    /// Narrow to u64, for values such as nonces and chain ids
    pub fn as_u64(&self) -> ActivatorResult<u64> {
        if self.0 > U256::from(u64::MAX) {
            return Err(ActivatorError::Range(format!("{} does not fit in u64", self)));
        }
        Ok(self.0.low_u64())
    }
}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Quantity {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Quantity {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl TryFrom<i128> for Quantity {
    type Error = ActivatorError;

    fn try_from(value: i128) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(ActivatorError::Range(format!(
                "quantity must be non-negative, got {}",
                value
            )));
        }
        Ok(Self(U256::from(value as u128)))
    }
}

impl FromStr for Quantity {
    type Err = ActivatorError;

    /// Parse a decimal or `0x`-prefixed hexadecimal integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(ActivatorError::Range(format!(
                "quantity must be non-negative, got {}",
                s
            )));
        }

        if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return parse_hex_quantity(digits);
        }

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ActivatorError::Range(format!("invalid decimal quantity: {:?}", s)));
        }
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|e| ActivatorError::Range(format!("invalid decimal quantity {}: {:?}", s, e)))
    }
}

fn parse_hex_quantity(digits: &str) -> ActivatorResult<Quantity> {
    if digits.is_empty() {
        return Err(ActivatorError::Range("empty hex quantity".to_string()));
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.len() > 64 {
        return Err(ActivatorError::Range(format!(
            "hex quantity 0x{} exceeds 256 bits",
            digits
        )));
    }

    let padded = if trimmed.len() % 2 == 1 {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| ActivatorError::Range(format!("invalid hex quantity 0x{}: {}", digits, e)))?;
    Ok(Quantity(U256::from_big_endian(&bytes)))
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a 20-byte address from hex, with or without `0x`
pub fn parse_address(s: &str) -> ActivatorResult<Address> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    if digits.len() != 40 {
        return Err(ActivatorError::Range(format!(
            "address must be 20 bytes (40 hex digits), got {:?}",
            s
        )));
    }

    let bytes = hex::decode(digits)
        .map_err(|e| ActivatorError::Range(format!("invalid address {:?}: {}", s, e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Address bytes as they appear in RLP: never stripped
pub fn encode_address(address: &Address) -> Vec<u8> {
    address.as_bytes().to_vec()
}
