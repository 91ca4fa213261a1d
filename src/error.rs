//! Error types for the set-code activator

use ethers::types::H256;
use thiserror::Error;

/// Main error type for the activator
#[derive(Error, Debug)]
pub enum ActivatorError {
    /// Negative, overflowing or malformed integer/address input
    #[error("Range error: {0}")]
    Range(String),

    /// An item shape the RLP encoder cannot represent
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Malformed or non-canonical RLP / envelope bytes
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Transport error for chain {chain_id}: {message}")]
    Transport { chain_id: u64, message: String },

    /// The signed bytes left the process but no answer came back; the
    /// transaction may be pending or mined under `tx_hash`
    #[error("Broadcast outcome unknown ({reason}), check tx {tx_hash:?} before rerunning")]
    BroadcastUnknown { tx_hash: H256, reason: String },

    #[error("Account nonce moved from {expected} to {observed} while building")]
    NonceDrift { expected: u64, observed: u64 },

    #[error("Nonce too low on chain {chain_id}")]
    NonceTooLow { chain_id: u64 },

    #[error("Insufficient balance on chain {chain_id}")]
    InsufficientBalance { chain_id: u64 },

    #[error("Connected to chain {actual}, configured network expects {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Wallet error: {0}")]
    Wallet(String),
}

impl ActivatorError {
    /// Check if error is retryable by the caller.
    ///
    /// Only failed reads qualify. Encoding and signing failures are caller
    /// bugs; a drifted or rejected nonce needs a fresh build; an unanswered
    /// broadcast may already be on chain.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivatorError::Transport { .. })
    }
}

/// Result type for activator operations
pub type ActivatorResult<T> = Result<T, ActivatorError>;
