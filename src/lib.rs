//! Setcode Activator - EIP-7702 account activation
//!
//! Builds a signed authorization delegating an externally owned account to a
//! contract, wraps it in a type-0x04 set-code transaction that calls the
//! delegated code, and broadcasts it.

pub mod chain;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod tx;

pub use error::{ActivatorError, ActivatorResult};
