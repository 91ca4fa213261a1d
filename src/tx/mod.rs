//! Set-code transaction construction and submission

pub mod activation;
pub mod authorization;
pub mod envelope;
mod gas;
mod nonce;
mod sender;

pub use activation::{build_activation, ActivationPlan};
pub use authorization::Authorization;
pub use envelope::{AccessListItem, SignedEnvelope, UnsignedEnvelope, SET_CODE_TX_TYPE};
pub use gas::GasEstimator;
pub use nonce::NonceSnapshot;
pub use sender::{Activation, ActivationSender, ActivationTarget};
