//! Byte-level encodings for the set-code transaction
//!
//! `quantity` holds the minimal big-endian integer form used for every
//! numeric field; `rlp` holds the recursive length prefix serializer.

pub mod quantity;
pub mod rlp;

pub use quantity::{encode_address, parse_address, Quantity};
pub use rlp::RlpItem;
