//! Recursive length-prefix encoding
//!
//! Only the two item shapes the set-code envelope needs: byte strings and
//! (nested) lists. Integers must be turned into byte strings through
//! [`Quantity`] before they reach the encoder.

use super::quantity::{encode_address, Quantity};
use crate::crypto::signer::Parity;
use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::{Address, H256};
use serde_json::Value;

const STRING_SHORT: u8 = 0x80;
const STRING_LONG: u8 = 0xb7;
const LIST_SHORT: u8 = 0xc0;
const LIST_LONG: u8 = 0xf7;
const MAX_SHORT_LEN: usize = 55;
/// Deepest list nesting the decoder accepts; a set-code transaction needs 4
const MAX_DEPTH: usize = 16;

/// An encodable item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::Bytes(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::Bytes(_) => None,
            RlpItem::List(items) => Some(items),
        }
    }

    /// Byte-string payload, or a decoding error naming the field
    pub fn expect_bytes(&self, what: &str) -> ActivatorResult<&[u8]> {
        self.as_bytes()
            .ok_or_else(|| ActivatorError::Decoding(format!("{} must be a byte string", what)))
    }

    pub fn expect_list(&self, what: &str) -> ActivatorResult<&[RlpItem]> {
        self.as_list()
            .ok_or_else(|| ActivatorError::Decoding(format!("{} must be a list", what)))
    }

    /// Encode this item into a fresh buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            RlpItem::Bytes(bytes) => {
                if bytes.len() == 1 && bytes[0] < STRING_SHORT {
                    out.push(bytes[0]);
                } else {
                    encode_header(bytes.len(), STRING_SHORT, STRING_LONG, out);
                    out.extend_from_slice(bytes);
                }
            }
            RlpItem::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_into(&mut payload);
                }
                // The prefix carries the payload byte length, not the item count
                encode_header(payload.len(), LIST_SHORT, LIST_LONG, out);
                out.extend_from_slice(&payload);
            }
        }
    }
}

fn encode_header(len: usize, short_base: u8, long_base: u8, out: &mut Vec<u8>) {
    if len <= MAX_SHORT_LEN {
        out.push(short_base + len as u8);
    } else {
        let len_bytes = encode_length(len);
        out.push(long_base + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[leading_zeros..].to_vec()
}

/// Encode an item
pub fn encode(item: &RlpItem) -> Vec<u8> {
    item.encode()
}

/// Encode a loosely-typed JSON item made of `0x` hex strings and arrays
pub fn encode_json(value: &Value) -> ActivatorResult<Vec<u8>> {
    let item = RlpItem::try_from(value)?;
    Ok(item.encode())
}

/// Decode exactly one canonical item spanning all of `input`
pub fn decode(input: &[u8]) -> ActivatorResult<RlpItem> {
    let (item, consumed) = decode_item(input, 0)?;
    if consumed != input.len() {
        return Err(ActivatorError::Decoding(format!(
            "{} trailing bytes after RLP item",
            input.len() - consumed
        )));
    }
    Ok(item)
}

fn decode_item(input: &[u8], depth: usize) -> ActivatorResult<(RlpItem, usize)> {
    let prefix = *input
        .first()
        .ok_or_else(|| ActivatorError::Decoding("unexpected end of input".to_string()))?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![prefix]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - STRING_SHORT) as usize;
            let payload = slice(input, 1, len)?;
            if len == 1 && payload[0] < STRING_SHORT {
                return Err(ActivatorError::Decoding(format!(
                    "single byte 0x{:02x} must be encoded as itself",
                    payload[0]
                )));
            }
            Ok((RlpItem::Bytes(payload.to_vec()), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - STRING_LONG) as usize;
            let len = decode_long_length(input, len_of_len)?;
            let payload = slice(input, 1 + len_of_len, len)?;
            Ok((RlpItem::Bytes(payload.to_vec()), 1 + len_of_len + len))
        }
        0xc0..=0xff if depth >= MAX_DEPTH => Err(ActivatorError::Decoding(format!(
            "lists nested deeper than {} levels",
            MAX_DEPTH
        ))),
        0xc0..=0xf7 => {
            let len = (prefix - LIST_SHORT) as usize;
            let payload = slice(input, 1, len)?;
            Ok((RlpItem::List(decode_list_payload(payload, depth + 1)?), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = (prefix - LIST_LONG) as usize;
            let len = decode_long_length(input, len_of_len)?;
            let payload = slice(input, 1 + len_of_len, len)?;
            Ok((
                RlpItem::List(decode_list_payload(payload, depth + 1)?),
                1 + len_of_len + len,
            ))
        }
    }
}

fn decode_list_payload(mut payload: &[u8], depth: usize) -> ActivatorResult<Vec<RlpItem>> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_item(payload, depth)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

fn decode_long_length(input: &[u8], len_of_len: usize) -> ActivatorResult<usize> {
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(ActivatorError::Decoding(format!(
            "length of {} bytes is too large",
            len_of_len
        )));
    }
    let len_bytes = slice(input, 1, len_of_len)?;
    if len_bytes[0] == 0 {
        return Err(ActivatorError::Decoding(
            "long-form length has a leading zero byte".to_string(),
        ));
    }

    let len = len_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len <= MAX_SHORT_LEN {
        return Err(ActivatorError::Decoding(format!(
            "length {} must use the short form",
            len
        )));
    }
    Ok(len)
}

fn slice(input: &[u8], start: usize, len: usize) -> ActivatorResult<&[u8]> {
    let end = start
        .checked_add(len)
        .filter(|end| *end <= input.len())
        .ok_or_else(|| {
            ActivatorError::Decoding(format!(
                "item needs {} bytes at offset {}, only {} available",
                len,
                start,
                input.len().saturating_sub(start)
            ))
        })?;
    Ok(&input[start..end])
}

impl From<Vec<u8>> for RlpItem {
    fn from(bytes: Vec<u8>) -> Self {
        RlpItem::Bytes(bytes)
    }
}

impl From<&[u8]> for RlpItem {
    fn from(bytes: &[u8]) -> Self {
        RlpItem::Bytes(bytes.to_vec())
    }
}

impl From<Quantity> for RlpItem {
    fn from(quantity: Quantity) -> Self {
        RlpItem::Bytes(quantity.encode())
    }
}

impl From<Address> for RlpItem {
    fn from(address: Address) -> Self {
        RlpItem::Bytes(encode_address(&address))
    }
}

impl From<H256> for RlpItem {
    fn from(hash: H256) -> Self {
        RlpItem::Bytes(hash.as_bytes().to_vec())
    }
}

impl From<Parity> for RlpItem {
    fn from(parity: Parity) -> Self {
        RlpItem::Bytes(parity.to_bytes())
    }
}

impl From<Vec<RlpItem>> for RlpItem {
    fn from(items: Vec<RlpItem>) -> Self {
        RlpItem::List(items)
    }
}

impl TryFrom<&Value> for RlpItem {
    type Error = ActivatorError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => {
                let digits = s.strip_prefix("0x").ok_or_else(|| {
                    ActivatorError::Encoding(format!("string {:?} is not 0x-prefixed hex", s))
                })?;
                let bytes = hex::decode(digits).map_err(|e| {
                    ActivatorError::Encoding(format!("string {:?} is not valid hex: {}", s, e))
                })?;
                Ok(RlpItem::Bytes(bytes))
            }
            Value::Array(items) => items
                .iter()
                .map(RlpItem::try_from)
                .collect::<ActivatorResult<Vec<_>>>()
                .map(RlpItem::List),
            Value::Number(n) => Err(ActivatorError::Encoding(format!(
                "raw number {} must be converted to a quantity byte string first",
                n
            ))),
            Value::Bool(b) => Err(ActivatorError::Encoding(format!(
                "boolean {} has no RLP representation",
                b
            ))),
            Value::Null => Err(ActivatorError::Encoding(
                "null has no RLP representation".to_string(),
            )),
            Value::Object(_) => Err(ActivatorError::Encoding(
                "objects have no RLP representation".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(b: &[u8]) -> RlpItem {
        RlpItem::Bytes(b.to_vec())
    }

    #[test]
    fn test_single_byte_is_itself() {
        assert_eq!(bytes(&[0x00]).encode(), vec![0x00]);
        assert_eq!(bytes(&[0x7f]).encode(), vec![0x7f]);
        assert_eq!(bytes(&[0x80]).encode(), vec![0x81, 0x80]);
    }

    #[test]
    fn test_short_strings() {
        assert_eq!(bytes(&[]).encode(), vec![0x80]);
        assert_eq!(bytes(b"dog").encode(), vec![0x83, b'd', b'o', b'g']);

        let s55 = vec![0xaa; 55];
        let encoded = RlpItem::Bytes(s55.clone()).encode();
        assert_eq!(encoded[0], 0x80 + 55);
        assert_eq!(&encoded[1..], &s55[..]);
    }

    #[test]
    fn test_long_strings() {
        let s56 = vec![0xbb; 56];
        let encoded = RlpItem::Bytes(s56).encode();
        assert_eq!(&encoded[..2], &[0xb8, 56]);
        assert_eq!(encoded.len(), 58);

        let s1024 = vec![0xcc; 1024];
        let encoded = RlpItem::Bytes(s1024).encode();
        assert_eq!(&encoded[..3], &[0xb9, 0x04, 0x00]);
        assert_eq!(encoded.len(), 1027);
    }

    #[test]
    fn test_lists() {
        assert_eq!(RlpItem::List(vec![]).encode(), vec![0xc0]);

        let cat_dog = RlpItem::List(vec![bytes(b"cat"), bytes(b"dog")]);
        assert_eq!(
            cat_dog.encode(),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );

        // [ [], [[]], [ [], [[]] ] ]
        let set_theory = RlpItem::List(vec![
            RlpItem::List(vec![]),
            RlpItem::List(vec![RlpItem::List(vec![])]),
            RlpItem::List(vec![
                RlpItem::List(vec![]),
                RlpItem::List(vec![RlpItem::List(vec![])]),
            ]),
        ]);
        assert_eq!(
            set_theory.encode(),
            vec![0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0]
        );
    }

    #[test]
    fn test_long_list_prefix_is_payload_length() {
        // 20 items of 3 encoded bytes each: 60 byte payload, 20 items
        let items = (0..20).map(|_| bytes(&[0x81, 0x82])).collect();
        let encoded = RlpItem::List(items).encode();
        assert_eq!(&encoded[..2], &[0xf8, 60]);
        assert_eq!(encoded.len(), 62);
    }

    #[test]
    fn test_quantities_and_addresses() {
        assert_eq!(RlpItem::from(Quantity::ZERO).encode(), vec![0x80]);
        assert_eq!(RlpItem::from(Quantity::from(1u64)).encode(), vec![0x01]);
        assert_eq!(RlpItem::from(Quantity::from(1024u64)).encode(), vec![0x82, 0x04, 0x00]);

        let encoded = RlpItem::from(Address::zero()).encode();
        assert_eq!(encoded.len(), 21);
        assert_eq!(encoded[0], 0x94);
    }

    #[test]
    fn test_decode_reencode_is_identical() {
        let samples: Vec<Vec<u8>> = vec![
            vec![0x80],
            vec![0x7f],
            vec![0xc0],
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g'],
            vec![0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0],
            RlpItem::Bytes(vec![0x11; 300]).encode(),
            RlpItem::List(vec![RlpItem::Bytes(vec![0x22; 70]), bytes(&[])]).encode(),
        ];

        for sample in samples {
            let decoded = decode(&sample).unwrap();
            assert_eq!(decoded.encode(), sample);
        }
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        // 0x05 wrapped as a one-byte string
        assert!(matches!(decode(&[0x81, 0x05]), Err(ActivatorError::Decoding(_))));
        // short string written in long form
        assert!(matches!(
            decode(&[0xb8, 0x02, 0xaa, 0xbb]),
            Err(ActivatorError::Decoding(_))
        ));
        // long-form length with a leading zero
        let mut padded = vec![0xb9, 0x00, 0x38];
        padded.extend(vec![0xaa; 56]);
        assert!(matches!(decode(&padded), Err(ActivatorError::Decoding(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_and_trailing() {
        assert!(matches!(decode(&[]), Err(ActivatorError::Decoding(_))));
        assert!(matches!(decode(&[0x83, b'd', b'o']), Err(ActivatorError::Decoding(_))));
        assert!(matches!(decode(&[0xc2, 0x01]), Err(ActivatorError::Decoding(_))));
        assert!(matches!(decode(&[0x01, 0x02]), Err(ActivatorError::Decoding(_))));
    }

    fn nested_lists(levels: usize) -> Vec<u8> {
        let mut bytes = vec![0xc0];
        for _ in 1..levels {
            let mut wrapped = Vec::with_capacity(bytes.len() + 9);
            encode_header(bytes.len(), LIST_SHORT, LIST_LONG, &mut wrapped);
            wrapped.extend_from_slice(&bytes);
            bytes = wrapped;
        }
        bytes
    }

    #[test]
    fn test_decode_nesting_limit() {
        assert!(decode(&nested_lists(MAX_DEPTH)).is_ok());
        assert!(matches!(
            decode(&nested_lists(MAX_DEPTH + 1)),
            Err(ActivatorError::Decoding(_))
        ));
    }

    #[test]
    fn test_deeply_nested_input_is_rejected_not_overflowed() {
        let hostile = nested_lists(5_000);
        assert!(hostile[0] >= 0xf8);
        assert!(matches!(decode(&hostile), Err(ActivatorError::Decoding(_))));
    }

    #[test]
    fn test_json_items() {
        let value = json!(["0x", "0x01", ["0xdeadbeef", []]]);
        let encoded = encode_json(&value).unwrap();
        assert_eq!(
            encoded,
            vec![0xc9, 0x80, 0x01, 0xc6, 0x84, 0xde, 0xad, 0xbe, 0xef, 0xc0]
        );
    }

    #[test]
    fn test_json_scalars_are_encoding_errors() {
        for value in [
            json!(5),
            json!(true),
            json!(null),
            json!({"a": "0x01"}),
            json!("hello"),
            json!(["0x01", 2]),
        ] {
            assert!(
                matches!(encode_json(&value), Err(ActivatorError::Encoding(_))),
                "expected encoding error for {}",
                value
            );
        }
    }
}
