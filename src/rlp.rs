//! Recursive Length Prefix codec
//!
//! Canonical Ethereum RLP: every header, receipt, log and trie node that ends
//! up in a [`crate::proof::LockProof`] goes through this module, so the output
//! must be byte-exact with what the destination light client re-hashes.
//!
//! Encoding works on already-encoded items: build a list by encoding each
//! element and passing the slice to [`encode_list`].

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("Input is empty")]
    Empty,

    #[error("Item length {declared} exceeds remaining input {available}")]
    Truncated { declared: usize, available: usize },

    #[error("Non-canonical encoding: {0}")]
    NonCanonical(&'static str),

    #[error("Trailing bytes after item: {0}")]
    TrailingBytes(usize),

    #[error("Expected {0}")]
    UnexpectedShape(&'static str),
}

/// Encode a byte string.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = encode_header(0x80, bytes.len());
    out.extend_from_slice(bytes);
    out
}

/// Encode an unsigned integer as its minimal big-endian byte string.
///
/// Zero encodes as the empty string (`0x80`).
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(&trim_leading_zeros(&value.to_be_bytes()))
}

/// Encode a big-endian unsigned integer of arbitrary width.
pub fn encode_uint(be_bytes: &[u8]) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(be_bytes))
}

/// Wrap already-encoded items into a list.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = encode_header(0xc0, payload_len);
    out.reserve(payload_len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

pub(crate) fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        return vec![offset + len as u8];
    }
    let len_bytes = (len as u64).to_be_bytes();
    let len_bytes = trim_leading_zeros(&len_bytes);
    let mut out = Vec::with_capacity(1 + len_bytes.len() + len);
    out.push(offset + 55 + len_bytes.len() as u8);
    out.extend_from_slice(len_bytes);
    out
}

/// A decoded RLP item borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item<'a> {
    Bytes(&'a [u8]),
    List(Vec<Item<'a>>),
}

impl<'a> Item<'a> {
    pub fn as_bytes(&self) -> Result<&'a [u8], RlpError> {
        match self {
            Item::Bytes(b) => Ok(b),
            Item::List(_) => Err(RlpError::UnexpectedShape("byte string")),
        }
    }

    pub fn as_list(&self) -> Result<&[Item<'a>], RlpError> {
        match self {
            Item::List(items) => Ok(items),
            Item::Bytes(_) => Err(RlpError::UnexpectedShape("list")),
        }
    }
}

/// Decode exactly one item spanning the whole input.
pub fn decode(input: &[u8]) -> Result<Item<'_>, RlpError> {
    let (item, consumed) = decode_item(input)?;
    if consumed != input.len() {
        return Err(RlpError::TrailingBytes(input.len() - consumed));
    }
    Ok(item)
}

/// Decode one item from the front of `input`, returning it with the number of
/// bytes it occupied (header included).
pub fn decode_item(input: &[u8]) -> Result<(Item<'_>, usize), RlpError> {
    let prefix = *input.first().ok_or(RlpError::Empty)?;
    match prefix {
        0x00..=0x7f => Ok((Item::Bytes(&input[..1]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let body = take(input, 1, len)?;
            if len == 1 && body[0] < 0x80 {
                return Err(RlpError::NonCanonical("single byte below 0x80 with prefix"));
            }
            Ok((Item::Bytes(body), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            let len = read_long_length(input, len_of_len)?;
            let body = take(input, 1 + len_of_len, len)?;
            Ok((Item::Bytes(body), 1 + len_of_len + len))
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let body = take(input, 1, len)?;
            Ok((Item::List(decode_list_payload(body)?), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            let len = read_long_length(input, len_of_len)?;
            let body = take(input, 1 + len_of_len, len)?;
            Ok((Item::List(decode_list_payload(body)?), 1 + len_of_len + len))
        }
    }
}

fn decode_list_payload(mut payload: &[u8]) -> Result<Vec<Item<'_>>, RlpError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, used) = decode_item(payload)?;
        items.push(item);
        payload = &payload[used..];
    }
    Ok(items)
}

fn read_long_length(input: &[u8], len_of_len: usize) -> Result<usize, RlpError> {
    let raw = take(input, 1, len_of_len)?;
    if raw[0] == 0 {
        return Err(RlpError::NonCanonical("length with leading zero"));
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::NonCanonical("length does not fit usize"));
    }
    let len = raw.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len < 56 {
        return Err(RlpError::NonCanonical("long form used for short payload"));
    }
    Ok(len)
}

fn take(input: &[u8], offset: usize, len: usize) -> Result<&[u8], RlpError> {
    let available = input.len().saturating_sub(offset);
    if len > available {
        return Err(RlpError::Truncated {
            declared: len,
            available,
        });
    }
    Ok(&input[offset..offset + len])
}
