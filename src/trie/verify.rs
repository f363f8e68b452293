//! Walk an extracted proof from a known root.
//!
//! Used as a self-check right after extraction so a path that does not
//! resolve to the receipt is never handed to the destination chain.

use super::TrieError;
use super::nibbles::{decode_compact, to_nibbles};
use crate::eth::{H256, keccak256};
use crate::rlp::{self, Item};

/// Resolve `key` against `root` using the ordered node list, returning the
/// stored value.
pub fn verify_proof(root: &H256, key: &[u8], proof: &[Vec<u8>]) -> Result<Vec<u8>, TrieError> {
    if proof.is_empty() {
        return Err(TrieError::EmptyProof);
    }

    let nibbles = to_nibbles(key);
    let mut pos = 0;
    // What the parent says the next node must be: its hash, or its raw
    // encoding when inlined.
    let mut expected = Reference::Hash(*root);

    for (index, encoded) in proof.iter().enumerate() {
        let matches = match &expected {
            Reference::Hash(hash) => keccak256(encoded) == *hash,
            Reference::Inline(raw) => raw == encoded,
            Reference::Empty => false,
        };
        if !matches {
            return Err(TrieError::HashMismatch { index });
        }

        let item = rlp::decode(encoded)?;
        let fields = item.as_list()?;
        let invalid = |reason: &str| TrieError::InvalidNode {
            index,
            reason: reason.to_string(),
        };

        let next = match fields.len() {
            17 => {
                if pos == nibbles.len() {
                    let value = fields[16].as_bytes()?;
                    if value.is_empty() {
                        return Err(TrieError::KeyNotFound);
                    }
                    return finish(index, proof.len(), value);
                }
                let child = &fields[nibbles[pos] as usize];
                pos += 1;
                child
            }
            2 => {
                let (path, is_leaf) = decode_compact(fields[0].as_bytes()?)
                    .ok_or_else(|| invalid("bad hex-prefix path"))?;
                if !nibbles[pos..].starts_with(&path) {
                    return Err(TrieError::KeyNotFound);
                }
                pos += path.len();
                if is_leaf {
                    if pos != nibbles.len() {
                        return Err(TrieError::KeyNotFound);
                    }
                    return finish(index, proof.len(), fields[1].as_bytes()?);
                }
                &fields[1]
            }
            _ => return Err(invalid("expected 2 or 17 items")),
        };

        expected = Reference::from_item(next).ok_or_else(|| invalid("bad child reference"))?;
        if let Reference::Empty = expected {
            return Err(TrieError::KeyNotFound);
        }
    }

    Err(TrieError::KeyNotFound)
}

fn finish(index: usize, len: usize, value: &[u8]) -> Result<Vec<u8>, TrieError> {
    if index + 1 != len {
        return Err(TrieError::TrailingNodes(len - index - 1));
    }
    Ok(value.to_vec())
}

enum Reference {
    Hash(H256),
    Inline(Vec<u8>),
    Empty,
}

impl Reference {
    fn from_item(item: &Item<'_>) -> Option<Self> {
        match item {
            Item::Bytes(b) if b.is_empty() => Some(Reference::Empty),
            Item::Bytes(b) => H256::from_slice(b).map(Reference::Hash),
            Item::List(_) => Some(Reference::Inline(reencode(item))),
        }
    }
}

/// Inline children arrive already decoded; re-encoding restores the exact
/// bytes because the decoder only accepts canonical input.
fn reencode(item: &Item<'_>) -> Vec<u8> {
    match item {
        Item::Bytes(b) => rlp::encode_bytes(b),
        Item::List(items) => {
            let encoded: Vec<Vec<u8>> = items.iter().map(reencode).collect();
            rlp::encode_list(&encoded)
        }
    }
}
