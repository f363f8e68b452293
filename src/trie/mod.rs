//! Ordered Merkle-Patricia trie
//!
//! Built once from the complete key/value set of a block (receipts keyed by
//! `rlp(transactionIndex)`), then queried for its root hash and for the path
//! of nodes leading to one key. The root must equal the `receiptsRoot`
//! committed in the block header for a proof to be usable.

pub mod nibbles;
pub mod node;
pub mod verify;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::eth::{H256, keccak256};
use crate::rlp::RlpError;
use nibbles::{common_prefix_len, to_nibbles};
pub use node::Node;
pub use verify::verify_proof;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("Proof is empty")]
    EmptyProof,

    #[error("Node {index} does not match the reference held by its parent")]
    HashMismatch { index: usize },

    #[error("Malformed trie node at position {index}: {reason}")]
    InvalidNode { index: usize, reason: String },

    #[error("Key not present in trie")]
    KeyNotFound,

    #[error("Proof has {0} trailing node(s) after the value was reached")]
    TrailingNodes(usize),

    #[error("RLP error: {0}")]
    Rlp(#[from] RlpError),
}

/// Immutable trie over a fixed entry set.
#[derive(Debug, Clone)]
pub struct PatriciaTrie {
    root: Node,
}

impl PatriciaTrie {
    /// Build from key/value pairs. Later duplicates of a key replace earlier
    /// ones.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: Into<Vec<u8>>,
    {
        let sorted: BTreeMap<Vec<u8>, Vec<u8>> = entries
            .into_iter()
            .map(|(k, v)| (to_nibbles(k.as_ref()), v.into()))
            .collect();
        let items: Vec<(Vec<u8>, Vec<u8>)> = sorted.into_iter().collect();
        Self {
            root: build(&items, 0),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Keccak hash of the encoded root node. The root is always hashed, even
    /// when its encoding is shorter than 32 bytes.
    pub fn root_hash(&self) -> H256 {
        keccak256(&self.root.encode())
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let path = self.walk(key)?;
        match path.last()? {
            Node::Leaf { value, .. } => Some(value),
            Node::Branch { value, .. } => value.as_deref(),
            _ => None,
        }
    }

    /// Every node from the root to the node holding `key`, each RLP-encoded.
    /// Inline children are listed as nodes of their own.
    pub fn proof(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, TrieError> {
        let path = self.walk(key).ok_or(TrieError::KeyNotFound)?;
        Ok(path.into_iter().map(Node::encode).collect())
    }

    fn walk(&self, key: &[u8]) -> Option<Vec<&Node>> {
        let nibbles = to_nibbles(key);
        let mut pos = 0;
        let mut node = &self.root;
        let mut stack = Vec::new();

        loop {
            stack.push(node);
            match node {
                Node::Empty => return None,
                Node::Leaf { path, .. } => {
                    return (nibbles[pos..] == path[..]).then_some(stack);
                }
                Node::Extension { path, child } => {
                    if !nibbles[pos..].starts_with(path) {
                        return None;
                    }
                    pos += path.len();
                    node = &**child;
                }
                Node::Branch { children, value } => {
                    if pos == nibbles.len() {
                        return value.is_some().then_some(stack);
                    }
                    node = &children[nibbles[pos] as usize];
                    pos += 1;
                }
            }
        }
    }
}

/// Build the subtrie for `items` (sorted, unique nibble keys) below `depth`.
fn build(items: &[(Vec<u8>, Vec<u8>)], depth: usize) -> Node {
    match items {
        [] => Node::Empty,
        [(key, value)] => Node::Leaf {
            path: key[depth..].to_vec(),
            value: value.clone(),
        },
        [(first, _), .., (last, _)] => {
            // Sorted input: the prefix shared by the extremes is shared by all.
            let shared = common_prefix_len(&first[depth..], &last[depth..]);
            if shared > 0 {
                return Node::Extension {
                    path: first[depth..depth + shared].to_vec(),
                    child: Box::new(build(items, depth + shared)),
                };
            }

            let mut value = None;
            let mut groups: [Vec<(Vec<u8>, Vec<u8>)>; 16] = Default::default();
            for (key, v) in items {
                if key.len() == depth {
                    value = Some(v.clone());
                } else {
                    groups[key[depth] as usize].push((key.clone(), v.clone()));
                }
            }
            Node::Branch {
                children: Box::new(std::array::from_fn(|i| build(&groups[i], depth + 1))),
                value,
            }
        }
    }
}
