use super::nibbles::encode_compact;
use crate::eth::keccak256;
use crate::rlp;

/// In-memory Merkle-Patricia trie node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Empty,
    Leaf {
        path: Vec<u8>,
        value: Vec<u8>,
    },
    Extension {
        path: Vec<u8>,
        child: Box<Node>,
    },
    Branch {
        children: Box<[Node; 16]>,
        value: Option<Vec<u8>>,
    },
}

impl Node {
    /// Canonical RLP encoding of this node.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Node::Empty => rlp::encode_bytes(&[]),
            Node::Leaf { path, value } => rlp::encode_list(&[
                rlp::encode_bytes(&encode_compact(path, true)),
                rlp::encode_bytes(value),
            ]),
            Node::Extension { path, child } => rlp::encode_list(&[
                rlp::encode_bytes(&encode_compact(path, false)),
                child.reference(),
            ]),
            Node::Branch { children, value } => {
                let mut items: Vec<Vec<u8>> = children.iter().map(Node::reference).collect();
                items.push(rlp::encode_bytes(value.as_deref().unwrap_or_default()));
                rlp::encode_list(&items)
            }
        }
    }

    /// How a parent refers to this node: inline when the encoding is shorter
    /// than a hash, otherwise the Keccak hash as a 32-byte string.
    pub fn reference(&self) -> Vec<u8> {
        let encoded = self.encode();
        if encoded.len() < 32 {
            encoded
        } else {
            rlp::encode_bytes(keccak256(&encoded).as_bytes())
        }
    }
}
