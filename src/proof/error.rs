use thiserror::Error;

use crate::chain::ChainError;
use crate::core_types::BlockHeight;
use crate::eth::H256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Receipt not found for transaction {0}")]
    ReceiptNotFound(H256),

    #[error("Block {0} not found")]
    BlockNotFound(BlockHeight),

    #[error("Locked event not found for transaction {0}")]
    LogNotFound(H256),

    /// The receipts served by the node do not hash to the header's root.
    #[error("Receipt trie root mismatch: header has {expected}, computed {computed}")]
    TrieRootMismatch { expected: H256, computed: H256 },

    /// The header fields we encode do not hash to the block hash, so the
    /// header has fields this encoder does not know.
    #[error("Header of block {block} hashes to {computed}, node reports {expected}")]
    HeaderHashMismatch {
        block: BlockHeight,
        expected: H256,
        computed: H256,
    },

    #[error("Extracted proof does not resolve to the receipt: {0}")]
    InvalidProofPath(String),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl ProofError {
    /// Whether rebuilding later may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            ProofError::TrieRootMismatch { .. } => true,
            ProofError::Chain(e) => e.is_transient(),
            _ => false,
        }
    }
}
