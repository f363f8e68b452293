//! Inclusion Proof Pipeline
//!
//! Turns a mined lock transaction into the artifact the destination chain's
//! light client verifies: the block header, the lock receipt, the `Locked`
//! log, and the Merkle-Patricia path proving the receipt is committed under
//! the header's `receiptsRoot`.
//!
//! # Flow
//!
//! ```text
//! lock tx hash
//!   -> receipt + block
//!   -> every receipt in the block -> receipt trie (root == receiptsRoot?)
//!   -> path for rlp(txIndex), self-checked against the root
//!   -> Locked event cross-matched to its position in receipt.logs
//!   -> LockProof -> MintSubmitter -> destination chain
//! ```

pub mod builder;
pub mod error;
pub mod mint;

pub use builder::ProofBuilder;
pub use error::ProofError;
pub use mint::MintSubmitter;

use serde::{Deserialize, Serialize};

/// Proof artifact accepted by the destination token's `mint_with_json`.
///
/// Byte fields serialize as JSON arrays of integers. Built fresh for every
/// mint attempt and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockProof {
    /// Position of the `Locked` log inside the receipt's `logs` array
    pub log_index: u64,
    /// `rlp([address, [topics], data])`
    pub log_entry_data: Vec<u8>,
    /// Transaction index within the block, which is also the trie key
    pub receipt_index: u64,
    /// Consensus-encoded receipt, type-prefixed for typed transactions
    pub receipt_data: Vec<u8>,
    pub header_data: Vec<u8>,
    /// Trie nodes from the root to the receipt leaf
    pub proof: Vec<Vec<u8>>,
}
