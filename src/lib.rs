//! Bridge Transfers - lock-and-mint transfer tracking
//!
//! Moves ERC-20 tokens from an Ethereum-style source chain to a destination
//! chain that runs a light client of the source chain. Tokens are approved
//! and locked on the source side, and once the lock block is final on the
//! destination side a Merkle-Patricia inclusion proof of the lock receipt is
//! submitted to mint the same amount.
//!
//! # Modules
//!
//! - [`core_types`] - Amount and block height aliases
//! - [`rlp`] - Recursive Length Prefix encoding
//! - [`eth`] - Receipts, logs, block headers and ABI helpers
//! - [`trie`] - Receipt trie construction, proof extraction and verification
//! - [`chain`] - Source/destination chain interfaces and the JSON-RPC client
//! - [`proof`] - Lock proof builder and mint submission
//! - [`storage`] - Key-value persistence
//! - [`transfer`] - Transfer state machine, store and status poller
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

// Encoding and proofs
pub mod eth;
pub mod proof;
pub mod rlp;
pub mod trie;

// Chains and persistence
pub mod chain;
pub mod storage;

// Transfer lifecycle
pub mod transfer;

// Infrastructure
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use chain::{ChainError, DestinationChain, EthRpcClient, EventFilter, SourceChain};
pub use config::{AppConfig, BridgeConfig};
pub use core_types::{Amount, BlockHeight};
pub use eth::{Address, Block, H256, Log, Receipt};
pub use proof::{LockProof, MintSubmitter, ProofBuilder, ProofError};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use transfer::{
    Outcome, StatusPoller, TransferCoordinator, TransferError, TransferId, TransferList,
    TransferRecord, TransferStatus,
};
pub use trie::{PatriciaTrie, verify_proof};
