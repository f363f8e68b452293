//! Chain Gateways
//!
//! Capability interfaces for the two ledgers a transfer touches. The state
//! machine and the proof builder only ever talk to these traits, so every
//! flow can run against the in-memory fakes in tests.
//!
//! - [`SourceChain`]: where tokens are approved and locked, and where the
//!   receipts, blocks and logs for the proof come from
//! - [`DestinationChain`]: hosts the light client of the source chain and the
//!   mintable token that accepts the proof

pub mod error;
pub mod eth_rpc;
#[cfg(test)]
pub mod mock;

pub use error::ChainError;
pub use eth_rpc::EthRpcClient;

use async_trait::async_trait;

use crate::core_types::{Amount, BlockHeight};
use crate::eth::{Address, Block, H256, Log, Receipt};
use crate::proof::LockProof;

/// Log query restricted to one emitter, one event and a block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub address: Address,
    /// `topic[0]`, the event signature hash
    pub topic0: H256,
    pub from_block: BlockHeight,
    pub to_block: BlockHeight,
    /// Keep only logs emitted by this transaction
    pub transaction_hash: Option<H256>,
}

#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Chain name for logging
    fn name(&self) -> &'static str;

    /// Allow the locker to spend `amount`. Resolves as soon as the
    /// transaction has a hash, not when it is mined.
    async fn approve(&self, amount: Amount) -> Result<H256, ChainError>;

    /// Lock `amount` for `recipient` on the destination chain. Resolves with
    /// the pending transaction hash.
    async fn lock(&self, amount: Amount, recipient: &str) -> Result<H256, ChainError>;

    /// `None` while the transaction is not mined.
    async fn get_receipt(&self, tx_hash: &H256) -> Result<Option<Receipt>, ChainError>;

    async fn get_block(&self, number: BlockHeight) -> Result<Option<Block>, ChainError>;

    /// Human-readable reason a mined transaction reverted.
    async fn get_revert_reason(&self, tx_hash: &H256) -> Result<String, ChainError>;

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Log>, ChainError>;
}

#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Bridged-token balance of `account`.
    async fn get_balance(&self, account: &str) -> Result<Amount, ChainError>;

    /// Latest source-chain block the destination light client has imported.
    async fn get_synced_height(&self) -> Result<BlockHeight, ChainError>;

    /// Light-client finality predicate for a source-chain block.
    async fn is_block_safe(&self, height: BlockHeight) -> Result<bool, ChainError>;

    /// Mint against `proof`, attaching `deposit` for storage and `gas`.
    async fn submit_proof(
        &self,
        proof: &LockProof,
        deposit: Amount,
        gas: u64,
    ) -> Result<(), ChainError>;
}
