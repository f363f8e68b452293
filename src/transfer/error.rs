//! Transfer Error Types

use thiserror::Error;

use crate::chain::ChainError;
use crate::proof::ProofError;
use crate::storage::StorageError;

#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Transfer is not retryable: status {status}")]
    NotRetryable { status: String },

    #[error("Can't retry transfer from stage '{0}'")]
    UnknownRetryStage(String),

    #[error("Transfer {0} is already being processed")]
    InFlight(String),

    // === Chain Errors ===
    #[error("Chain call rejected: {0}")]
    ChainCallRejected(#[from] ChainError),

    #[error("{0}")]
    TransactionReverted(String),

    // === Proof / Mint Errors ===
    #[error("Receipt trie root mismatch: {0}")]
    TrieRootMismatch(String),

    #[error("Minting failed: {0}")]
    MintSubmissionFailed(String),

    // === System Errors ===
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::NotRetryable { .. } => "NOT_RETRYABLE",
            TransferError::UnknownRetryStage(_) => "UNKNOWN_RETRY_STAGE",
            TransferError::InFlight(_) => "TRANSFER_IN_FLIGHT",
            TransferError::ChainCallRejected(_) => "CHAIN_CALL_REJECTED",
            TransferError::TransactionReverted(_) => "TRANSACTION_REVERTED",
            TransferError::TrieRootMismatch(_) => "TRIE_ROOT_MISMATCH",
            TransferError::MintSubmissionFailed(_) => "MINT_SUBMISSION_FAILED",
            TransferError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether the failed step may succeed if simply polled again.
    ///
    /// A transient error while minting leaves the transfer `locked` instead of
    /// failing it.
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::TrieRootMismatch(_) => true,
            TransferError::ChainCallRejected(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<ProofError> for TransferError {
    fn from(e: ProofError) -> Self {
        match e {
            ProofError::TrieRootMismatch { .. } => TransferError::TrieRootMismatch(e.to_string()),
            ProofError::Chain(chain) => TransferError::ChainCallRejected(chain),
            other => TransferError::MintSubmissionFailed(other.to_string()),
        }
    }
}

impl From<StorageError> for TransferError {
    fn from(e: StorageError) -> Self {
        TransferError::Storage(e.to_string())
    }
}
