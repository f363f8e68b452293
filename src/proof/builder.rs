use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::LockProof;
use super::error::ProofError;
use crate::chain::{EventFilter, SourceChain};
use crate::eth::abi::{self, LOCKED_EVENT};
use crate::eth::{Address, H256, Receipt, keccak256};
use crate::rlp;
use crate::trie::{PatriciaTrie, verify_proof};

/// Builds [`LockProof`]s for lock transactions of one locker contract.
pub struct ProofBuilder {
    source: Arc<dyn SourceChain>,
    locker: Address,
}

impl ProofBuilder {
    pub fn new(source: Arc<dyn SourceChain>, locker: Address) -> Self {
        Self { source, locker }
    }

    pub async fn build(&self, lock_tx: &H256) -> Result<LockProof, ProofError> {
        let receipt = self.fetch_receipt(lock_tx).await?;
        let height = receipt.block_number;
        let block = self
            .source
            .get_block(height)
            .await?
            .ok_or(ProofError::BlockNotFound(height))?;

        debug!(
            tx_hash = %lock_tx,
            block = height,
            transactions = block.transactions.len(),
            "Fetching block receipts"
        );
        let receipts: Vec<Receipt> = join_all(block.transactions.iter().map(|h| self.fetch_receipt(h)))
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        let trie = PatriciaTrie::from_entries(
            receipts
                .iter()
                .map(|r| (rlp::encode_u64(r.transaction_index), r.rlp_bytes())),
        );
        let computed = trie.root_hash();
        if computed != block.receipts_root {
            warn!(
                block = height,
                expected = %block.receipts_root,
                computed = %computed,
                "Receipt trie root mismatch"
            );
            return Err(ProofError::TrieRootMismatch {
                expected: block.receipts_root,
                computed,
            });
        }

        let header_data = block.header_rlp();
        let header_hash = keccak256(&header_data);
        if header_hash != block.hash {
            warn!(
                block = height,
                expected = %block.hash,
                computed = %header_hash,
                "Header hash mismatch"
            );
            return Err(ProofError::HeaderHashMismatch {
                block: height,
                expected: block.hash,
                computed: header_hash,
            });
        }

        let key = rlp::encode_u64(receipt.transaction_index);
        let receipt_data = receipt.rlp_bytes();
        let proof = trie
            .proof(&key)
            .map_err(|e| ProofError::InvalidProofPath(e.to_string()))?;
        let resolved = verify_proof(&computed, &key, &proof)
            .map_err(|e| ProofError::InvalidProofPath(e.to_string()))?;
        if resolved != receipt_data {
            return Err(ProofError::InvalidProofPath(
                "path resolves to a different receipt".to_string(),
            ));
        }

        let log_index = self.locate_log(lock_tx, &receipt).await?;

        info!(
            tx_hash = %lock_tx,
            block = height,
            receipt_index = receipt.transaction_index,
            log_index,
            nodes = proof.len(),
            "Lock proof built"
        );

        Ok(LockProof {
            log_index: log_index as u64,
            log_entry_data: receipt.logs[log_index].rlp_bytes(),
            receipt_index: receipt.transaction_index,
            receipt_data,
            header_data,
            proof,
        })
    }

    async fn fetch_receipt(&self, tx_hash: &H256) -> Result<Receipt, ProofError> {
        self.source
            .get_receipt(tx_hash)
            .await?
            .ok_or(ProofError::ReceiptNotFound(*tx_hash))
    }

    /// Position of the `Locked` log inside `receipt.logs`.
    ///
    /// The event query reports a block-wide `logIndex`; the receipt is
    /// scanned for the log carrying that index rather than using it as an
    /// array position.
    async fn locate_log(&self, lock_tx: &H256, receipt: &Receipt) -> Result<usize, ProofError> {
        let filter = EventFilter {
            address: self.locker,
            topic0: abi::event_topic(LOCKED_EVENT),
            from_block: receipt.block_number,
            to_block: receipt.block_number,
            transaction_hash: Some(*lock_tx),
        };

        let event = self
            .source
            .query_events(&filter)
            .await?
            .into_iter()
            .find(|log| log.transaction_hash == Some(*lock_tx))
            .ok_or(ProofError::LogNotFound(*lock_tx))?;

        event
            .log_index
            .and_then(|index| receipt.position_of_log(index))
            .ok_or(ProofError::LogNotFound(*lock_tx))
    }
}
