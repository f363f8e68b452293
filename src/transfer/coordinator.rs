//! Transfer Coordinator
//!
//! Drives transfers through approval, lock, confirmation and mint.
//!
//! Only one driver works on a transfer at a time: `check_status`, `retry`
//! and pending-mint resolution claim the id first, and a second caller
//! skips instead of sending its own lock or mint. Every transition is also
//! a status compare-and-swap on the store, so a step that raced with
//! `clear` does not resurrect the record.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::confirmation::MintEligibility;
use super::error::TransferError;
use super::pending_mint::PendingMintLedger;
use super::state::{FailedStage, TransferStatus};
use super::store::TransferStore;
use super::types::{TransferId, TransferList, TransferPatch, TransferRecord};
use super::worker::StatusPoller;
use crate::chain::{DestinationChain, SourceChain};
use crate::config::BridgeConfig;
use crate::core_types::Amount;
use crate::eth::{Address, H256};
use crate::proof::{MintSubmitter, ProofBuilder};
use crate::storage::KeyValueStorage;

/// Invoked after state changes; pulls fresh state through `get()`.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

pub struct TransferCoordinator {
    store: TransferStore,
    pending_mints: PendingMintLedger,
    source: Arc<dyn SourceChain>,
    destination: Arc<dyn DestinationChain>,
    proofs: ProofBuilder,
    minter: MintSubmitter,
    config: BridgeConfig,
    callback: RwLock<Option<ChangeCallback>>,
    poller: OnceLock<Arc<StatusPoller>>,
    in_flight: Mutex<HashSet<TransferId>>,
}

/// Claim on one transfer's chain side effects, released on drop.
struct InFlight<'a> {
    claims: &'a Mutex<HashSet<TransferId>>,
    id: TransferId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}

impl TransferCoordinator {
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        source: Arc<dyn SourceChain>,
        destination: Arc<dyn DestinationChain>,
        locker: Address,
        config: BridgeConfig,
    ) -> Self {
        Self {
            store: TransferStore::new(storage.clone()),
            pending_mints: PendingMintLedger::new(storage),
            proofs: ProofBuilder::new(source.clone(), locker),
            minter: MintSubmitter::new(destination.clone(), &config),
            source,
            destination,
            config,
            callback: RwLock::new(None),
            poller: OnceLock::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &TransferStore {
        &self.store
    }

    pub fn pending_mints(&self) -> &PendingMintLedger {
        &self.pending_mints
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn set_callback(&self, callback: ChangeCallback) {
        *self
            .callback
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(callback);
    }

    pub(crate) fn notify(&self) {
        let callback = self
            .callback
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Called once by [`StatusPoller::attach`].
    pub(crate) fn attach_poller(&self, poller: Arc<StatusPoller>) -> bool {
        self.poller.set(poller).is_ok()
    }

    pub fn poller(&self) -> Option<&Arc<StatusPoller>> {
        self.poller.get()
    }

    /// `None` while another caller is working on `id`.
    fn claim(&self, id: &TransferId) -> Option<InFlight<'_>> {
        let claimed = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(*id);
        claimed.then(|| InFlight {
            claims: &self.in_flight,
            id: *id,
        })
    }

    fn track(&self, id: &TransferId) {
        if let Some(poller) = self.poller.get() {
            poller.track(*id);
        }
    }

    /// Start a transfer: submit the approval and persist the new record.
    ///
    /// Returns once the approval has a transaction hash; it is not waited on.
    pub async fn initiate(&self, amount: Amount) -> Result<TransferId, TransferError> {
        if amount == 0 {
            return Err(TransferError::InvalidAmount);
        }

        let approval_hash = self.source.approve(amount).await?;

        let id = TransferId::new();
        let patch = TransferPatch {
            amount: Some(amount),
            needed_confirmations: Some(self.config.confirmations_for(&self.config.token_name)),
            status: Some(TransferStatus::InitiatedApproval),
            approval_hash: Some(approval_hash),
            ..Default::default()
        };
        let record = self.store.upsert(&id, patch)?;
        info!(
            transfer_id = %id,
            amount = %amount,
            approval_hash = %approval_hash,
            needed_confirmations = record.needed_confirmations,
            "Transfer initiated"
        );

        self.notify();
        self.track(&id);
        Ok(id)
    }

    /// All transfers, split into in-progress and complete, each by id.
    pub fn get(&self) -> Result<TransferList, TransferError> {
        let (complete, in_progress) = self
            .store
            .list()?
            .into_iter()
            .partition(|r| r.status.is_terminal());
        Ok(TransferList {
            in_progress,
            complete,
        })
    }

    pub fn find(&self, id: &TransferId) -> Result<TransferRecord, TransferError> {
        self.store
            .get(id)?
            .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))
    }

    /// Resume a failed transfer from the stage it failed at.
    pub async fn retry(&self, id: &TransferId) -> Result<TransferRecord, TransferError> {
        let _claim = self
            .claim(id)
            .ok_or_else(|| TransferError::InFlight(id.to_string()))?;
        let record = self.find(id)?;
        if !record.is_failed() {
            return Err(TransferError::NotRetryable {
                status: record.status.to_string(),
            });
        }
        let stage = match &record.failed_at {
            Some(FailedStage::Known(stage)) if stage.is_retry_stage() => *stage,
            other => {
                let raw = other
                    .as_ref()
                    .map_or_else(|| "none".to_string(), FailedStage::to_string);
                warn!(transfer_id = %id, failed_at = %raw, "Unknown retry stage");
                return Err(TransferError::UnknownRetryStage(raw));
            }
        };

        info!(transfer_id = %id, stage = %stage, "Retrying transfer");
        let mut patch = TransferPatch::reset_to(stage);
        match stage {
            TransferStatus::InitiatedApproval => {
                patch.approval_hash = Some(self.source.approve(record.amount).await?);
            }
            TransferStatus::InitiatedLock => {
                patch.lock_hash = Some(
                    self.source
                        .lock(record.amount, &self.config.destination_account)
                        .await?,
                );
            }
            TransferStatus::Locked | TransferStatus::Complete => {}
        }

        if !self.store.upsert_if(id, TransferStatus::Complete, patch)? {
            return Err(TransferError::TransferNotFound(id.to_string()));
        }
        self.notify();

        let minted = match stage {
            TransferStatus::Locked => self.attempt_mint(&self.find(id)?).await.map(|_| ()),
            _ => Ok(()),
        };
        self.track(id);
        minted?;
        self.find(id)
    }

    /// Remove a transfer and stop tracking it. In-flight chain transactions
    /// are not affected.
    pub fn clear(&self, id: &TransferId) -> Result<bool, TransferError> {
        if let Some(poller) = self.poller.get() {
            poller.cancel(id);
        }
        self.pending_mints.take(id)?;
        let removed = self.store.remove(id)?.is_some();
        if removed {
            info!(transfer_id = %id, "Transfer cleared");
            self.notify();
        }
        Ok(removed)
    }

    /// Advance one transfer as far as it can go right now.
    ///
    /// Returns the resulting status, or `None` if the transfer no longer
    /// exists. When another check already runs for `id` this one does
    /// nothing and reports the stored status.
    pub async fn check_status(&self, id: &TransferId) -> Result<Option<TransferStatus>, TransferError> {
        let Some(_claim) = self.claim(id) else {
            debug!(transfer_id = %id, "Status check already in flight");
            return Ok(self.store.get(id)?.map(|r| r.status));
        };
        let Some(mut record) = self.store.get(id)? else {
            return Ok(None);
        };

        loop {
            let before = record.status;
            let advanced = match before {
                TransferStatus::InitiatedApproval => self.check_approval(&record).await?,
                TransferStatus::InitiatedLock => self.check_lock(&record).await?,
                TransferStatus::Locked => self.check_locked(&record).await?,
                TransferStatus::Complete => None,
            };

            match advanced {
                Some(next) if next.status != before => {
                    debug!(
                        transfer_id = %id,
                        from = %before,
                        to = %next.status,
                        "Transfer advanced"
                    );
                    record = next;
                }
                Some(next) => return Ok(Some(next.status)),
                None => {
                    return Ok(self.store.get(id)?.map(|r| r.status));
                }
            }
        }
    }

    /// One polling round: resolve submitted mints, then check every
    /// in-progress transfer concurrently.
    ///
    /// Returns how many transfers were checked.
    pub async fn check_statuses(&self) -> Result<usize, TransferError> {
        if let Err(e) = self.resume_pending_mints().await {
            error!(error = %e, "Failed to resolve pending mints");
        }

        let ids: Vec<TransferId> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.id)
            .collect();

        let results = join_all(ids.iter().map(|id| self.check_status(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                warn!(transfer_id = %id, code = e.code(), error = %e, "Status check failed");
            }
        }

        self.notify();
        Ok(ids.len())
    }

    /// Whether any transfer is still moving or any mint awaits resolution.
    pub fn has_pending_work(&self) -> Result<bool, TransferError> {
        if !self.pending_mints.is_empty()? {
            return Ok(true);
        }
        Ok(self.store.list()?.iter().any(|r| !r.status.is_terminal()))
    }

    /// Finalize every submitted mint by comparing destination balances.
    ///
    /// Run at startup and at the start of every polling round. Returns how
    /// many entries were resolved.
    pub async fn resume_pending_mints(&self) -> Result<usize, TransferError> {
        let mut resolved = 0;
        for (id, _) in self.pending_mints.entries()? {
            // a running check resolves or submits this one itself
            let Some(_claim) = self.claim(&id) else {
                debug!(transfer_id = %id, "Pending mint busy, skipped");
                continue;
            };
            match self.resolve_pending_mint(&id).await {
                Ok(_) => resolved += 1,
                Err(e) => {
                    warn!(transfer_id = %id, error = %e, "Failed to resolve pending mint");
                }
            }
        }
        if resolved > 0 {
            self.notify();
        }
        Ok(resolved)
    }

    async fn resolve_pending_mint(&self, id: &TransferId) -> Result<Option<TransferRecord>, TransferError> {
        let Some(entry) = self.pending_mints.get(id)? else {
            return Ok(None);
        };
        let Some(record) = self.store.get(id)? else {
            self.pending_mints.take(id)?;
            return Ok(None);
        };

        let balance_after = self
            .destination
            .get_balance(&self.config.destination_account)
            .await?;
        let minted = balance_after.checked_sub(record.amount) == Some(entry.balance_before);

        let patch = if minted {
            info!(transfer_id = %id, amount = %record.amount, "Mint confirmed");
            TransferPatch::succeeded()
        } else {
            warn!(
                transfer_id = %id,
                balance_before = %entry.balance_before,
                balance_after = %balance_after,
                amount = %record.amount,
                "Mint not reflected in destination balance"
            );
            TransferPatch::failed(
                TransferStatus::Locked,
                format!("Minting n{} failed", self.config.token_name),
            )
        };

        let applied = self.store.upsert_if(id, TransferStatus::Locked, patch)?;
        self.pending_mints.take(id)?;
        if applied {
            self.store.get(id)
        } else {
            Ok(None)
        }
    }

    async fn revert_reason(&self, tx_hash: &H256) -> String {
        match self.source.get_revert_reason(tx_hash).await {
            Ok(reason) => reason,
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "Could not fetch revert reason");
                "Transaction reverted".to_string()
            }
        }
    }

    /// Persist `patch` if the record is still at `expected`, returning the
    /// updated record.
    fn transition(
        &self,
        id: &TransferId,
        expected: TransferStatus,
        patch: TransferPatch,
    ) -> Result<Option<TransferRecord>, TransferError> {
        if self.store.upsert_if(id, expected, patch)? {
            self.store.get(id)
        } else {
            Ok(None)
        }
    }

    async fn check_approval(&self, record: &TransferRecord) -> Result<Option<TransferRecord>, TransferError> {
        let stage = TransferStatus::InitiatedApproval;
        let Some(hash) = record.approval_hash else {
            return self.transition(&record.id, stage, TransferPatch::failed(stage, "Missing approval hash"));
        };
        let Some(receipt) = self.source.get_receipt(&hash).await? else {
            return Ok(None);
        };

        if !receipt.is_success() {
            let err = TransferError::TransactionReverted(self.revert_reason(&hash).await);
            warn!(transfer_id = %record.id, tx_hash = %hash, code = err.code(), error = %err, "Approval reverted");
            let mut patch = TransferPatch::failed(stage, err.to_string());
            patch.approval_receipt = Some(receipt);
            return self.transition(&record.id, stage, patch);
        }

        match self
            .source
            .lock(record.amount, &self.config.destination_account)
            .await
        {
            Ok(lock_hash) => {
                info!(transfer_id = %record.id, lock_hash = %lock_hash, "Approval mined, lock sent");
                let patch = TransferPatch {
                    status: Some(TransferStatus::InitiatedLock),
                    approval_receipt: Some(receipt),
                    lock_hash: Some(lock_hash),
                    ..Default::default()
                };
                self.transition(&record.id, stage, patch)
            }
            Err(e) if e.is_transient() => Err(e.into()),
            Err(e) => {
                // approval is done; retrying from the lock stage re-sends only the lock
                warn!(transfer_id = %record.id, error = %e, "Lock rejected");
                let mut patch = TransferPatch::failed(TransferStatus::InitiatedLock, e.to_string());
                patch.approval_receipt = Some(receipt);
                self.transition(&record.id, stage, patch)
            }
        }
    }

    async fn check_lock(&self, record: &TransferRecord) -> Result<Option<TransferRecord>, TransferError> {
        let stage = TransferStatus::InitiatedLock;
        let Some(hash) = record.lock_hash else {
            return self.transition(&record.id, stage, TransferPatch::failed(stage, "Missing lock hash"));
        };
        let Some(receipt) = self.source.get_receipt(&hash).await? else {
            return Ok(None);
        };

        if !receipt.is_success() {
            let err = TransferError::TransactionReverted(self.revert_reason(&hash).await);
            warn!(transfer_id = %record.id, tx_hash = %hash, code = err.code(), error = %err, "Lock reverted");
            let mut patch = TransferPatch::failed(stage, err.to_string());
            patch.lock_receipt = Some(receipt);
            return self.transition(&record.id, stage, patch);
        }

        info!(
            transfer_id = %record.id,
            block = receipt.block_number,
            "Lock mined"
        );
        let patch = TransferPatch {
            status: Some(TransferStatus::Locked),
            lock_receipt: Some(receipt),
            progress: Some(0),
            ..Default::default()
        };
        self.transition(&record.id, stage, patch)
    }

    async fn check_locked(&self, record: &TransferRecord) -> Result<Option<TransferRecord>, TransferError> {
        if self.pending_mints.get(&record.id)?.is_some() {
            return self.resolve_pending_mint(&record.id).await;
        }

        let stage = TransferStatus::Locked;
        let Some(height) = record.lock_height() else {
            return self.transition(&record.id, stage, TransferPatch::failed(stage, "Missing lock receipt"));
        };

        let synced = self.destination.get_synced_height().await?;
        let eligibility = MintEligibility::evaluate(height, synced, record.needed_confirmations);
        if eligibility.progress() > record.progress {
            self.store
                .upsert_if(&record.id, stage, TransferPatch::progress(eligibility.progress()))?;
        }

        if !eligibility.is_confirmed() {
            debug!(
                transfer_id = %record.id,
                progress = eligibility.progress(),
                needed = record.needed_confirmations,
                "Waiting for confirmations"
            );
            return Ok(None);
        }
        if !self.destination.is_block_safe(height).await? {
            debug!(transfer_id = %record.id, block = height, "Lock block not yet safe");
            return Ok(None);
        }

        self.attempt_mint(record).await
    }

    /// Mint, failing the transfer at `locked` unless the error is transient.
    async fn attempt_mint(&self, record: &TransferRecord) -> Result<Option<TransferRecord>, TransferError> {
        match self.mint(record).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_transient() => {
                warn!(transfer_id = %record.id, error = %e, "Mint attempt deferred");
                Err(e)
            }
            Err(e) => {
                error!(transfer_id = %record.id, code = e.code(), error = %e, "Mint failed");
                let stage = TransferStatus::Locked;
                self.transition(&record.id, stage, TransferPatch::failed(stage, e.to_string()))
            }
        }
    }

    /// Build the proof, snapshot the balance and submit. Success is only
    /// known once the pending-mint entry is resolved.
    ///
    /// Callers hold the claim on `record.id`.
    async fn mint(&self, record: &TransferRecord) -> Result<(), TransferError> {
        if self.pending_mints.get(&record.id)?.is_some() {
            debug!(transfer_id = %record.id, "Mint already submitted");
            return Ok(());
        }
        let lock_hash = record
            .lock_hash
            .ok_or_else(|| TransferError::MintSubmissionFailed("missing lock hash".to_string()))?;

        let proof = self.proofs.build(&lock_hash).await?;
        let balance_before = self
            .destination
            .get_balance(&self.config.destination_account)
            .await?;

        self.pending_mints.record(&record.id, balance_before)?;
        if let Err(e) = self.minter.submit(&proof).await {
            self.pending_mints.take(&record.id)?;
            return Err(if e.is_transient() {
                TransferError::ChainCallRejected(e)
            } else {
                TransferError::MintSubmissionFailed(e.to_string())
            });
        }

        info!(
            transfer_id = %record.id,
            balance_before = %balance_before,
            "Mint submitted, awaiting balance confirmation"
        );
        Ok(())
    }
}
