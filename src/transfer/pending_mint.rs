//! Pending-mint ledger
//!
//! A mint is submitted and then confirmed later by comparing the
//! destination balance against the snapshot taken just before submission.
//! The snapshot lives here, outside the transfer record, keyed by transfer
//! id under [`PENDING_MINTS_KEY`]. An entry for an id means a mint was
//! submitted and not yet resolved, so the transfer must not mint again.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use super::types::TransferId;
use crate::core_types::{Amount, amount_serde};
use crate::storage::KeyValueStorage;

pub const PENDING_MINTS_KEY: &str = "rainbow-bridge-pending-mints";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMint {
    #[serde(with = "amount_serde")]
    pub balance_before: Amount,
}

type Entries = BTreeMap<TransferId, PendingMint>;

pub struct PendingMintLedger {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Mutex<()>,
}

impl PendingMintLedger {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> Result<Entries, TransferError> {
        match self.storage.get(PENDING_MINTS_KEY)? {
            Some(doc) => serde_json::from_str(&doc)
                .map_err(|e| TransferError::Storage(format!("corrupt pending-mint ledger: {}", e))),
            None => Ok(Entries::new()),
        }
    }

    fn save(&self, entries: &Entries) -> Result<(), TransferError> {
        if entries.is_empty() {
            self.storage.remove(PENDING_MINTS_KEY)?;
            return Ok(());
        }
        let doc = serde_json::to_string(entries)
            .map_err(|e| TransferError::Storage(e.to_string()))?;
        self.storage.set(PENDING_MINTS_KEY, &doc)?;
        Ok(())
    }

    pub fn record(&self, id: &TransferId, balance_before: Amount) -> Result<(), TransferError> {
        let _guard = self.guard();
        let mut entries = self.load()?;
        entries.insert(*id, PendingMint { balance_before });
        self.save(&entries)
    }

    pub fn get(&self, id: &TransferId) -> Result<Option<PendingMint>, TransferError> {
        Ok(self.load()?.get(id).copied())
    }

    /// Remove and return the entry for `id`.
    pub fn take(&self, id: &TransferId) -> Result<Option<PendingMint>, TransferError> {
        let _guard = self.guard();
        let mut entries = self.load()?;
        let taken = entries.remove(id);
        if taken.is_some() {
            self.save(&entries)?;
        }
        Ok(taken)
    }

    pub fn entries(&self) -> Result<Vec<(TransferId, PendingMint)>, TransferError> {
        Ok(self.load()?.into_iter().collect())
    }

    pub fn is_empty(&self) -> Result<bool, TransferError> {
        Ok(self.load()?.is_empty())
    }
}
