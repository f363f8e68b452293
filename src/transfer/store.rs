//! Transfer Store
//!
//! The whole record set lives in one JSON document under
//! [`TRANSFERS_KEY`]. Every mutation is read-merge-write of that document,
//! serialized by a mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::error::TransferError;
use super::state::TransferStatus;
use super::types::{TransferId, TransferPatch, TransferRecord};
use crate::storage::KeyValueStorage;

pub const TRANSFERS_KEY: &str = "rainbow-bridge-transfers";

type RecordSet = BTreeMap<TransferId, TransferRecord>;

pub struct TransferStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Mutex<()>,
}

impl TransferStore {
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

    fn load(&self) -> Result<RecordSet, TransferError> {
        match self.storage.get(TRANSFERS_KEY)? {
            Some(doc) => serde_json::from_str(&doc)
                .map_err(|e| TransferError::Storage(format!("corrupt transfer set: {}", e))),
            None => Ok(RecordSet::new()),
        }
    }

    fn save(&self, records: &RecordSet) -> Result<(), TransferError> {
        let doc = serde_json::to_string(records)
            .map_err(|e| TransferError::Storage(e.to_string()))?;
        self.storage.set(TRANSFERS_KEY, &doc)?;
        Ok(())
    }

    /// All records, ordered by id.
    pub fn list(&self) -> Result<Vec<TransferRecord>, TransferError> {
        Ok(self.load()?.into_values().collect())
    }

    pub fn get(&self, id: &TransferId) -> Result<Option<TransferRecord>, TransferError> {
        Ok(self.load()?.remove(id))
    }

    /// Merge `patch` into the record, creating it when absent (the patch must
    /// then carry a positive `amount` and `needed_confirmations`).
    pub fn upsert(&self, id: &TransferId, patch: TransferPatch) -> Result<TransferRecord, TransferError> {
        let _guard = self.guard();
        let mut records = self.load()?;

        let record = match records.get_mut(id) {
            Some(record) => {
                patch.apply(record);
                record.clone()
            }
            None => {
                if patch.amount == Some(0) {
                    return Err(TransferError::InvalidAmount);
                }
                let record = TransferRecord::from_patch(*id, &patch)
                    .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))?;
                records.insert(*id, record.clone());
                record
            }
        };

        self.save(&records)?;
        debug!(transfer_id = %id, status = %record.status, "Transfer upserted");
        Ok(record)
    }

    /// Apply `patch` only if the record exists and is still in `expected`.
    pub fn upsert_if(
        &self,
        id: &TransferId,
        expected: TransferStatus,
        patch: TransferPatch,
    ) -> Result<bool, TransferError> {
        let _guard = self.guard();
        let mut records = self.load()?;

        let Some(record) = records.get_mut(id) else {
            return Ok(false);
        };
        if record.status != expected {
            debug!(
                transfer_id = %id,
                expected = %expected,
                actual = %record.status,
                "Conditional update skipped"
            );
            return Ok(false);
        }
        patch.apply(record);

        self.save(&records)?;
        Ok(true)
    }

    pub fn remove(&self, id: &TransferId) -> Result<Option<TransferRecord>, TransferError> {
        let _guard = self.guard();
        let mut records = self.load()?;
        let removed = records.remove(id);
        if removed.is_some() {
            self.save(&records)?;
        }
        Ok(removed)
    }
}
