//! Transfer Core Types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};

use super::state::{FailedStage, Outcome, TransferStatus};
use crate::core_types::{Amount, amount_serde};
use crate::eth::{H256, Receipt};

static ID_GENERATOR: LazyLock<Mutex<ulid::Generator>> =
    LazyLock::new(|| Mutex::new(ulid::Generator::new()));

/// Transfer ID - monotonic ULID, so ids sort in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    pub fn new() -> Self {
        let mut generator = ID_GENERATOR
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // generate() only fails once 2^80 ids were issued in one millisecond
        Self(generator.generate().unwrap_or_else(|_| ulid::Ulid::new()))
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Persisted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: TransferId,
    #[serde(with = "amount_serde")]
    pub amount: Amount,
    pub status: TransferStatus,
    /// Set only when `status` is `complete`
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Stage the transfer was in when it failed; retry resumes from here
    #[serde(default)]
    pub failed_at: Option<FailedStage>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub approval_hash: Option<H256>,
    #[serde(default)]
    pub lock_hash: Option<H256>,
    #[serde(default)]
    pub approval_receipt: Option<Receipt>,
    #[serde(default)]
    pub lock_receipt: Option<Receipt>,
    /// Source blocks the destination light client has imported past the
    /// lock block
    #[serde(default)]
    pub progress: u64,
    pub needed_confirmations: u64,
    /// Unix milliseconds
    pub created_at: i64,
    pub updated_at: i64,
}

impl TransferRecord {
    /// Create from a patch; `amount` and `needed_confirmations` are required.
    pub fn from_patch(id: TransferId, patch: &TransferPatch) -> Option<Self> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut record = Self {
            id,
            amount: patch.amount?,
            status: patch.status.unwrap_or(TransferStatus::InitiatedApproval),
            outcome: None,
            failed_at: None,
            error: None,
            approval_hash: None,
            lock_hash: None,
            approval_receipt: None,
            lock_receipt: None,
            progress: 0,
            needed_confirmations: patch.needed_confirmations?,
            created_at: now,
            updated_at: now,
        };
        patch.apply(&mut record);
        Some(record)
    }

    /// Block the lock was mined in
    pub fn lock_height(&self) -> Option<u64> {
        self.lock_receipt.as_ref().map(|r| r.block_number)
    }

    /// `failedAt` when it names a stage this build knows.
    pub fn failed_stage(&self) -> Option<TransferStatus> {
        self.failed_at.as_ref().and_then(FailedStage::stage)
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransferStatus::Complete && self.outcome == Some(Outcome::Failed)
    }

    /// One-line status for display
    pub fn human_status(&self) -> String {
        match self.status {
            TransferStatus::InitiatedApproval => "approving TokenLocker".to_string(),
            TransferStatus::InitiatedLock => "locking".to_string(),
            TransferStatus::Locked => {
                format!("{}/{} blocks synced", self.progress, self.needed_confirmations)
            }
            TransferStatus::Complete => match self.outcome {
                Some(Outcome::Success) => "Success!".to_string(),
                _ => self.error.clone().unwrap_or_else(|| "Failed".to_string()),
            },
        }
    }
}

/// Partial update merged into a stored record.
///
/// Nullable record fields take `Option<Option<_>>`: `Some(None)` clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPatch {
    /// Used only when the patch creates the record
    pub amount: Option<Amount>,
    pub needed_confirmations: Option<u64>,

    pub status: Option<TransferStatus>,
    pub outcome: Option<Option<Outcome>>,
    pub failed_at: Option<Option<TransferStatus>>,
    pub error: Option<Option<String>>,
    pub approval_hash: Option<H256>,
    pub lock_hash: Option<H256>,
    pub approval_receipt: Option<Receipt>,
    pub lock_receipt: Option<Receipt>,
    pub progress: Option<u64>,
}

impl TransferPatch {
    pub fn status(status: TransferStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Terminate as `complete/failed` at `stage`.
    pub fn failed(stage: TransferStatus, error: impl Into<String>) -> Self {
        Self {
            status: Some(TransferStatus::Complete),
            outcome: Some(Some(Outcome::Failed)),
            failed_at: Some(Some(stage)),
            error: Some(Some(error.into())),
            ..Default::default()
        }
    }

    pub fn succeeded() -> Self {
        Self {
            status: Some(TransferStatus::Complete),
            outcome: Some(Some(Outcome::Success)),
            failed_at: Some(None),
            error: Some(None),
            ..Default::default()
        }
    }

    /// Back to `stage` with the failure cleared.
    pub fn reset_to(stage: TransferStatus) -> Self {
        Self {
            status: Some(stage),
            outcome: Some(None),
            failed_at: Some(None),
            error: Some(None),
            ..Default::default()
        }
    }

    pub fn progress(progress: u64) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Merge into `record`. `amount` is immutable and `progress` never moves
    /// backwards.
    pub fn apply(&self, record: &mut TransferRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(outcome) = self.outcome {
            record.outcome = outcome;
        }
        if let Some(failed_at) = self.failed_at {
            record.failed_at = failed_at.map(FailedStage::from);
        }
        if let Some(error) = &self.error {
            record.error = error.clone();
        }
        if let Some(hash) = self.approval_hash {
            record.approval_hash = Some(hash);
        }
        if let Some(hash) = self.lock_hash {
            record.lock_hash = Some(hash);
        }
        if let Some(receipt) = &self.approval_receipt {
            record.approval_receipt = Some(receipt.clone());
        }
        if let Some(receipt) = &self.lock_receipt {
            record.lock_receipt = Some(receipt.clone());
        }
        if let Some(progress) = self.progress {
            record.progress = record.progress.max(progress);
        }
        record.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// Records split by terminal status, each ordered by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferList {
    pub in_progress: Vec<TransferRecord>,
    pub complete: Vec<TransferRecord>,
}
