//! Transfer lifecycle states
//!
//! Persisted as snake_case strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transfer lifecycle stage
///
/// ```text
/// initiated_approval -> initiated_lock -> locked -> complete
///          \                  \             \
///           +------------------+-------------+--> complete (failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// ERC-20 approval for the locker submitted
    InitiatedApproval,

    /// Lock transaction submitted
    InitiatedLock,

    /// Lock mined; waiting for the destination light client to catch up,
    /// then minting
    Locked,

    /// Terminal, see [`Outcome`]
    Complete,
}

impl TransferStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Complete)
    }

    /// Stages a failed transfer can be retried from.
    #[inline]
    pub fn is_retry_stage(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::InitiatedApproval => "initiated_approval",
            TransferStatus::InitiatedLock => "initiated_lock",
            TransferStatus::Locked => "locked",
            TransferStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated_approval" => Ok(TransferStatus::InitiatedApproval),
            "initiated_lock" => Ok(TransferStatus::InitiatedLock),
            "locked" => Ok(TransferStatus::Locked),
            "complete" => Ok(TransferStatus::Complete),
            other => Err(format!("unknown transfer status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted `failedAt`.
///
/// A stage this build does not know is kept verbatim, so one odd record
/// neither blocks loading the rest nor gets rewritten on the next save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailedStage {
    Known(TransferStatus),
    Unrecognized(String),
}

impl FailedStage {
    pub fn stage(&self) -> Option<TransferStatus> {
        match self {
            FailedStage::Known(stage) => Some(*stage),
            FailedStage::Unrecognized(_) => None,
        }
    }
}

impl From<TransferStatus> for FailedStage {
    fn from(stage: TransferStatus) -> Self {
        FailedStage::Known(stage)
    }
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedStage::Known(stage) => write!(f, "{}", stage),
            FailedStage::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}
