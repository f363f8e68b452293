//! Lock-and-Mint Transfer FSM
//!
//! Tracks transfers from the source chain (ERC-20 + locker) to the
//! destination chain (light client + mintable token).
//!
//! # State Machine
//!
//! ```text
//! initiated_approval → initiated_lock → locked → complete (success)
//!          ↓                  ↓            ↓
//!          └──────────────────┴────────────┴──→ complete (failed, failedAt)
//! ```
//!
//! # Invariants
//!
//! 1. **CAS transitions**: every step persists with `upsert_if` on the status
//!    it started from
//! 2. **Mint once**: a pending-mint entry for an id blocks another submission
//!    until the balance check resolves it
//! 3. **Progress is monotonic** while `locked`
//! 4. **Retry resumes at `failedAt`**: approval, lock or mint, never a later
//!    stage
//! 5. **One driver per transfer**: a status check, retry or pending-mint
//!    resolution holds a claim on the id; concurrent callers skip

pub mod confirmation;
pub mod coordinator;
pub mod error;
pub mod pending_mint;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;


pub use coordinator::{ChangeCallback, TransferCoordinator};
pub use error::TransferError;
pub use pending_mint::{PendingMint, PendingMintLedger};
pub use state::{FailedStage, Outcome, TransferStatus};
pub use store::TransferStore;
pub use types::{TransferId, TransferList, TransferPatch, TransferRecord};
pub use worker::{PollerConfig, StatusPoller};
