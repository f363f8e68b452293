//! Confirmation Monitor
//!
//! Pure functions over the lock block height and the destination light
//! client's view of the source chain. Finality itself is the destination
//! chain's call (`DestinationChain::is_block_safe`).

use crate::core_types::BlockHeight;

/// Source blocks imported by the light client past `event_height`.
#[inline]
pub fn progress(event_height: BlockHeight, synced_height: BlockHeight) -> u64 {
    synced_height.saturating_sub(event_height)
}

#[inline]
pub fn is_confirmed(progress: u64, needed: u64) -> bool {
    progress >= needed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintEligibility {
    /// Not enough confirmations yet
    Waiting { progress: u64, needed: u64 },
    /// Enough confirmations; minting still requires the block to be safe
    Confirmed { progress: u64 },
}

impl MintEligibility {
    pub fn evaluate(event_height: BlockHeight, synced_height: BlockHeight, needed: u64) -> Self {
        let progress = progress(event_height, synced_height);
        if is_confirmed(progress, needed) {
            MintEligibility::Confirmed { progress }
        } else {
            MintEligibility::Waiting { progress, needed }
        }
    }

    pub fn progress(&self) -> u64 {
        match self {
            MintEligibility::Waiting { progress, .. } | MintEligibility::Confirmed { progress } => {
                *progress
            }
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, MintEligibility::Confirmed { .. })
    }
}
