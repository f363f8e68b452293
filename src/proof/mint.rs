use std::sync::Arc;

use tracing::{info, warn};

use super::LockProof;
use crate::chain::{ChainError, DestinationChain};
use crate::config::BridgeConfig;
use crate::core_types::Amount;

/// Submits proofs to the destination token with the configured storage
/// deposit and gas.
pub struct MintSubmitter {
    destination: Arc<dyn DestinationChain>,
    deposit: Amount,
    gas: u64,
}

impl MintSubmitter {
    pub fn new(destination: Arc<dyn DestinationChain>, config: &BridgeConfig) -> Self {
        Self {
            destination,
            deposit: config.mint_deposit,
            gas: config.mint_gas,
        }
    }

    pub async fn submit(&self, proof: &LockProof) -> Result<(), ChainError> {
        match self
            .destination
            .submit_proof(proof, self.deposit, self.gas)
            .await
        {
            Ok(()) => {
                info!(
                    receipt_index = proof.receipt_index,
                    deposit = %self.deposit,
                    gas = self.gas,
                    "Mint submitted"
                );
                Ok(())
            }
            Err(e) => {
                warn!(receipt_index = proof.receipt_index, error = %e, "Mint submission failed");
                Err(e)
            }
        }
    }
}
