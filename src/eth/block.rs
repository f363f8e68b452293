//! Block as returned by `eth_getBlockByNumber(number, false)` and its
//! canonical header encoding.

use serde::{Deserialize, Serialize};

use super::primitives::{Address, Bytes, H256, Quantity, hex_u64, keccak256};
use crate::rlp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: H256,
    pub parent_hash: H256,
    pub sha3_uncles: H256,
    pub miner: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bytes,
    pub difficulty: Quantity,
    #[serde(with = "hex_u64")]
    pub number: u64,
    pub gas_limit: Quantity,
    pub gas_used: Quantity,
    pub timestamp: Quantity,
    pub extra_data: Bytes,
    pub mix_hash: H256,
    pub nonce: Bytes,
    // London
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<Quantity>,
    // Shanghai
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<H256>,
    // Cancun
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<H256>,
    // Prague
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<H256>,
    /// Transaction hashes in block order.
    #[serde(default)]
    pub transactions: Vec<H256>,
}

impl Block {
    /// RLP-encoded header.
    ///
    /// Fork-specific trailing fields are appended in activation order and only
    /// when the node reported them, so pre-London headers stay at 15 fields.
    pub fn header_rlp(&self) -> Vec<u8> {
        let mut fields = vec![
            rlp::encode_bytes(self.parent_hash.as_bytes()),
            rlp::encode_bytes(self.sha3_uncles.as_bytes()),
            rlp::encode_bytes(self.miner.as_bytes()),
            rlp::encode_bytes(self.state_root.as_bytes()),
            rlp::encode_bytes(self.transactions_root.as_bytes()),
            rlp::encode_bytes(self.receipts_root.as_bytes()),
            rlp::encode_bytes(self.logs_bloom.as_slice()),
            self.difficulty.rlp(),
            rlp::encode_u64(self.number),
            self.gas_limit.rlp(),
            self.gas_used.rlp(),
            self.timestamp.rlp(),
            rlp::encode_bytes(self.extra_data.as_slice()),
            rlp::encode_bytes(self.mix_hash.as_bytes()),
            rlp::encode_bytes(self.nonce.as_slice()),
        ];

        if let Some(ref fee) = self.base_fee_per_gas {
            fields.push(fee.rlp());
        }
        if let Some(ref root) = self.withdrawals_root {
            fields.push(rlp::encode_bytes(root.as_bytes()));
        }
        if let Some(ref used) = self.blob_gas_used {
            fields.push(used.rlp());
        }
        if let Some(ref excess) = self.excess_blob_gas {
            fields.push(excess.rlp());
        }
        if let Some(ref root) = self.parent_beacon_block_root {
            fields.push(rlp::encode_bytes(root.as_bytes()));
        }
        if let Some(ref hash) = self.requests_hash {
            fields.push(rlp::encode_bytes(hash.as_bytes()));
        }

        rlp::encode_list(&fields)
    }

    /// Hash of the encoded header. Matches `hash` for a well-formed block.
    pub fn computed_hash(&self) -> H256 {
        keccak256(&self.header_rlp())
    }
}
