//! Transaction receipts and event logs, in the JSON shape of
//! `eth_getTransactionReceipt` / `eth_getLogs`, plus their consensus encoding.

use serde::{Deserialize, Serialize};

use super::primitives::{Address, Bytes, H256, Quantity, hex_u64};
use crate::rlp;

/// Event log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    /// Block-wide position as reported by the node. Not the position inside
    /// the receipt's `logs` array.
    #[serde(default, with = "hex_u64::option", skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<H256>,
    #[serde(default, with = "hex_u64::option", skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<u64>,
    #[serde(default, with = "hex_u64::option", skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<H256>,
}

impl Log {
    /// `[address, [topics...], data]`
    pub fn rlp_bytes(&self) -> Vec<u8> {
        let topics: Vec<Vec<u8>> = self
            .topics
            .iter()
            .map(|t| rlp::encode_bytes(t.as_bytes()))
            .collect();
        rlp::encode_list(&[
            rlp::encode_bytes(self.address.as_bytes()),
            rlp::encode_list(&topics),
            rlp::encode_bytes(self.data.as_slice()),
        ])
    }
}

/// Transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: H256,
    #[serde(with = "hex_u64")]
    pub transaction_index: u64,
    pub block_hash: H256,
    #[serde(with = "hex_u64")]
    pub block_number: u64,
    /// Post-Byzantium execution status (1 success, 0 revert).
    #[serde(default, with = "hex_u64::option", skip_serializing_if = "Option::is_none")]
    pub status: Option<u64>,
    /// Pre-Byzantium intermediate state root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<H256>,
    pub cumulative_gas_used: Quantity,
    pub logs_bloom: Bytes,
    pub logs: Vec<Log>,
    /// EIP-2718 envelope type. Absent on legacy-only nodes.
    #[serde(
        rename = "type",
        default,
        with = "hex_u64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub tx_type: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
}

impl Receipt {
    /// Whether execution succeeded. Pre-Byzantium receipts carry no status
    /// and are treated as successful.
    pub fn is_success(&self) -> bool {
        match self.status {
            Some(status) => status == 1,
            None => self.root.is_some(),
        }
    }

    /// Consensus encoding used as the receipt-trie value:
    /// `type || rlp([status, cumulativeGasUsed, logsBloom, logs])`, with the
    /// type byte omitted for legacy receipts.
    pub fn rlp_bytes(&self) -> Vec<u8> {
        let outcome = match (self.status, self.root) {
            (Some(status), _) => rlp::encode_u64(status),
            (None, Some(root)) => rlp::encode_bytes(root.as_bytes()),
            (None, None) => rlp::encode_bytes(&[]),
        };
        let logs: Vec<Vec<u8>> = self.logs.iter().map(Log::rlp_bytes).collect();
        let body = rlp::encode_list(&[
            outcome,
            self.cumulative_gas_used.rlp(),
            rlp::encode_bytes(self.logs_bloom.as_slice()),
            rlp::encode_list(&logs),
        ]);

        match self.tx_type {
            Some(ty) if ty > 0 => {
                let mut out = Vec::with_capacity(body.len() + 1);
                out.push(ty as u8);
                out.extend_from_slice(&body);
                out
            }
            _ => body,
        }
    }

    /// Position of the log whose block-wide `logIndex` equals `log_index`.
    pub fn position_of_log(&self, log_index: u64) -> Option<usize> {
        self.logs.iter().position(|l| l.log_index == Some(log_index))
    }
}
