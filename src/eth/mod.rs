//! Source-chain object model
//!
//! Blocks, receipts and logs as Ethereum JSON-RPC returns them, and their
//! canonical RLP encodings used by the inclusion proof.

pub mod abi;
pub mod block;
pub mod primitives;
pub mod receipt;

pub use block::Block;
pub use primitives::{Address, Bytes, H256, Quantity, decode_hex, encode_hex, keccak256};
pub use receipt::{Log, Receipt};
