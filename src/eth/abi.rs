//! Minimal Solidity ABI helpers for the two ERC-20 / locker calls the bridge
//! sends and the `Error(string)` revert payload it reads back.

use super::primitives::{Address, H256, keccak256};

/// `Error(string)` selector used by `require`/`revert` with a message.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Event signature of the locker's lock event.
pub const LOCKED_EVENT: &str = "Locked(address,address,uint256,string)";

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.0[..4]);
    out
}

/// topic[0] of an event.
pub fn event_topic(signature: &str) -> H256 {
    keccak256(signature.as_bytes())
}

fn word_u128(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Calldata for `approve(address spender, uint256 amount)`.
pub fn encode_approve(spender: &Address, amount: u128) -> Vec<u8> {
    let mut data = selector("approve(address,uint256)").to_vec();
    data.extend_from_slice(&word_address(spender));
    data.extend_from_slice(&word_u128(amount));
    data
}

/// Calldata for `lockToken(uint256 amount, string accountId)`.
pub fn encode_lock_token(amount: u128, account_id: &str) -> Vec<u8> {
    let mut data = selector("lockToken(uint256,string)").to_vec();
    data.extend_from_slice(&word_u128(amount));
    // offset of the dynamic string: two head words
    data.extend_from_slice(&word_u128(64));
    data.extend_from_slice(&word_u128(account_id.len() as u128));
    data.extend_from_slice(account_id.as_bytes());
    let padding = (32 - account_id.len() % 32) % 32;
    data.extend(std::iter::repeat_n(0u8, padding));
    data
}

/// Decode the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    let offset = read_usize(body.get(0..32)?)?;
    let len = read_usize(body.get(offset..offset + 32)?)?;
    let start = offset + 32;
    let bytes = body.get(start..start + len)?;
    String::from_utf8(bytes.to_vec()).ok()
}

fn read_usize(word: &[u8]) -> Option<usize> {
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(buf)).ok()
}
