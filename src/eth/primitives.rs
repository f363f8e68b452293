//! Fixed-width hashes, addresses and hex-encoded byte strings as they appear
//! in Ethereum JSON-RPC payloads (`0x`-prefixed, lowercase).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::rlp;

/// Parse a `0x`-prefixed hex string into bytes. Odd-length input is
/// left-padded with a zero nibble, which is how quantities come over the wire.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits))
    } else {
        hex::decode(digits)
    }
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Keccak-256 digest.
pub fn keccak256(data: &[u8]) -> H256 {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    H256(out)
}

macro_rules! fixed_bytes {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; $len]>::try_from(bytes).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_hex(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = decode_hex(s).map_err(|e| format!("invalid hex '{}': {}", s, e))?;
                Self::from_slice(&bytes).ok_or_else(|| {
                    format!("expected {} bytes, got {} in '{}'", $len, bytes.len(), s)
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

fixed_bytes!(H256, 32);
fixed_bytes!(Address, 20);

/// Arbitrary-length byte string (`data`, `logsBloom`, `extraData`, ...).
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({})", encode_hex(&self.0))
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map(Bytes).map_err(D::Error::custom)
    }
}

/// Unsigned integer of arbitrary width, kept as minimal big-endian bytes.
///
/// Header fields such as `difficulty` or `baseFeePerGas` are only ever
/// re-encoded, never computed with, so no big-integer arithmetic is needed.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Quantity(Vec<u8>);

impl Quantity {
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Self(rlp::trim_leading_zeros(bytes).to_vec())
    }

    pub fn be_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_u64(&self) -> Option<u64> {
        if self.0.len() > 8 {
            return None;
        }
        Some(self.0.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }

    pub fn rlp(&self) -> Vec<u8> {
        rlp::encode_uint(&self.0)
    }
}

impl From<u64> for Quantity {
    fn from(v: u64) -> Self {
        Self::from_be_bytes(&v.to_be_bytes())
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quantity({})", quantity_string(&self.0))
    }
}

fn quantity_string(be: &[u8]) -> String {
    if be.is_empty() {
        return "0x0".to_string();
    }
    let digits = hex::encode(be);
    format!("0x{}", digits.trim_start_matches('0'))
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&quantity_string(&self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s)
            .map(|b| Quantity::from_be_bytes(&b))
            .map_err(D::Error::custom)
    }
}

/// Serde adapter for `u64` fields sent as hex quantities (`"0x1b4"`).
pub mod hex_u64 {
    use super::*;

    pub fn parse(s: &str) -> Result<u64, String> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity '{}': {}", s, e))
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<u64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u64>, D::Error> {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| parse(&s).map_err(D::Error::custom)).transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_of_empty_rlp_string() {
        // Root hash of an empty Merkle-Patricia trie
        assert_eq!(
            keccak256(&[0x80]).to_string(),
            "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
        );
    }

    #[test]
    fn test_h256_roundtrip_and_case() {
        let upper = "0xD4E56740F876AEF8C010B86A40D5F56745A118D0906A34E69AEC8C0DB1CB8FA3";
        let h: H256 = upper.parse().unwrap();
        assert_eq!(h.to_string(), upper.to_lowercase());
        assert!("0x1234".parse::<H256>().is_err());
    }

    #[test]
    fn test_quantity_parsing() {
        let q: Quantity = serde_json::from_str("\"0x1b4\"").unwrap();
        assert_eq!(q.be_bytes(), &[0x01, 0xb4]);
        assert_eq!(q.as_u64(), Some(436));
        assert_eq!(serde_json::to_string(&q).unwrap(), "\"0x1b4\"");

        let zero: Quantity = serde_json::from_str("\"0x0\"").unwrap();
        assert!(zero.be_bytes().is_empty());
        assert_eq!(zero.rlp(), vec![0x80]);
        assert_eq!(serde_json::to_string(&zero).unwrap(), "\"0x0\"");
    }

    #[test]
    fn test_hex_u64() {
        assert_eq!(hex_u64::parse("0x10").unwrap(), 16);
        assert_eq!(hex_u64::parse("0x0").unwrap(), 0);
        assert!(hex_u64::parse("0xzz").is_err());
    }
}
