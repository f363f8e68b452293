//! Core types used throughout the system
//!
//! Type aliases shared by the store, the chain capabilities and the proof
//! pipeline.

/// Token quantity in the token's smallest unit.
///
/// # Constraints:
/// - **Positive** for every transfer (zero is rejected before any chain call)
/// - **Immutable** once a transfer record exists
/// - Wide enough for 18-decimal ERC-20 supplies and yocto-denominated deposits
pub type Amount = u128;

/// Source-chain block number.
pub type BlockHeight = u64;

/// Serde adapter persisting [`Amount`] as a decimal string.
///
/// JSON readers that parse numbers as doubles lose precision above 2^53, so
/// amounts are written as strings. Plain JSON/YAML integers are still
/// accepted on read.
pub mod amount_serde {
    use super::Amount;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl Visitor<'_> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(v as Amount)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.trim()
                .parse()
                .map_err(|e| E::custom(format!("invalid amount '{}': {}", v, e)))
        }
    }
}
