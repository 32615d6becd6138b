// Basic types for the BSQ ledger

use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit hash type (32 bytes)
/// Used for the ledger state hash chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Create a new Hash256 from a byte array
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Zero hash, the state hash before the first block
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Declares a string identifier as handed out by the chain data source.
/// The parser never interprets these, it only compares them.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Transaction id
    TxId
);

string_id!(
    /// Block hash
    BlockHash
);

/// Output identifier - transaction id + output index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxOutputKey {
    pub tx_id: TxId,
    pub index: u32,
}

impl TxOutputKey {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for TxOutputKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_zero() {
        let zero = Hash256::zero();
        assert_eq!(zero.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_hash256_hex() {
        let hash = Hash256::new([0xab; 32]);
        assert_eq!(hash.to_hex(), "ab".repeat(32));
        assert_eq!(hash.to_string(), hash.to_hex());
    }

    #[test]
    fn test_tx_output_key_display() {
        let key = TxOutputKey::new(TxId::from("TX1_ID"), 2);
        assert_eq!(key.to_string(), "TX1_ID:2");
    }

    #[test]
    fn test_tx_output_key_ordering() {
        // The unspent index iterates in key order, which must not depend on insertion order
        let a = TxOutputKey::new(TxId::from("a"), 1);
        let b = TxOutputKey::new(TxId::from("a"), 10);
        let c = TxOutputKey::new(TxId::from("b"), 0);
        let mut keys = vec![c.clone(), b.clone(), a.clone()];
        keys.sort();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_tx_id_serde_is_transparent() {
        let id = TxId::from("genesisTxId");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"genesisTxId\"");
    }
}
