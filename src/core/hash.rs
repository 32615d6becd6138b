// Hashing utilities

use crate::core::Hash256;
use sha2::{Digest, Sha256};

/// SHA256 double hash (Bitcoin convention)
/// hash256 = SHA256(SHA256(data))
pub fn hash256(data: &[u8]) -> Hash256 {
    let first_hash = Sha256::digest(data);
    let second_hash = Sha256::digest(first_hash);
    Hash256::new(second_hash.into())
}

/// Next link of the ledger state hash chain
pub fn chain_state_hash(prev: &Hash256, block_bytes: &[u8]) -> Hash256 {
    let mut data = Vec::with_capacity(32 + block_bytes.len());
    data.extend_from_slice(prev.as_bytes());
    data.extend_from_slice(block_bytes);
    hash256(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256() {
        let data = b"hello world";
        let hash = hash256(data);
        assert_eq!(hash, hash256(data));
        assert_ne!(hash, hash256(b"hello world!"));
    }

    #[test]
    fn test_chain_state_hash_depends_on_prev() {
        let bytes = b"block";
        let a = chain_state_hash(&Hash256::zero(), bytes);
        let b = chain_state_hash(&a, bytes);
        assert_ne!(a, b);
    }
}
