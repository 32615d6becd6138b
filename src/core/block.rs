// BSQ block record

use crate::core::serialize::{write_var_str, write_varint};
use crate::core::{BlockHash, Serializable, Tx};
use std::io::Write;

/// Block of the BSQ chain - the BSQ transactions of one base-chain block
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BsqBlock {
    pub height: u32,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    /// BSQ transactions in block order
    pub txs: Vec<Tx>,
}

impl BsqBlock {
    pub fn new(height: u32, hash: BlockHash, prev_hash: BlockHash, txs: Vec<Tx>) -> Self {
        Self {
            height,
            hash,
            prev_hash,
            txs,
        }
    }

    pub fn burnt_fee(&self) -> u64 {
        self.txs.iter().map(|tx| tx.burnt_fee).sum()
    }
}

impl Serializable for BsqBlock {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.write_all(&self.height.to_le_bytes()).unwrap();
        write_var_str(&mut buf, self.hash.as_str()).unwrap();
        write_var_str(&mut buf, self.prev_hash.as_str()).unwrap();

        write_varint(&mut buf, self.txs.len() as u64).unwrap();
        for tx in &self.txs {
            buf.write_all(&tx.serialize()).unwrap();
        }

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxId, TxType};

    fn tx(id: &str, burnt_fee: u64) -> Tx {
        Tx {
            id: TxId::from(id),
            block_height: 5,
            block_hash: BlockHash::from("hash5"),
            time: 0,
            tx_type: TxType::TransferBsq,
            inputs: vec![],
            outputs: vec![],
            burnt_fee,
        }
    }

    #[test]
    fn test_block_burnt_fee() {
        let block = BsqBlock::new(
            5,
            BlockHash::from("hash5"),
            BlockHash::from("hash4"),
            vec![tx("a", 10), tx("b", 5)],
        );
        assert_eq!(block.burnt_fee(), 15);
    }

    #[test]
    fn test_serialization_depends_on_tx_order() {
        let a = BsqBlock::new(5, BlockHash::from("h5"), BlockHash::from("h4"), vec![tx("a", 0), tx("b", 0)]);
        let b = BsqBlock::new(5, BlockHash::from("h5"), BlockHash::from("h4"), vec![tx("b", 0), tx("a", 0)]);
        assert_eq!(a.serialize(), a.clone().serialize());
        assert_ne!(a.serialize(), b.serialize());
    }
}
