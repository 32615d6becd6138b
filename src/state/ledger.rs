// BSQ ledger - linked blocks, tx index and unspent output index

use crate::core::{
    BlockHash, BsqBlock, Hash256, RawBlock, Serializable, Tx, TxId, TxOutput, TxOutputKey, TxType,
    chain_state_hash,
};
use crate::error::{ParseError, Result};
use std::collections::BTreeMap;

/// Ledger state. Owned by the chain parser and threaded explicitly,
/// cloned for snapshots.
///
/// All maps are ordered so that two parsers fed the same chain data hold
/// identical state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    genesis_total_supply: u64,
    blocks: Vec<BsqBlock>,
    /// State hash after each block, parallel to `blocks`
    state_hashes: Vec<Hash256>,
    tx_map: BTreeMap<TxId, Tx>,
    unspent: BTreeMap<TxOutputKey, TxOutput>,
    genesis_tx_id: Option<TxId>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(genesis_total_supply: u64) -> Self {
        Self {
            genesis_total_supply,
            blocks: Vec::new(),
            state_hashes: Vec::new(),
            tx_map: BTreeMap::new(),
            unspent: BTreeMap::new(),
            genesis_tx_id: None,
        }
    }

    /// Rebuild a ledger from committed blocks without re-classifying them
    pub fn from_blocks(genesis_total_supply: u64, blocks: Vec<BsqBlock>) -> Result<Self> {
        let mut ledger = Self::new(genesis_total_supply);
        for block in blocks {
            ledger.check_connecting(block.height, &block.prev_hash)?;
            ledger.commit(block);
        }
        Ok(ledger)
    }

    /// Append the BSQ transactions of a raw block.
    ///
    /// Fails with `BlockNotConnecting` and leaves the ledger untouched if the
    /// block does not extend the tip.
    pub fn add_block(&mut self, raw_block: &RawBlock, txs: Vec<Tx>) -> Result<&BsqBlock> {
        self.check_connecting(raw_block.height, &raw_block.prev_hash)?;

        let block = BsqBlock::new(
            raw_block.height,
            raw_block.hash.clone(),
            raw_block.prev_hash.clone(),
            txs,
        );
        self.commit(block);

        let block = &self.blocks[self.blocks.len() - 1];
        log::debug!(
            "Added block {} at height {} with {} BSQ txs",
            block.hash,
            block.height,
            block.txs.len()
        );
        Ok(block)
    }

    fn check_connecting(&self, height: u32, prev_hash: &BlockHash) -> Result<()> {
        let Some(tip) = self.blocks.last() else {
            return Ok(());
        };
        if tip.hash != *prev_hash || tip.height + 1 != height {
            log::warn!(
                "Block not connecting: height={}, prev_hash={}, tip.height={}, tip.hash={}",
                height,
                prev_hash,
                tip.height,
                tip.hash
            );
            return Err(ParseError::BlockNotConnecting {
                height,
                expected_prev_hash: tip.hash.clone(),
                actual_hash: prev_hash.clone(),
            });
        }
        Ok(())
    }

    fn commit(&mut self, block: BsqBlock) {
        // Txs of a block may spend outputs of txs listed after them, so all
        // outputs go in before any input is removed
        for tx in &block.txs {
            for output in tx.bsq_outputs() {
                self.unspent.insert(output.key(), output.clone());
            }
            if tx.tx_type == TxType::Genesis {
                self.genesis_tx_id = Some(tx.id.clone());
            }
            self.tx_map.insert(tx.id.clone(), tx.clone());
        }
        for input in block.txs.iter().flat_map(|tx| &tx.inputs).filter(|input| input.is_bsq()) {
            self.unspent.remove(&input.spent_output_key());
        }

        let prev_state_hash = self.state_hash();
        self.state_hashes
            .push(chain_state_hash(&prev_state_hash, &block.serialize()));
        self.blocks.push(block);
    }

    pub fn get_tx(&self, tx_id: &TxId) -> Option<&Tx> {
        self.tx_map.get(tx_id)
    }

    pub fn is_unspent(&self, tx_id: &TxId, output_index: u32) -> bool {
        self.unspent
            .contains_key(&TxOutputKey::new(tx_id.clone(), output_index))
    }

    pub fn get_unspent_output(&self, key: &TxOutputKey) -> Option<&TxOutput> {
        self.unspent.get(key)
    }

    pub fn genesis_total_supply(&self) -> u64 {
        self.genesis_total_supply
    }

    pub fn genesis_tx(&self) -> Option<&Tx> {
        self.genesis_tx_id.as_ref().and_then(|id| self.tx_map.get(id))
    }

    /// Height and hash of the last block
    pub fn tip(&self) -> Option<(u32, &BlockHash)> {
        self.blocks.last().map(|block| (block.height, &block.hash))
    }

    pub fn chain_height(&self) -> Option<u32> {
        self.blocks.last().map(|block| block.height)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[BsqBlock] {
        &self.blocks
    }

    pub fn block_at(&self, height: u32) -> Option<&BsqBlock> {
        let first = self.blocks.first()?.height;
        let index = height.checked_sub(first)? as usize;
        self.blocks.get(index)
    }

    /// Hash over all committed blocks, zero for an empty ledger
    pub fn state_hash(&self) -> Hash256 {
        self.state_hashes.last().copied().unwrap_or_else(Hash256::zero)
    }

    pub fn tx_count(&self) -> usize {
        self.tx_map.len()
    }

    pub fn unspent_count(&self) -> usize {
        self.unspent.len()
    }

    pub fn total_unspent_value(&self) -> u64 {
        self.unspent.values().map(|out| out.value).sum()
    }

    pub fn total_burnt_fee(&self) -> u64 {
        self.blocks.iter().map(BsqBlock::burnt_fee).sum()
    }
}
