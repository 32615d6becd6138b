// Chain data source - supplies raw blocks and transactions

mod prefetch;

pub use prefetch::spawn_prefetch;

use crate::core::{RawBlock, RawTx, TxId};
use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Supplier of raw chain data, typically backed by a full node's RPC.
///
/// Calls may block; the parser only invokes them outside classification.
pub trait ChainDataSource: Send + Sync {
    /// Height of the best block the source knows
    fn chain_head_height(&self) -> Result<u32>;

    fn request_block(&self, height: u32) -> Result<RawBlock>;

    fn request_tx(&self, tx_id: &TxId) -> Result<RawTx>;
}

/// A raw block together with its transactions in block order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBlock {
    pub block: RawBlock,
    pub txs: Vec<RawTx>,
}

/// Fetch a block and all of its transactions
pub fn fetch_block(source: &dyn ChainDataSource, height: u32) -> Result<FetchedBlock> {
    let block = source.request_block(height)?;
    let txs = block
        .tx_ids
        .iter()
        .map(|tx_id| source.request_tx(tx_id))
        .collect::<Result<Vec<_>>>()?;
    Ok(FetchedBlock { block, txs })
}

/// On-disk fixture format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainFixture {
    pub blocks: Vec<RawBlock>,
    pub txs: Vec<RawTx>,
}

/// Chain data held in memory, loaded from a JSON fixture or built up in tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryChainSource {
    blocks: BTreeMap<u32, RawBlock>,
    txs: HashMap<TxId, RawTx>,
}

impl InMemoryChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: ChainFixture) -> Self {
        let mut source = Self::new();
        for tx in fixture.txs {
            source.add_tx(tx);
        }
        for block in fixture.blocks {
            source.blocks.insert(block.height, block);
        }
        source
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: ChainFixture =
            serde_json::from_str(json).map_err(|e| ParseError::Source(format!("Invalid chain fixture: {}", e)))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ParseError::Source(format!("Failed to read {}: {}", path.display(), e)))?;
        log::info!("Loading chain data from {}", path.display());
        Self::from_json(&json)
    }

    pub fn add_tx(&mut self, tx: RawTx) {
        self.txs.insert(tx.id.clone(), tx);
    }

    /// Add a block with its transactions. Replaces any block at that height.
    pub fn add_block(&mut self, block: RawBlock, txs: Vec<RawTx>) {
        for tx in txs {
            self.add_tx(tx);
        }
        self.blocks.insert(block.height, block);
    }

    /// Replace the block at a height and forget every block above it
    pub fn replace_block(&mut self, block: RawBlock, txs: Vec<RawTx>) {
        self.blocks.split_off(&block.height);
        self.add_block(block, txs);
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl ChainDataSource for InMemoryChainSource {
    fn chain_head_height(&self) -> Result<u32> {
        self.blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| ParseError::Source("No blocks available".to_string()))
    }

    fn request_block(&self, height: u32) -> Result<RawBlock> {
        self.blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| ParseError::Source(format!("Block {} not found", height)))
    }

    fn request_tx(&self, tx_id: &TxId) -> Result<RawTx> {
        self.txs
            .get(tx_id)
            .cloned()
            .ok_or_else(|| ParseError::Source(format!("Tx {} not found", tx_id)))
    }
}
