// Block ingestion - resolves, commits and checkpoints blocks in height order

use crate::config::ParserConfig;
use crate::core::{BlockHash, Hash256, RawBlock, RawTx};
use crate::error::{ParseError, Result};
use crate::parser::resolver::resolve_block_txs;
use crate::source::{ChainDataSource, fetch_block, spawn_prefetch};
use crate::state::{Ledger, SnapshotManager};
use crate::storage::SnapshotStore;
use std::sync::Arc;

/// Notification for observers of the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    BlockCommitted {
        height: u32,
        hash: BlockHash,
        tx_count: usize,
        state_hash: Hash256,
    },
    SnapshotTaken {
        height: u32,
    },
    ReorgDetected {
        failed_height: u32,
        resume_height: u32,
    },
}

/// Owns the ledger and applies blocks to it strictly in order
pub struct ChainParser {
    config: ParserConfig,
    ledger: Ledger,
    snapshots: SnapshotManager,
}

impl ChainParser {
    pub fn new(config: ParserConfig) -> Self {
        let snapshots = SnapshotManager::new(
            config.snapshot_grid,
            config.snapshot_retention,
            config.genesis_block_height,
        );
        Self {
            ledger: Ledger::new(config.genesis_total_supply),
            snapshots,
            config,
        }
    }

    /// Parser with persistent snapshots, resuming from the latest one
    pub fn with_snapshot_store(config: ParserConfig, store: SnapshotStore) -> Result<Self> {
        let snapshots = SnapshotManager::new(
            config.snapshot_grid,
            config.snapshot_retention,
            config.genesis_block_height,
        )
        .with_store(store, config.genesis_total_supply)?;

        let ledger = match snapshots.latest() {
            Some(snapshot) => {
                log::info!("Resuming from snapshot at height {}", snapshot.height);
                snapshot.ledger.clone()
            }
            None => Ledger::new(config.genesis_total_supply),
        };
        Ok(Self {
            config,
            ledger,
            snapshots,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// Height of the next block to parse
    pub fn next_height(&self) -> u32 {
        self.ledger
            .chain_height()
            .map_or(self.config.genesis_block_height, |height| height + 1)
    }

    /// Resolve and commit one block.
    ///
    /// The block is committed as a whole or not at all. Blocks below the
    /// genesis height carry no BSQ and are skipped.
    pub fn process_block(&mut self, raw_block: &RawBlock, raw_txs: &[RawTx]) -> Result<Vec<ParseEvent>> {
        if raw_block.height < self.config.genesis_block_height {
            log::debug!("Skipping block {} below genesis height", raw_block.height);
            return Ok(Vec::new());
        }

        let resolved = resolve_block_txs(raw_txs, &self.ledger, &self.config)?;
        let block = self.ledger.add_block(raw_block, resolved.txs)?;
        let (height, hash, tx_count) = (block.height, block.hash.clone(), block.txs.len());
        log::info!(
            "Committed block {} at height {} with {} BSQ txs ({} resolver passes)",
            hash,
            height,
            tx_count,
            resolved.passes
        );

        let mut events = vec![ParseEvent::BlockCommitted {
            height,
            hash,
            tx_count,
            state_hash: self.ledger.state_hash(),
        }];
        if let Some(height) = self.snapshots.maybe_take(&self.ledger)? {
            events.push(ParseEvent::SnapshotTaken { height });
        }
        Ok(events)
    }

    /// Roll back after `failed_height` did not connect.
    ///
    /// The tip block is stale, so the common ancestor is at most
    /// `failed_height - 2`. Restores the latest snapshot at or below it, or
    /// starts over from genesis, and returns the height to resume from.
    pub fn recover_from_reorg(&mut self, failed_height: u32) -> Result<u32> {
        let fork_point = failed_height.saturating_sub(2);
        let resume_height = match self.snapshots.latest_at_or_below(fork_point) {
            Some(snapshot) => {
                self.ledger = snapshot.ledger.clone();
                snapshot.height + 1
            }
            None => {
                self.ledger = Ledger::new(self.config.genesis_total_supply);
                self.config.genesis_block_height
            }
        };
        let dropped = self.snapshots.drop_above(fork_point)?;

        log::warn!(
            "Reorg detected at height {}, resuming at {} ({} snapshots dropped)",
            failed_height,
            resume_height,
            dropped
        );
        Ok(resume_height)
    }

    /// Parse blocks from the next height up to `to` (default: chain head)
    /// and recover from reorgs on the way. Returns the number of committed
    /// blocks.
    pub fn parse_blocks<F>(&mut self, source: &dyn ChainDataSource, to: Option<u32>, mut on_event: F) -> Result<usize>
    where
        F: FnMut(&ParseEvent),
    {
        let head = source.chain_head_height()?;
        let to = to.map_or(head, |to| to.min(head));
        let mut last_failed = None;
        let mut committed = 0;

        while self.next_height() <= to {
            let fetched = fetch_block(source, self.next_height())?;
            match self.process_block(&fetched.block, &fetched.txs) {
                Ok(events) => {
                    last_failed = None;
                    committed += 1;
                    events.iter().for_each(&mut on_event);
                }
                Err(err) => on_event(&self.handle_parse_error(err, &mut last_failed)?),
            }
        }
        Ok(committed)
    }

    /// Async variant of [`ChainParser::parse_blocks`] for the historical
    /// backlog. Blocks are fetched ahead on the blocking pool while
    /// classification and commit stay sequential.
    pub async fn sync_backlog<F>(&mut self, source: Arc<dyn ChainDataSource>, to: Option<u32>, mut on_event: F) -> Result<usize>
    where
        F: FnMut(&ParseEvent),
    {
        let head_source = Arc::clone(&source);
        let head = tokio::task::spawn_blocking(move || head_source.chain_head_height())
            .await
            .map_err(|e| ParseError::Source(e.to_string()))??;
        let to = to.map_or(head, |to| to.min(head));
        let mut last_failed = None;
        let mut committed = 0;

        'sync: while self.next_height() <= to {
            let mut receiver = spawn_prefetch(
                Arc::clone(&source),
                self.next_height(),
                to,
                self.config.prefetch_depth,
            );
            while let Some(fetched) = receiver.recv().await {
                let fetched = fetched?;
                match self.process_block(&fetched.block, &fetched.txs) {
                    Ok(events) => {
                        last_failed = None;
                        committed += 1;
                        events.iter().for_each(&mut on_event);
                    }
                    Err(err) => {
                        on_event(&self.handle_parse_error(err, &mut last_failed)?);
                        // Prefetched blocks belong to the abandoned range
                        continue 'sync;
                    }
                }
            }
            break;
        }
        Ok(committed)
    }

    /// Turn a non-connecting block into a recovery, pass anything else on.
    /// A second failure at the same height without progress is returned.
    fn handle_parse_error(&mut self, err: ParseError, last_failed: &mut Option<u32>) -> Result<ParseEvent> {
        let ParseError::BlockNotConnecting { height, .. } = err else {
            return Err(err);
        };
        if *last_failed == Some(height) {
            return Err(err);
        }
        *last_failed = Some(height);

        let resume_height = self.recover_from_reorg(height)?;
        Ok(ParseEvent::ReorgDetected {
            failed_height: height,
            resume_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RawTxInput, RawTxOutput, TxId, TxType};
    use crate::source::InMemoryChainSource;

    const GENESIS_HEIGHT: u32 = 10;
    const SUPPLY: u64 = 10_000;

    fn config() -> ParserConfig {
        ParserConfig {
            snapshot_grid: 5,
            snapshot_retention: 3,
            ..ParserConfig::with_genesis("GEN", GENESIS_HEIGHT, SUPPLY)
        }
    }

    fn block(height: u32, hash: &str, prev: &str, txs: &[&RawTx]) -> RawBlock {
        RawBlock::new(
            height,
            BlockHash::from(hash),
            BlockHash::from(prev),
            txs.iter().map(|tx| tx.id.clone()).collect(),
        )
    }

    fn tx(id: &str, height: u32, spent: Option<(&str, u32)>, values: &[u64]) -> RawTx {
        RawTx {
            id: TxId::from(id),
            block_height: height,
            block_hash: BlockHash::new(format!("hash{}", height)),
            time: 0,
            inputs: spent
                .map(|(tx_id, index)| vec![RawTxInput::new(TxId::from(tx_id), index)])
                .unwrap_or_default(),
            outputs: values
                .iter()
                .enumerate()
                .map(|(i, v)| RawTxOutput::new(i as u32, *v))
                .collect(),
        }
    }

    /// Genesis at height 10, empty blocks up to `tip`
    fn chain_source(tip: u32) -> InMemoryChainSource {
        let mut source = InMemoryChainSource::new();
        let genesis = tx("GEN", GENESIS_HEIGHT, None, &[SUPPLY]);
        source.add_block(block(GENESIS_HEIGHT, "hash10", "hash9", &[&genesis]), vec![genesis.clone()]);
        for h in GENESIS_HEIGHT + 1..=tip {
            let raw = RawBlock::new(h, BlockHash::new(format!("hash{}", h)), BlockHash::new(format!("hash{}", h - 1)), vec![]);
            source.add_block(raw, vec![]);
        }
        source
    }

    #[test]
    fn test_process_block_emits_events() {
        let mut parser = ChainParser::new(config());
        let genesis = tx("GEN", GENESIS_HEIGHT, None, &[SUPPLY]);
        let events = parser
            .process_block(&block(GENESIS_HEIGHT, "hash10", "hash9", &[&genesis]), &[genesis])
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ParseEvent::BlockCommitted { height: GENESIS_HEIGHT, tx_count: 1, .. }
        ));
        assert_eq!(events[1], ParseEvent::SnapshotTaken { height: GENESIS_HEIGHT });
        assert_eq!(parser.next_height(), GENESIS_HEIGHT + 1);
        assert_eq!(parser.ledger().genesis_tx().unwrap().tx_type, TxType::Genesis);
    }

    #[test]
    fn test_blocks_below_genesis_are_skipped() {
        let mut parser = ChainParser::new(config());
        let raw = RawBlock::new(3, BlockHash::from("hash3"), BlockHash::from("hash2"), vec![]);
        assert!(parser.process_block(&raw, &[]).unwrap().is_empty());
        assert!(parser.ledger().is_empty());
    }

    #[test]
    fn test_bad_genesis_leaves_ledger_empty() {
        let mut parser = ChainParser::new(config());
        let genesis = tx("GEN", GENESIS_HEIGHT, None, &[SUPPLY - 1]);
        let err = parser
            .process_block(&block(GENESIS_HEIGHT, "hash10", "hash9", &[&genesis]), &[genesis])
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidGenesisTx(_)));
        assert!(!err.is_recoverable());
        assert!(parser.ledger().is_empty());
    }

    #[test]
    fn test_parse_blocks_to_head() {
        let source = chain_source(22);
        let mut parser = ChainParser::new(config());
        let mut events = Vec::new();

        let committed = parser.parse_blocks(&source, None, |e| events.push(e.clone())).unwrap();
        assert_eq!(committed, 13);
        assert_eq!(parser.ledger().tip(), Some((22, &BlockHash::from("hash22"))));
        assert_eq!(parser.snapshots().heights(), vec![10, 15, 20]);
        assert_eq!(
            events.iter().filter(|e| matches!(e, ParseEvent::SnapshotTaken { .. })).count(),
            3
        );
    }

    #[test]
    fn test_parse_blocks_stops_at_target() {
        let source = chain_source(22);
        let mut parser = ChainParser::new(config());
        assert_eq!(parser.parse_blocks(&source, Some(12), |_| {}).unwrap(), 3);
        assert_eq!(parser.next_height(), 13);
    }

    #[test]
    fn test_recover_from_reorg_uses_snapshot() {
        let source = chain_source(22);
        let mut parser = ChainParser::new(config());
        parser.parse_blocks(&source, None, |_| {}).unwrap();

        // failed at 23: tip 22 is stale, ancestor <= 21, snapshot 20
        assert_eq!(parser.recover_from_reorg(23).unwrap(), 21);
        assert_eq!(parser.ledger().chain_height(), Some(20));

        // failed at 21: ancestor <= 19, snapshot 15; snapshot 20 is dropped
        assert_eq!(parser.recover_from_reorg(21).unwrap(), 16);
        assert_eq!(parser.snapshots().heights(), vec![10, 15]);
    }

    #[test]
    fn test_recover_without_snapshot_restarts_at_genesis() {
        let source = chain_source(12);
        let mut parser = ChainParser::new(config());
        parser.parse_blocks(&source, None, |_| {}).unwrap();

        assert_eq!(parser.recover_from_reorg(11).unwrap(), GENESIS_HEIGHT);
        assert!(parser.ledger().is_empty());
        assert_eq!(parser.snapshots().count(), 0);
    }

    #[test]
    fn test_parse_blocks_follows_reorg() {
        let mut source = chain_source(18);
        let mut parser = ChainParser::new(config());
        parser.parse_blocks(&source, None, |_| {}).unwrap();

        // Fork at 17: the new branch replaces blocks 17 and 18 and extends to 19
        for h in 17..=19 {
            let prev = if h == 17 { "hash16".to_string() } else { format!("fork{}", h - 1) };
            let raw = RawBlock::new(h, BlockHash::new(format!("fork{}", h)), BlockHash::new(prev), vec![]);
            source.replace_block(raw, vec![]);
        }
        // The parser still sits on the old tip and sees block 19 first
        let mut events = Vec::new();
        parser.parse_blocks(&source, None, |e| events.push(e.clone())).unwrap();

        assert_eq!(
            events[0],
            ParseEvent::ReorgDetected {
                failed_height: 19,
                resume_height: 16
            }
        );
        assert_eq!(parser.ledger().tip(), Some((19, &BlockHash::from("fork19"))));
        assert_eq!(parser.ledger().block_at(17).unwrap().hash, BlockHash::from("fork17"));
    }

    #[test]
    fn test_with_snapshot_store_resumes() {
        let source = chain_source(17);
        let mut reference = ChainParser::new(config());
        reference.parse_blocks(&source, Some(15), |_| {}).unwrap();

        let store = SnapshotStore::memory().unwrap();
        store.store_snapshot(15, reference.ledger().blocks()).unwrap();
        let mut resumed = ChainParser::with_snapshot_store(config(), store).unwrap();
        assert_eq!(resumed.next_height(), 16);

        reference.parse_blocks(&source, None, |_| {}).unwrap();
        resumed.parse_blocks(&source, None, |_| {}).unwrap();
        assert_eq!(resumed.ledger(), reference.ledger());
        assert_eq!(resumed.snapshots().store().unwrap().snapshot_heights().unwrap(), vec![15]);
    }

    #[tokio::test]
    async fn test_sync_backlog_matches_sequential_parse() {
        let source: Arc<dyn ChainDataSource> = Arc::new(chain_source(30));

        let mut sequential = ChainParser::new(config());
        sequential.parse_blocks(source.as_ref(), None, |_| {}).unwrap();

        let mut backlog = ChainParser::new(config());
        let mut committed_heights = Vec::new();
        let committed = backlog
            .sync_backlog(Arc::clone(&source), None, |e| {
                if let ParseEvent::BlockCommitted { height, .. } = e {
                    committed_heights.push(*height);
                }
            })
            .await
            .unwrap();

        assert_eq!(committed, 21);
        assert_eq!(committed_heights, (10..=30).collect::<Vec<_>>());
        assert_eq!(backlog.ledger().state_hash(), sequential.ledger().state_hash());
    }
}
