// Snapshot persistence using sled

use crate::core::BsqBlock;
use crate::error::{ParseError, Result};
use sled::Db;
use std::path::Path;

const SNAPSHOT_PREFIX: &[u8] = b"s";
const TIP_KEY: &[u8] = b"tip";

/// Persisted ledger checkpoints.
///
/// A snapshot is stored as the JSON list of its committed blocks and rebuilt
/// with `Ledger::from_blocks`. Keys are big-endian heights so that sled's
/// ordered iteration follows the chain.
pub struct SnapshotStore {
    db: Db,
}

impl SnapshotStore {
    /// Open or create a snapshot store
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Create an in-memory store (for testing)
    pub fn memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn store_snapshot(&self, height: u32, blocks: &[BsqBlock]) -> Result<()> {
        let data = serde_json::to_vec(blocks)?;
        self.db.insert(Self::snapshot_key(height), data)?;
        self.db.flush()?;
        log::debug!("Persisted snapshot at height {}", height);
        Ok(())
    }

    /// Highest persisted snapshot
    pub fn latest_snapshot(&self) -> Result<Option<(u32, Vec<BsqBlock>)>> {
        let Some((key, data)) = self.db.scan_prefix(SNAPSHOT_PREFIX).next_back().transpose()? else {
            return Ok(None);
        };
        let height = Self::height_from_key(&key)?;
        Ok(Some((height, serde_json::from_slice(&data)?)))
    }

    pub fn snapshot_heights(&self) -> Result<Vec<u32>> {
        self.db
            .scan_prefix(SNAPSHOT_PREFIX)
            .keys()
            .map(|key| Self::height_from_key(&key?))
            .collect()
    }

    /// Remove a single snapshot
    pub fn remove_snapshot(&self, height: u32) -> Result<()> {
        self.db.remove(Self::snapshot_key(height))?;
        Ok(())
    }

    /// Remove all snapshots above a height (after a reorg)
    pub fn remove_above(&self, height: u32) -> Result<usize> {
        let stale: Vec<u32> = self
            .snapshot_heights()?
            .into_iter()
            .filter(|h| *h > height)
            .collect();
        for h in &stale {
            self.remove_snapshot(*h)?;
        }
        self.db.flush()?;
        Ok(stale.len())
    }

    /// Store the full chain parsed so far, read back by the query commands
    pub fn store_tip(&self, blocks: &[BsqBlock]) -> Result<()> {
        let data = serde_json::to_vec(blocks)?;
        self.db.insert(TIP_KEY, data)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn get_tip(&self) -> Result<Option<Vec<BsqBlock>>> {
        match self.db.get(TIP_KEY)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn snapshot_key(height: u32) -> Vec<u8> {
        let mut key = SNAPSHOT_PREFIX.to_vec();
        key.extend_from_slice(&height.to_be_bytes());
        key
    }

    fn height_from_key(key: &[u8]) -> Result<u32> {
        let bytes: [u8; 4] = key
            .get(SNAPSHOT_PREFIX.len()..)
            .and_then(|rest| rest.try_into().ok())
            .ok_or_else(|| ParseError::Storage(format!("Invalid snapshot key length: {}", key.len())))?;
        Ok(u32::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BlockHash;

    fn blocks(up_to: u32) -> Vec<BsqBlock> {
        (0..=up_to)
            .map(|h| {
                BsqBlock::new(
                    h,
                    BlockHash::new(format!("hash{}", h)),
                    BlockHash::new(if h == 0 { String::new() } else { format!("hash{}", h - 1) }),
                    vec![],
                )
            })
            .collect()
    }

    #[test]
    fn test_store_and_load_snapshot() {
        let store = SnapshotStore::memory().unwrap();
        store.store_snapshot(5, &blocks(5)).unwrap();

        assert_eq!(store.latest_snapshot().unwrap(), Some((5, blocks(5))));
        assert_eq!(store.snapshot_heights().unwrap(), vec![5]);
    }

    #[test]
    fn test_latest_snapshot_orders_by_height() {
        let store = SnapshotStore::memory().unwrap();
        assert!(store.latest_snapshot().unwrap().is_none());

        // 256 sorts after 10 only with big-endian keys
        store.store_snapshot(256, &blocks(3)).unwrap();
        store.store_snapshot(10, &blocks(2)).unwrap();

        let (height, latest) = store.latest_snapshot().unwrap().unwrap();
        assert_eq!(height, 256);
        assert_eq!(latest.len(), 4);
        assert_eq!(store.snapshot_heights().unwrap(), vec![10, 256]);
    }

    #[test]
    fn test_remove_above() {
        let store = SnapshotStore::memory().unwrap();
        for h in [5, 10, 15] {
            store.store_snapshot(h, &blocks(1)).unwrap();
        }
        assert_eq!(store.remove_above(10).unwrap(), 1);
        assert_eq!(store.snapshot_heights().unwrap(), vec![5, 10]);
    }

    #[test]
    fn test_tip_is_separate_from_snapshots() {
        let store = SnapshotStore::memory().unwrap();
        store.store_tip(&blocks(7)).unwrap();
        assert!(store.snapshot_heights().unwrap().is_empty());
        assert_eq!(store.get_tip().unwrap().unwrap().len(), 8);
    }
}
