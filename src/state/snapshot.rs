// Periodic ledger checkpoints for reorg recovery

use crate::error::Result;
use crate::state::Ledger;
use crate::storage::SnapshotStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable copy of the ledger at a checkpoint height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub height: u32,
    pub ledger: Ledger,
}

/// Keeps the latest snapshots in memory and, when a store is attached,
/// on disk.
///
/// Readers clone an `Arc` under the read lock, so a snapshot being taken
/// concurrently is either fully visible or not at all.
pub struct SnapshotManager {
    grid: u32,
    retention: usize,
    genesis_height: u32,
    snapshots: RwLock<BTreeMap<u32, Arc<Snapshot>>>,
    store: Option<SnapshotStore>,
}

impl SnapshotManager {
    pub fn new(grid: u32, retention: usize, genesis_height: u32) -> Self {
        Self {
            grid: grid.max(1),
            retention: retention.max(1),
            genesis_height,
            snapshots: RwLock::new(BTreeMap::new()),
            store: None,
        }
    }

    /// Attach persistent storage and load the latest persisted snapshot
    pub fn with_store(mut self, store: SnapshotStore, genesis_total_supply: u64) -> Result<Self> {
        if let Some((height, blocks)) = store.latest_snapshot()? {
            let ledger = Ledger::from_blocks(genesis_total_supply, blocks)?;
            log::info!("Loaded persisted snapshot at height {}", height);
            self.snapshots
                .write()
                .insert(height, Arc::new(Snapshot { height, ledger }));
        }
        self.store = Some(store);
        Ok(self)
    }

    pub fn store(&self) -> Option<&SnapshotStore> {
        self.store.as_ref()
    }

    pub fn is_snapshot_height(&self, height: u32) -> bool {
        height >= self.genesis_height && height % self.grid == 0
    }

    /// Checkpoint the ledger if its tip sits on the snapshot grid.
    /// Returns the height of the new snapshot.
    pub fn maybe_take(&self, ledger: &Ledger) -> Result<Option<u32>> {
        let Some(height) = ledger.chain_height() else {
            return Ok(None);
        };
        if !self.is_snapshot_height(height) {
            return Ok(None);
        }

        if let Some(store) = &self.store {
            store.store_snapshot(height, ledger.blocks())?;
        }

        let snapshot = Arc::new(Snapshot {
            height,
            ledger: ledger.clone(),
        });
        let pruned = {
            let mut snapshots = self.snapshots.write();
            snapshots.insert(height, snapshot);
            let mut pruned = Vec::new();
            while snapshots.len() > self.retention {
                if let Some((old, _)) = snapshots.pop_first() {
                    pruned.push(old);
                }
            }
            pruned
        };

        if let Some(store) = &self.store {
            for old in &pruned {
                store.remove_snapshot(*old)?;
            }
        }

        log::info!("Snapshot taken at height {}", height);
        Ok(Some(height))
    }

    /// Most recent snapshot at or below a height
    pub fn latest_at_or_below(&self, height: u32) -> Option<Arc<Snapshot>> {
        self.snapshots
            .read()
            .range(..=height)
            .next_back()
            .map(|(_, snapshot)| Arc::clone(snapshot))
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshots
            .read()
            .last_key_value()
            .map(|(_, snapshot)| Arc::clone(snapshot))
    }

    /// Forget snapshots taken on an abandoned branch
    pub fn drop_above(&self, height: u32) -> Result<usize> {
        let Some(first_stale) = height.checked_add(1) else {
            return Ok(0);
        };
        let dropped = self.snapshots.write().split_off(&first_stale).len();
        if let Some(store) = &self.store {
            store.remove_above(height)?;
        }
        Ok(dropped)
    }

    pub fn heights(&self) -> Vec<u32> {
        self.snapshots.read().keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.snapshots.read().len()
    }
}
