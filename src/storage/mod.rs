// Storage layer for ledger snapshots

mod snapshot_store;

pub use snapshot_store::SnapshotStore;
