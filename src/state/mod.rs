// Ledger state - committed blocks, per-block working set and snapshots

mod ledger;
mod snapshot;
mod working_set;

pub use ledger::Ledger;
pub use snapshot::{Snapshot, SnapshotManager};
pub use working_set::WorkingSet;
