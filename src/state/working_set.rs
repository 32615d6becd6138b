// Unspent outputs as seen while resolving one block
//
// Spends and new outputs stay in the overlay; the ledger is only touched
// when the finished block is committed.

use crate::core::{Tx, TxId, TxOutput, TxOutputKey};
use crate::state::Ledger;
use std::collections::{BTreeMap, HashSet};

pub struct WorkingSet<'a> {
    ledger: &'a Ledger,
    spent: HashSet<TxOutputKey>,
    created: BTreeMap<TxOutputKey, TxOutput>,
    /// Lock times of lockup txs resolved in this block
    lock_times: BTreeMap<TxId, u16>,
}

impl<'a> WorkingSet<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self {
            ledger,
            spent: HashSet::new(),
            created: BTreeMap::new(),
            lock_times: BTreeMap::new(),
        }
    }

    /// Get an unspent BSQ output from this block or the ledger
    pub fn get_unspent(&self, key: &TxOutputKey) -> Option<&TxOutput> {
        if self.spent.contains(key) {
            return None;
        }
        self.created
            .get(key)
            .or_else(|| self.ledger.get_unspent_output(key))
    }

    /// Consume an unspent BSQ output
    pub fn spend(&mut self, key: &TxOutputKey) -> Option<TxOutput> {
        let output = self.get_unspent(key)?.clone();
        self.spent.insert(key.clone());
        Some(output)
    }

    /// Make the BSQ outputs of a resolved tx spendable for later txs of the block
    pub fn add_outputs(&mut self, tx: &Tx) {
        for output in tx.bsq_outputs() {
            self.created.insert(output.key(), output.clone());
        }
        if let Some(lock_time) = tx.lock_time() {
            self.lock_times.insert(tx.id.clone(), lock_time);
        }
    }

    /// Lock time of a lockup tx from this block or the ledger
    pub fn lock_time(&self, tx_id: &TxId) -> Option<u16> {
        self.lock_times
            .get(tx_id)
            .copied()
            .or_else(|| self.ledger.get_tx(tx_id).and_then(Tx::lock_time))
    }
}
