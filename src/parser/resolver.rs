// Resolution of transactions spending outputs of the same block
//
// Block order is not dependency order. Each pass parses the txs whose
// inputs no longer reference an unresolved tx of the block.

use crate::config::ParserConfig;
use crate::core::{RawTx, Tx, TxId};
use crate::error::Result;
use crate::parser::tx_parser::parse_tx;
use crate::state::{Ledger, WorkingSet};
use std::collections::HashSet;

/// BSQ transactions of one block in their original order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBlock {
    pub txs: Vec<Tx>,
    /// Passes needed to resolve the block
    pub passes: usize,
    /// Txs still unresolved when resolution stopped, treated as non-BSQ
    pub excluded: Vec<TxId>,
}

pub fn resolve_block_txs(raw_txs: &[RawTx], ledger: &Ledger, config: &ParserConfig) -> Result<ResolvedBlock> {
    let mut working_set = WorkingSet::new(ledger);
    let mut pending: Vec<usize> = (0..raw_txs.len()).collect();
    let mut resolved: Vec<(usize, Tx)> = Vec::new();
    let mut passes = 0;

    while !pending.is_empty() && passes < config.max_resolver_passes {
        let pending_ids: HashSet<&TxId> = pending.iter().map(|&i| &raw_txs[i].id).collect();
        let (ready, waiting): (Vec<usize>, Vec<usize>) = pending.iter().partition(|&&i| {
            raw_txs[i]
                .inputs
                .iter()
                .all(|input| !pending_ids.contains(&input.spent_tx_id))
        });
        if ready.is_empty() {
            break;
        }
        passes += 1;

        for i in ready {
            if let Some(tx) = parse_tx(&raw_txs[i], &mut working_set, config)? {
                resolved.push((i, tx));
            }
        }
        log::debug!(
            "Resolver pass {}: {} BSQ txs so far, {} pending",
            passes,
            resolved.len(),
            waiting.len()
        );
        pending = waiting;
    }

    let excluded: Vec<TxId> = pending.iter().map(|&i| raw_txs[i].id.clone()).collect();
    if !excluded.is_empty() {
        log::warn!(
            "Excluding {} unresolved txs after {} passes: {:?}",
            excluded.len(),
            passes,
            excluded
        );
    }

    resolved.sort_by_key(|(i, _)| *i);
    Ok(ResolvedBlock {
        txs: resolved.into_iter().map(|(_, tx)| tx).collect(),
        passes,
        excluded,
    })
}
