// Parsing of a single transaction against the block working set

use crate::config::ParserConfig;
use crate::core::{BondSpend, CandidateTx, OpReturnData, OpReturnType, RawTx, Tx, TxOutputType, parse_op_return};
use crate::error::Result;
use crate::parser::classifier::classify;
use crate::parser::genesis::{is_genesis, validate_genesis};
use crate::state::WorkingSet;

/// Parse one raw transaction.
///
/// Returns `Ok(None)` if the tx spends no BSQ. A BSQ tx consumes its inputs
/// from the working set and makes its BSQ outputs available to later txs of
/// the same block. Only a bad genesis tx is an error.
pub fn parse_tx(raw_tx: &RawTx, working_set: &mut WorkingSet<'_>, config: &ParserConfig) -> Result<Option<Tx>> {
    if is_genesis(raw_tx, &config.genesis_tx_id, config.genesis_block_height) {
        let tx = validate_genesis(raw_tx, config.genesis_total_supply)?;
        working_set.add_outputs(&tx);
        return Ok(Some(tx));
    }

    let mut candidate = CandidateTx::from_raw(raw_tx);
    let height = candidate.block_height;
    let mut bond = BondSpend::None;
    for (position, input) in candidate.inputs.iter_mut().enumerate() {
        let Some(spent) = working_set.spend(&input.spent_output_key()) else {
            continue;
        };
        input.connected_value = Some(spent.value);

        match spent.output_type {
            TxOutputType::LockupOutput if position == 0 => {
                let lock_time = working_set.lock_time(&spent.tx_id).unwrap_or_default();
                bond = bond.merge(BondSpend::Unlock {
                    value: spent.value,
                    unlock_height: height.saturating_add(u32::from(lock_time)),
                });
            }
            TxOutputType::LockupOutput => bond = bond.merge(BondSpend::MisplacedLockup),
            TxOutputType::UnlockOutput { unlock_height } if height < unlock_height => {
                log::warn!("Tx {} spends unlock output {} before height {}", candidate.id, spent.key(), unlock_height);
                bond = bond.merge(BondSpend::Burnt);
            }
            _ => {}
        }
    }
    candidate.bond = bond;

    let accumulated_input_value = candidate.accumulated_input_value();
    if accumulated_input_value == 0 {
        return Ok(None);
    }

    let op_return = parse_op_return(&raw_tx.outputs);
    candidate.burnt_fee = type_outputs(&mut candidate, &op_return, accumulated_input_value);

    let tx = classify(candidate, &op_return, config.dust_floor);
    log::debug!(
        "BSQ tx {} classified as {:?}, burnt fee {} sat",
        tx.id,
        tx.tx_type,
        tx.burnt_fee
    );
    working_set.add_outputs(&tx);
    Ok(Some(tx))
}

/// Assign provisional output types in index order.
/// Returns the BSQ input value left unassigned.
fn type_outputs(candidate: &mut CandidateTx, op_return: &OpReturnData, input_value: u64) -> u64 {
    let issuance_request = op_return
        .op_return_type
        .is_some_and(OpReturnType::is_issuance_request);
    let mut available = input_value;
    let mut more_bsq_allowed = true;
    let mut issuance_candidate_marked = false;

    // A released lockup goes to output[0] with its full value
    if let BondSpend::Unlock { value, unlock_height } = candidate.bond {
        if let Some(first) = candidate.outputs.first_mut() {
            if !first.is_tagged() && first.value == value && value <= available {
                available -= value;
                first.output_type = Some(TxOutputType::UnlockOutput { unlock_height });
            }
        }
    }

    for output in candidate.outputs.iter_mut() {
        if output.output_type.is_some() {
            continue;
        }
        if output.is_tagged() {
            output.output_type = op_return.op_return_type.map(TxOutputType::OpReturnOutput);
            continue;
        }

        output.output_type = Some(if more_bsq_allowed && output.value > 0 && output.value <= available {
            available -= output.value;
            TxOutputType::BsqOutput
        } else if available > 0 && issuance_request && !issuance_candidate_marked {
            issuance_candidate_marked = true;
            // No BSQ outputs after the issuance candidate
            more_bsq_allowed = false;
            TxOutputType::IssuanceCandidateOutput
        } else {
            // BSQ outputs must come first, everything after a BTC output is BTC
            more_bsq_allowed = false;
            TxOutputType::BtcOutput
        });
    }

    available
}
