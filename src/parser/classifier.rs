// Transaction type classification
//
// Malformed transactions are classified INVALID, never reported as errors.

use crate::core::{BondSpend, CandidateTx, OpReturnData, OpReturnType, Tx, TxOutputType, TxType};

/// Decide the terminal type of an ordinary (non-genesis) transaction.
///
/// A recognized tag is dispatched even when `op_return.candidate` is false.
/// Bonded inputs are checked first. A burnt bond, a lockup spent by any input
/// but the first, and a lockup not released into output[0] of an untagged tx
/// all make the tx invalid.
pub fn evaluate_tx_type(candidate: &CandidateTx, op_return: &OpReturnData, dust_floor: u64) -> TxType {
    let unlock_output = candidate
        .outputs
        .first()
        .is_some_and(|out| matches!(out.output_type, Some(TxOutputType::UnlockOutput { .. })));
    match candidate.bond {
        BondSpend::Burnt | BondSpend::MisplacedLockup => return TxType::Invalid,
        BondSpend::Unlock { .. } if !unlock_output || op_return.candidate => return TxType::Invalid,
        _ => {}
    }

    match (op_return.candidate, op_return.op_return_type) {
        (true, None) => TxType::Invalid,
        (false, None) if candidate.burnt_fee > 0 => TxType::PayTradeFee,
        (false, None) if unlock_output => TxType::Unlock,
        (false, None) => TxType::TransferBsq,
        (_, Some(op_return_type)) => {
            let valid = match op_return_type {
                OpReturnType::Lockup => candidate
                    .outputs
                    .first()
                    .is_some_and(|out| out.value > dust_floor),
                OpReturnType::Proposal
                | OpReturnType::BlindVote
                | OpReturnType::VoteReveal
                | OpReturnType::AssetListingFee
                | OpReturnType::ProofOfBurn => is_tagged_output_last(candidate),
                // output[1] is marked by the output parser before we get here
                OpReturnType::CompensationRequest | OpReturnType::ReimbursementRequest => {
                    candidate.outputs.len() >= 3
                        && candidate.outputs[1].has_type(TxOutputType::IssuanceCandidateOutput)
                }
            };

            if valid {
                TxType::from(op_return_type)
            } else {
                log::debug!(
                    "Tx {} does not meet the structure required by {:?}",
                    candidate.id,
                    op_return_type
                );
                TxType::Invalid
            }
        }
    }
}

fn is_tagged_output_last(candidate: &CandidateTx) -> bool {
    candidate
        .tagged_output_position()
        .is_some_and(|pos| pos + 1 == candidate.outputs.len())
}

/// Classify the candidate and freeze it with final output types
pub fn classify(mut candidate: CandidateTx, op_return: &OpReturnData, dust_floor: u64) -> Tx {
    let tx_type = evaluate_tx_type(&candidate, op_return, dust_floor);

    match tx_type {
        TxType::Invalid => {
            log::warn!("Invalid BSQ tx {}, burning {} sat of BSQ input", candidate.id, candidate.accumulated_input_value());
            for output in candidate.outputs.iter_mut() {
                output.output_type = if output.is_tagged() {
                    Some(TxOutputType::InvalidOutput)
                } else {
                    Some(TxOutputType::BtcOutput)
                };
            }
            candidate.burnt_fee = candidate.accumulated_input_value();
        }
        TxType::Lockup => mark_stake_output(&mut candidate, TxOutputType::LockupOutput),
        TxType::BlindVote => mark_stake_output(&mut candidate, TxOutputType::BlindVoteLockStakeOutput),
        TxType::VoteReveal => mark_stake_output(&mut candidate, TxOutputType::VoteRevealUnlockStakeOutput),
        _ => {}
    }

    if !matches!(tx_type, TxType::CompensationRequest | TxType::ReimbursementRequest) {
        candidate.set_output_types(TxOutputType::IssuanceCandidateOutput, TxOutputType::BtcOutput);
    }

    candidate.finalize(tx_type)
}

/// The stake of lockup and voting txs sits in output[0]
fn mark_stake_output(candidate: &mut CandidateTx, output_type: TxOutputType) {
    if let Some(first) = candidate.outputs.first_mut() {
        if first.has_type(TxOutputType::BsqOutput) {
            first.output_type = Some(output_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DUST_FLOOR;
    use crate::core::{BlockHash, CandidateOutput, TxId, TxInput};

    fn output(index: u32, value: u64, output_type: Option<TxOutputType>) -> CandidateOutput {
        CandidateOutput {
            index,
            value,
            tagged_payload: None,
            output_type,
        }
    }

    fn tagged(index: u32, op_return_type: OpReturnType) -> CandidateOutput {
        let mut payload = vec![0u8; op_return_type.payload_len()];
        payload[0] = op_return_type.as_byte();
        CandidateOutput {
            index,
            value: 0,
            tagged_payload: Some(payload),
            output_type: Some(TxOutputType::OpReturnOutput(op_return_type)),
        }
    }

    fn candidate(input_value: u64, outputs: Vec<CandidateOutput>) -> CandidateTx {
        CandidateTx {
            id: TxId::from("txId"),
            block_height: 200,
            block_hash: BlockHash::from("blockHash"),
            time: 0,
            inputs: vec![TxInput {
                spent_tx_id: TxId::from("prevTxId"),
                spent_output_index: 0,
                connected_value: Some(input_value),
            }],
            outputs,
            burnt_fee: 0,
            bond: BondSpend::None,
        }
    }

    fn bsq(index: u32, value: u64) -> CandidateOutput {
        output(index, value, Some(TxOutputType::BsqOutput))
    }

    #[test]
    fn test_candidate_without_recognized_tag_is_invalid() {
        let tx = candidate(1000, vec![bsq(0, 1000)]);
        let op_return = OpReturnData::new(true, None);
        assert_eq!(evaluate_tx_type(&tx, &op_return, DEFAULT_DUST_FLOOR), TxType::Invalid);
    }

    #[test]
    fn test_no_candidate_no_tag_is_transfer() {
        let tx = candidate(1000, vec![bsq(0, 1000)]);
        assert_eq!(
            evaluate_tx_type(&tx, &OpReturnData::none(), DEFAULT_DUST_FLOOR),
            TxType::TransferBsq
        );
    }

    #[test]
    fn test_untagged_tx_with_burnt_fee_pays_trade_fee() {
        let mut tx = candidate(1000, vec![bsq(0, 900)]);
        tx.burnt_fee = 100;
        assert_eq!(
            evaluate_tx_type(&tx, &OpReturnData::none(), DEFAULT_DUST_FLOOR),
            TxType::PayTradeFee
        );
    }

    #[test]
    fn test_unlock_requires_released_output() {
        let unlock_output = output(0, 1000, Some(TxOutputType::UnlockOutput { unlock_height: 210 }));
        let mut tx = candidate(1000, vec![unlock_output]);
        tx.bond = BondSpend::Unlock {
            value: 1000,
            unlock_height: 210,
        };
        assert_eq!(evaluate_tx_type(&tx, &OpReturnData::none(), DEFAULT_DUST_FLOOR), TxType::Unlock);

        let tagged_unlock = OpReturnData::new(true, Some(OpReturnType::Proposal));
        assert_eq!(evaluate_tx_type(&tx, &tagged_unlock, DEFAULT_DUST_FLOOR), TxType::Invalid);

        tx.outputs[0].output_type = Some(TxOutputType::BsqOutput);
        assert_eq!(evaluate_tx_type(&tx, &OpReturnData::none(), DEFAULT_DUST_FLOOR), TxType::Invalid);
    }

    #[test]
    fn test_burnt_bond_is_invalid_even_with_tag() {
        let mut tx = candidate(10_000, vec![bsq(0, 10_000), tagged(1, OpReturnType::Lockup)]);
        tx.bond = BondSpend::Burnt;
        let op_return = OpReturnData::new(true, Some(OpReturnType::Lockup));
        assert_eq!(evaluate_tx_type(&tx, &op_return, DEFAULT_DUST_FLOOR), TxType::Invalid);

        let tx = classify(tx, &op_return, DEFAULT_DUST_FLOOR);
        assert_eq!(tx.burnt_fee, 10_000);
        assert!(tx.bsq_outputs().next().is_none());
    }

    #[test]
    fn test_lockup_tag_without_candidate_flag_dispatches() {
        // Kept as observed: a tag without the candidate flag is still dispatched
        let tx = candidate(10_000, vec![bsq(0, 10_000)]);
        let op_return = OpReturnData::new(false, Some(OpReturnType::Lockup));
        assert_eq!(evaluate_tx_type(&tx, &op_return, DEFAULT_DUST_FLOOR), TxType::Lockup);
    }

    #[test]
    fn test_lockup_requires_value_above_dust() {
        let op_return = OpReturnData::new(true, Some(OpReturnType::Lockup));

        let at_dust = candidate(10_000, vec![bsq(0, DEFAULT_DUST_FLOOR), tagged(1, OpReturnType::Lockup)]);
        assert_eq!(evaluate_tx_type(&at_dust, &op_return, DEFAULT_DUST_FLOOR), TxType::Invalid);

        let above = candidate(10_000, vec![bsq(0, DEFAULT_DUST_FLOOR + 1), tagged(1, OpReturnType::Lockup)]);
        assert_eq!(evaluate_tx_type(&above, &op_return, DEFAULT_DUST_FLOOR), TxType::Lockup);
    }

    #[test]
    fn test_compensation_request_with_one_output_is_invalid() {
        let tx = candidate(1000, vec![tagged(0, OpReturnType::CompensationRequest)]);
        let op_return = OpReturnData::new(true, Some(OpReturnType::CompensationRequest));
        assert_eq!(evaluate_tx_type(&tx, &op_return, DEFAULT_DUST_FLOOR), TxType::Invalid);
    }

    #[test]
    fn test_compensation_request_with_issuance_candidate() {
        let op_return = OpReturnData::new(true, Some(OpReturnType::CompensationRequest));
        let outputs = vec![
            bsq(0, 500),
            output(1, 10_000, Some(TxOutputType::IssuanceCandidateOutput)),
            tagged(2, OpReturnType::CompensationRequest),
        ];
        let tx = candidate(1000, outputs);
        assert_eq!(
            evaluate_tx_type(&tx, &op_return, DEFAULT_DUST_FLOOR),
            TxType::CompensationRequest
        );

        let mut unmarked = tx.clone();
        unmarked.outputs[1].output_type = Some(TxOutputType::BtcOutput);
        assert_eq!(evaluate_tx_type(&unmarked, &op_return, DEFAULT_DUST_FLOOR), TxType::Invalid);
    }

    #[test]
    fn test_tagged_output_must_be_last() {
        for op_return_type in [
            OpReturnType::Proposal,
            OpReturnType::BlindVote,
            OpReturnType::VoteReveal,
            OpReturnType::AssetListingFee,
            OpReturnType::ProofOfBurn,
        ] {
            let op_return = OpReturnData::new(true, Some(op_return_type));

            let last = candidate(1000, vec![bsq(0, 900), tagged(1, op_return_type)]);
            assert_eq!(
                evaluate_tx_type(&last, &op_return, DEFAULT_DUST_FLOOR),
                TxType::from(op_return_type)
            );

            let not_last = candidate(1000, vec![tagged(0, op_return_type), bsq(1, 900)]);
            assert_eq!(evaluate_tx_type(&not_last, &op_return, DEFAULT_DUST_FLOOR), TxType::Invalid);
        }
    }

    #[test]
    fn test_invalid_burns_all_input_and_demotes_outputs() {
        let mut tx = candidate(1000, vec![bsq(0, 600), output(1, 5000, Some(TxOutputType::BtcOutput))]);
        tx.outputs.push(CandidateOutput {
            index: 2,
            value: 0,
            tagged_payload: Some(vec![0xff]),
            output_type: None,
        });
        tx.burnt_fee = 400;

        let classified = classify(tx, &OpReturnData::new(true, None), DEFAULT_DUST_FLOOR);
        assert_eq!(classified.tx_type, TxType::Invalid);
        assert_eq!(classified.outputs[0].output_type, TxOutputType::BtcOutput);
        assert_eq!(classified.outputs[1].output_type, TxOutputType::BtcOutput);
        assert_eq!(classified.outputs[2].output_type, TxOutputType::InvalidOutput);
        assert_eq!(classified.burnt_fee, 1000);
        assert_eq!(classified.bsq_outputs().count(), 0);
    }

    #[test]
    fn test_lockup_marks_stake_output() {
        let tx = candidate(10_000, vec![bsq(0, 10_000), tagged(1, OpReturnType::Lockup)]);
        let classified = classify(tx, &OpReturnData::new(true, Some(OpReturnType::Lockup)), DEFAULT_DUST_FLOOR);
        assert_eq!(classified.tx_type, TxType::Lockup);
        assert_eq!(classified.outputs[0].output_type, TxOutputType::LockupOutput);
        assert_eq!(
            classified.outputs[1].output_type,
            TxOutputType::OpReturnOutput(OpReturnType::Lockup)
        );
    }

    #[test]
    fn test_vote_stake_outputs() {
        let blind_vote = candidate(1000, vec![bsq(0, 1000), tagged(1, OpReturnType::BlindVote)]);
        let classified = classify(
            blind_vote,
            &OpReturnData::new(true, Some(OpReturnType::BlindVote)),
            DEFAULT_DUST_FLOOR,
        );
        assert_eq!(classified.outputs[0].output_type, TxOutputType::BlindVoteLockStakeOutput);

        let reveal = candidate(1000, vec![bsq(0, 1000), tagged(1, OpReturnType::VoteReveal)]);
        let classified = classify(
            reveal,
            &OpReturnData::new(true, Some(OpReturnType::VoteReveal)),
            DEFAULT_DUST_FLOOR,
        );
        assert_eq!(classified.outputs[0].output_type, TxOutputType::VoteRevealUnlockStakeOutput);
    }

    #[test]
    fn test_issuance_candidate_kept_only_for_requests() {
        let outputs = vec![
            bsq(0, 500),
            output(1, 10_000, Some(TxOutputType::IssuanceCandidateOutput)),
            tagged(2, OpReturnType::ReimbursementRequest),
        ];
        let request = classify(
            candidate(1000, outputs.clone()),
            &OpReturnData::new(true, Some(OpReturnType::ReimbursementRequest)),
            DEFAULT_DUST_FLOOR,
        );
        assert_eq!(request.tx_type, TxType::ReimbursementRequest);
        assert_eq!(request.outputs[1].output_type, TxOutputType::IssuanceCandidateOutput);

        let mut transfer_outputs = outputs;
        transfer_outputs.pop();
        let transfer = classify(candidate(1000, transfer_outputs), &OpReturnData::none(), DEFAULT_DUST_FLOOR);
        assert_eq!(transfer.tx_type, TxType::TransferBsq);
        assert_eq!(transfer.outputs[1].output_type, TxOutputType::BtcOutput);
    }
}
