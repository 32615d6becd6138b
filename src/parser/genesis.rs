// Genesis transaction - mints the whole BSQ supply

use crate::core::{CandidateTx, RawTx, Tx, TxId, TxOutputType, TxType};
use crate::error::{ParseError, Result};

/// Both id and height must match; a partial match is just not genesis
pub fn is_genesis(raw_tx: &RawTx, genesis_tx_id: &TxId, genesis_block_height: u32) -> bool {
    raw_tx.id == *genesis_tx_id && raw_tx.block_height == genesis_block_height
}

/// Type the genesis tx. Its outputs must distribute exactly the total supply.
///
/// Outputs are consumed in order. An output larger than what is still
/// available fails with the value that was left before it.
pub fn validate_genesis(raw_tx: &RawTx, genesis_total_supply: u64) -> Result<Tx> {
    let mut remaining = genesis_total_supply;
    let mut candidate = CandidateTx::from_raw(raw_tx);

    for output in candidate.outputs.iter_mut() {
        remaining = remaining.checked_sub(output.value).ok_or_else(|| {
            ParseError::InvalidGenesisTx(format!(
                "using more than available inputs; remaining input value is {} sat",
                remaining
            ))
        })?;
        output.output_type = Some(TxOutputType::GenesisOutput);
    }

    if remaining > 0 {
        return Err(ParseError::InvalidGenesisTx(format!(
            "not using all available inputs; remaining input value is {} sat",
            remaining
        )));
    }

    log::info!("Genesis tx {} at height {}", raw_tx.id, raw_tx.block_height);
    Ok(candidate.finalize(TxType::Genesis))
}
