// Working copy of a transaction during one block's resolution pass

use crate::core::{BlockHash, RawTx, Tx, TxId, TxInput, TxOutput, TxOutputType, TxType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOutput {
    pub index: u32,
    pub value: u64,
    pub tagged_payload: Option<Vec<u8>>,
    /// Provisional type, `None` until the output parser or classifier decides
    pub output_type: Option<TxOutputType>,
}

impl CandidateOutput {
    pub fn is_tagged(&self) -> bool {
        self.tagged_payload.is_some()
    }

    pub fn has_type(&self, output_type: TxOutputType) -> bool {
        self.output_type == Some(output_type)
    }
}

/// Bonded BSQ consumed by the inputs of a tx
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BondSpend {
    #[default]
    None,
    /// Lockup output spent by input 0, released into an unlock output of the same value
    Unlock { value: u64, unlock_height: u32 },
    /// Lockup output spent by any input but the first
    MisplacedLockup,
    /// Unlock output spent before its lock time ran out, the bond is burnt
    Burnt,
}

impl BondSpend {
    /// Record one more bonded input. A burnt bond dominates a misplaced
    /// lockup, which dominates a valid unlock.
    pub fn merge(self, other: BondSpend) -> BondSpend {
        match (self, other) {
            (BondSpend::Burnt, _) | (_, BondSpend::Burnt) => BondSpend::Burnt,
            (BondSpend::MisplacedLockup, _) | (_, BondSpend::MisplacedLockup) => BondSpend::MisplacedLockup,
            (BondSpend::None, other) => other,
            // Only one lockup may be released per tx
            (BondSpend::Unlock { .. }, BondSpend::Unlock { .. }) => BondSpend::MisplacedLockup,
            (unlock, BondSpend::None) => unlock,
        }
    }
}

/// Mutable candidate, converted into an immutable [`Tx`] by [`CandidateTx::finalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTx {
    pub id: TxId,
    pub block_height: u32,
    pub block_hash: BlockHash,
    pub time: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<CandidateOutput>,
    pub burnt_fee: u64,
    pub bond: BondSpend,
}

impl CandidateTx {
    pub fn from_raw(raw: &RawTx) -> Self {
        Self {
            id: raw.id.clone(),
            block_height: raw.block_height,
            block_hash: raw.block_hash.clone(),
            time: raw.time,
            inputs: raw
                .inputs
                .iter()
                .map(|input| TxInput {
                    spent_tx_id: input.spent_tx_id.clone(),
                    spent_output_index: input.spent_output_index,
                    connected_value: None,
                })
                .collect(),
            outputs: raw
                .outputs
                .iter()
                .map(|output| CandidateOutput {
                    index: output.index,
                    value: output.value,
                    tagged_payload: output.tagged_payload.clone(),
                    output_type: None,
                })
                .collect(),
            burnt_fee: 0,
            bond: BondSpend::None,
        }
    }

    /// BSQ consumed by the connected inputs
    pub fn accumulated_input_value(&self) -> u64 {
        self.inputs.iter().filter_map(|input| input.connected_value).sum()
    }

    /// Index of the last tagged output
    pub fn tagged_output_position(&self) -> Option<usize> {
        self.outputs.iter().rposition(CandidateOutput::is_tagged)
    }

    pub fn set_output_types(&mut self, from: TxOutputType, to: TxOutputType) {
        for output in self.outputs.iter_mut().filter(|out| out.has_type(from)) {
            output.output_type = Some(to);
        }
    }

    /// Freeze the candidate under its terminal type.
    /// Outputs nobody claimed are plain base-coin outputs.
    pub fn finalize(self, tx_type: TxType) -> Tx {
        let outputs = self
            .outputs
            .into_iter()
            .map(|output| TxOutput {
                tx_id: self.id.clone(),
                index: output.index,
                value: output.value,
                block_height: self.block_height,
                tagged_payload: output.tagged_payload,
                output_type: output.output_type.unwrap_or(TxOutputType::BtcOutput),
            })
            .collect();

        Tx {
            id: self.id,
            block_height: self.block_height,
            block_hash: self.block_hash,
            time: self.time,
            tx_type,
            inputs: self.inputs,
            outputs,
            burnt_fee: self.burnt_fee,
        }
    }
}
