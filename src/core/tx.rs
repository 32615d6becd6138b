// Finalized BSQ transactions

use crate::core::serialize::{write_opt_bytes, write_opt_u64, write_var_str, write_varint};
use crate::core::op_return::lockup_lock_time;
use crate::core::{BlockHash, OpReturnType, Serializable, TxId, TxOutputKey};
use std::io::Write;

/// Terminal classification of a BSQ transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TxType {
    Genesis,
    TransferBsq,
    Proposal,
    CompensationRequest,
    ReimbursementRequest,
    BlindVote,
    VoteReveal,
    Lockup,
    AssetListingFee,
    ProofOfBurn,
    /// Untagged tx burning part of its BSQ input as a trade fee
    PayTradeFee,
    /// Untagged tx releasing a lockup into an unlock output
    Unlock,
    /// Structurally invalid, all BSQ inputs are burnt
    Invalid,
}

impl TxType {
    fn as_byte(self) -> u8 {
        match self {
            TxType::Genesis => 0x01,
            TxType::TransferBsq => 0x02,
            TxType::Proposal => 0x03,
            TxType::CompensationRequest => 0x04,
            TxType::ReimbursementRequest => 0x05,
            TxType::BlindVote => 0x06,
            TxType::VoteReveal => 0x07,
            TxType::Lockup => 0x08,
            TxType::AssetListingFee => 0x09,
            TxType::ProofOfBurn => 0x0a,
            TxType::Invalid => 0x0b,
            TxType::PayTradeFee => 0x0c,
            TxType::Unlock => 0x0d,
        }
    }
}

impl From<OpReturnType> for TxType {
    fn from(op_return_type: OpReturnType) -> Self {
        match op_return_type {
            OpReturnType::Proposal => TxType::Proposal,
            OpReturnType::CompensationRequest => TxType::CompensationRequest,
            OpReturnType::ReimbursementRequest => TxType::ReimbursementRequest,
            OpReturnType::BlindVote => TxType::BlindVote,
            OpReturnType::VoteReveal => TxType::VoteReveal,
            OpReturnType::Lockup => TxType::Lockup,
            OpReturnType::AssetListingFee => TxType::AssetListingFee,
            OpReturnType::ProofOfBurn => TxType::ProofOfBurn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TxOutputType {
    GenesisOutput,
    BsqOutput,
    /// Base-coin output, not carrying BSQ
    BtcOutput,
    /// BTC output of a compensation/reimbursement request that becomes BSQ if the request is accepted
    IssuanceCandidateOutput,
    LockupOutput,
    BlindVoteLockStakeOutput,
    VoteRevealUnlockStakeOutput,
    /// Released bond, spendable without penalty from `unlock_height` on
    UnlockOutput { unlock_height: u32 },
    OpReturnOutput(OpReturnType),
    InvalidOutput,
}

impl TxOutputType {
    /// Whether the output carries BSQ and enters the unspent index
    pub fn is_bsq(self) -> bool {
        matches!(
            self,
            TxOutputType::GenesisOutput
                | TxOutputType::BsqOutput
                | TxOutputType::LockupOutput
                | TxOutputType::BlindVoteLockStakeOutput
                | TxOutputType::VoteRevealUnlockStakeOutput
                | TxOutputType::UnlockOutput { .. }
        )
    }

    fn write_to(self, buf: &mut Vec<u8>) -> std::io::Result<()> {
        let tag = match self {
            TxOutputType::GenesisOutput => [0x01, 0],
            TxOutputType::BsqOutput => [0x02, 0],
            TxOutputType::BtcOutput => [0x03, 0],
            TxOutputType::IssuanceCandidateOutput => [0x04, 0],
            TxOutputType::LockupOutput => [0x05, 0],
            TxOutputType::BlindVoteLockStakeOutput => [0x06, 0],
            TxOutputType::VoteRevealUnlockStakeOutput => [0x07, 0],
            TxOutputType::OpReturnOutput(t) => [0x08, t.as_byte()],
            TxOutputType::InvalidOutput => [0x09, 0],
            TxOutputType::UnlockOutput { .. } => [0x0a, 0],
        };
        buf.write_all(&tag)?;
        if let TxOutputType::UnlockOutput { unlock_height } = self {
            buf.write_all(&unlock_height.to_le_bytes())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxInput {
    pub spent_tx_id: TxId,
    pub spent_output_index: u32,
    /// Value of the BSQ output this input consumed, if any
    pub connected_value: Option<u64>,
}

impl TxInput {
    pub fn spent_output_key(&self) -> TxOutputKey {
        TxOutputKey::new(self.spent_tx_id.clone(), self.spent_output_index)
    }

    pub fn is_bsq(&self) -> bool {
        self.connected_value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxOutput {
    pub tx_id: TxId,
    pub index: u32,
    pub value: u64,
    pub block_height: u32,
    pub tagged_payload: Option<Vec<u8>>,
    pub output_type: TxOutputType,
}

impl TxOutput {
    pub fn key(&self) -> TxOutputKey {
        TxOutputKey::new(self.tx_id.clone(), self.index)
    }

    pub fn is_bsq(&self) -> bool {
        self.output_type.is_bsq()
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> std::io::Result<()> {
        // tx_id and height are implied by the enclosing tx
        buf.write_all(&self.index.to_le_bytes())?;
        buf.write_all(&self.value.to_le_bytes())?;
        write_opt_bytes(buf, self.tagged_payload.as_deref())?;
        self.output_type.write_to(buf)
    }
}

/// Finalized transaction, never changed once it is part of a block
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tx {
    pub id: TxId,
    pub block_height: u32,
    pub block_hash: BlockHash,
    pub time: u64,
    pub tx_type: TxType,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// BSQ input value not assigned to any BSQ output
    pub burnt_fee: u64,
}

impl Tx {
    /// Total BSQ consumed by the inputs
    pub fn bsq_input_value(&self) -> u64 {
        self.inputs.iter().filter_map(|input| input.connected_value).sum()
    }

    /// Total value of BSQ carrying outputs
    pub fn bsq_output_value(&self) -> u64 {
        self.bsq_outputs().map(|out| out.value).sum()
    }

    pub fn bsq_outputs(&self) -> impl Iterator<Item = &TxOutput> {
        self.outputs.iter().filter(|out| out.is_bsq())
    }

    /// Lock time in blocks declared by a lockup tx
    pub fn lock_time(&self) -> Option<u16> {
        if self.tx_type != TxType::Lockup {
            return None;
        }
        self.outputs
            .iter()
            .find_map(|out| out.tagged_payload.as_deref())
            .and_then(lockup_lock_time)
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> std::io::Result<()> {
        write_var_str(buf, self.id.as_str())?;
        buf.write_all(&self.block_height.to_le_bytes())?;
        write_var_str(buf, self.block_hash.as_str())?;
        buf.write_all(&self.time.to_le_bytes())?;
        buf.write_all(&[self.tx_type.as_byte()])?;
        buf.write_all(&self.burnt_fee.to_le_bytes())?;

        write_varint(buf, self.inputs.len() as u64)?;
        for input in &self.inputs {
            write_var_str(buf, input.spent_tx_id.as_str())?;
            buf.write_all(&input.spent_output_index.to_le_bytes())?;
            write_opt_u64(buf, input.connected_value)?;
        }

        write_varint(buf, self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.write_to(buf)?;
        }
        Ok(())
    }
}

impl Serializable for Tx {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf).unwrap();
        buf
    }
}
