// Tagged-data (OP_RETURN) outputs declaring the intent of a BSQ transaction

use crate::core::RawTxOutput;
use serde::{Deserialize, Serialize};

/// Max. payload size relayed by bitcoin core for OP_RETURN outputs
pub const MAX_OP_RETURN_DATA_LEN: usize = 80;

/// Type tag stored in the first payload byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpReturnType {
    Proposal = 0x10,
    CompensationRequest = 0x11,
    ReimbursementRequest = 0x12,
    BlindVote = 0x13,
    VoteReveal = 0x14,
    Lockup = 0x15,
    AssetListingFee = 0x16,
    ProofOfBurn = 0x17,
}

impl OpReturnType {
    /// Convert byte to type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(OpReturnType::Proposal),
            0x11 => Some(OpReturnType::CompensationRequest),
            0x12 => Some(OpReturnType::ReimbursementRequest),
            0x13 => Some(OpReturnType::BlindVote),
            0x14 => Some(OpReturnType::VoteReveal),
            0x15 => Some(OpReturnType::Lockup),
            0x16 => Some(OpReturnType::AssetListingFee),
            0x17 => Some(OpReturnType::ProofOfBurn),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Payload length including type and version byte
    pub fn payload_len(self) -> usize {
        match self {
            // type, version, 20 byte hash
            OpReturnType::Proposal
            | OpReturnType::CompensationRequest
            | OpReturnType::ReimbursementRequest
            | OpReturnType::BlindVote
            | OpReturnType::AssetListingFee
            | OpReturnType::ProofOfBurn => 22,
            // type, version, 20 byte hash, 16 byte secret key
            OpReturnType::VoteReveal => 38,
            // type, version, lock reason, 2 byte lock time, 20 byte hash
            OpReturnType::Lockup => 25,
        }
    }

    pub fn is_issuance_request(self) -> bool {
        matches!(self, OpReturnType::CompensationRequest | OpReturnType::ReimbursementRequest)
    }
}

/// Result of inspecting the tagged outputs of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpReturnData {
    /// The tx carries at least one tagged-data output
    pub candidate: bool,
    /// Decoded tag if the payload is recognized
    pub op_return_type: Option<OpReturnType>,
}

impl OpReturnData {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(candidate: bool, op_return_type: Option<OpReturnType>) -> Self {
        Self {
            candidate,
            op_return_type,
        }
    }
}

/// Inspect the outputs of a transaction for BSQ tagged data.
/// More than one tagged output leaves the candidate unrecognized.
pub fn parse_op_return(outputs: &[RawTxOutput]) -> OpReturnData {
    let mut tagged = outputs.iter().filter(|out| out.is_tagged());
    let Some(first) = tagged.next() else {
        return OpReturnData::none();
    };
    if tagged.next().is_some() {
        log::debug!("Multiple tagged outputs, payload not recognized");
        return OpReturnData::new(true, None);
    }
    OpReturnData::new(true, decode_payload(first))
}

/// Lock time in blocks, big endian at bytes 3..5 of a lockup payload
pub fn lockup_lock_time(payload: &[u8]) -> Option<u16> {
    if payload.len() != OpReturnType::Lockup.payload_len() || payload[0] != OpReturnType::Lockup.as_byte() {
        return None;
    }
    Some(u16::from_be_bytes([payload[3], payload[4]]))
}

fn decode_payload(output: &RawTxOutput) -> Option<OpReturnType> {
    let payload = output.tagged_payload.as_deref()?;
    if output.value != 0 || payload.is_empty() || payload.len() > MAX_OP_RETURN_DATA_LEN {
        return None;
    }
    let op_return_type = OpReturnType::from_byte(payload[0])?;
    (payload.len() == op_return_type.payload_len()).then_some(op_return_type)
}
