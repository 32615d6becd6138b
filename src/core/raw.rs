// Raw chain data as delivered by the chain data source

use crate::core::{BlockHash, TxId};
use serde::{Deserialize, Serialize};

/// Block header data needed for parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u32,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    /// Transaction ids in block order
    pub tx_ids: Vec<TxId>,
}

impl RawBlock {
    pub fn new(height: u32, hash: BlockHash, prev_hash: BlockHash, tx_ids: Vec<TxId>) -> Self {
        Self {
            height,
            hash,
            prev_hash,
            tx_ids,
        }
    }
}

/// Input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTxInput {
    pub spent_tx_id: TxId,
    pub spent_output_index: u32,
}

impl RawTxInput {
    pub fn new(spent_tx_id: TxId, spent_output_index: u32) -> Self {
        Self {
            spent_tx_id,
            spent_output_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTxOutput {
    pub index: u32,
    /// Amount in satoshis
    pub value: u64,
    /// OP_RETURN data, hex encoded in JSON
    #[serde(default, with = "hex_payload", skip_serializing_if = "Option::is_none")]
    pub tagged_payload: Option<Vec<u8>>,
}

impl RawTxOutput {
    pub fn new(index: u32, value: u64) -> Self {
        Self {
            index,
            value,
            tagged_payload: None,
        }
    }

    pub fn tagged(index: u32, value: u64, payload: Vec<u8>) -> Self {
        Self {
            index,
            value,
            tagged_payload: Some(payload),
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.tagged_payload.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTx {
    pub id: TxId,
    pub block_height: u32,
    pub block_hash: BlockHash,
    /// Block time (Unix epoch)
    pub time: u64,
    pub inputs: Vec<RawTxInput>,
    pub outputs: Vec<RawTxOutput>,
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match payload {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
