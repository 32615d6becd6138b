// Error types surfaced to the block-ingestion caller

use crate::core::BlockHash;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The block does not extend the current tip. Recoverable through the reorg protocol.
    #[error("block at height {height} is not connecting: expected prev hash {expected_prev_hash}, got {actual_hash}")]
    BlockNotConnecting {
        height: u32,
        expected_prev_hash: BlockHash,
        actual_hash: BlockHash,
    },

    /// Genesis configuration does not match the chain data. Fatal.
    #[error("invalid genesis tx: {0}")]
    InvalidGenesisTx(String),

    #[error("chain data source error: {0}")]
    Source(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

impl ParseError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ParseError::BlockNotConnecting { .. })
    }
}

impl From<sled::Error> for ParseError {
    fn from(err: sled::Error) -> Self {
        ParseError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Storage(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ParseError>;
