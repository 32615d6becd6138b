// Parser configuration

use crate::core::TxId;
use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Mainnet genesis transaction
pub const MAINNET_GENESIS_TX_ID: &str = "4b5417ec5ab6112bedf539c3b4f5a806ed539542d8b717e1c4470aa3180edce5";
pub const MAINNET_GENESIS_BLOCK_HEIGHT: u32 = 571747;
/// 2.5 million BSQ, 100 sat per BSQ
pub const GENESIS_TOTAL_SUPPLY: u64 = 250_000_000;

/// Bitcoin core dust limit for standard outputs
pub const DEFAULT_DUST_FLOOR: u64 = 546;

/// A 1 MB block holds at most about 5300 transactions (min. tx size 189 bytes)
pub const DEFAULT_MAX_RESOLVER_PASSES: usize = 5300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub genesis_tx_id: TxId,
    pub genesis_block_height: u32,
    pub genesis_total_supply: u64,
    /// LOCKUP output[0] must be above this value
    pub dust_floor: u64,
    pub max_resolver_passes: usize,
    /// Snapshot every `snapshot_grid` blocks
    pub snapshot_grid: u32,
    /// Number of snapshots kept
    pub snapshot_retention: usize,
    /// Blocks fetched ahead of the parser during backlog sync
    pub prefetch_depth: usize,
    /// Enables snapshot persistence when set
    pub data_dir: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            genesis_tx_id: TxId::from(MAINNET_GENESIS_TX_ID),
            genesis_block_height: MAINNET_GENESIS_BLOCK_HEIGHT,
            genesis_total_supply: GENESIS_TOTAL_SUPPLY,
            dust_floor: DEFAULT_DUST_FLOOR,
            max_resolver_passes: DEFAULT_MAX_RESOLVER_PASSES,
            snapshot_grid: 20,
            snapshot_retention: 3,
            prefetch_depth: 10,
            data_dir: None,
        }
    }
}

impl ParserConfig {
    /// Config for a chain with the given genesis parameters, other values default
    pub fn with_genesis(genesis_tx_id: impl Into<TxId>, genesis_block_height: u32, genesis_total_supply: u64) -> Self {
        Self {
            genesis_tx_id: genesis_tx_id.into(),
            genesis_block_height,
            genesis_total_supply,
            ..Self::default()
        }
    }

    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ParseError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ParserConfig =
            toml::from_str(content).map_err(|e| ParseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.genesis_tx_id.as_str().is_empty() {
            return Err(ParseError::Config("genesis_tx_id must be set".to_string()));
        }
        if self.genesis_total_supply == 0 {
            return Err(ParseError::Config("genesis_total_supply must be > 0".to_string()));
        }
        if self.max_resolver_passes == 0 {
            return Err(ParseError::Config("max_resolver_passes must be > 0".to_string()));
        }
        if self.snapshot_grid == 0 || self.snapshot_retention == 0 {
            return Err(ParseError::Config(
                "snapshot_grid and snapshot_retention must be > 0".to_string(),
            ));
        }
        if self.prefetch_depth == 0 {
            return Err(ParseError::Config("prefetch_depth must be > 0".to_string()));
        }
        Ok(())
    }
}
