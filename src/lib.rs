// BSQ parser
// Classifies BSQ colored-coin transactions and maintains the BSQ ledger

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod parser;
pub mod source;
pub mod state;
pub mod storage;

// Re-exports for convenience
pub use cli::{Cli, CliHandler, Commands};
pub use config::ParserConfig;
pub use core::{BsqBlock, RawBlock, RawTx, Tx, TxId, TxOutput, TxOutputType, TxType};
pub use error::{ParseError, Result};
pub use parser::{ChainParser, ParseEvent};
pub use source::{ChainDataSource, InMemoryChainSource};
pub use state::{Ledger, Snapshot, SnapshotManager};
pub use storage::SnapshotStore;
