// BSQ parsing - genesis, classification, intra-block resolution and block ingestion

pub mod classifier;
pub mod genesis;
pub mod resolver;
pub mod tx_parser;
mod chain_parser;

pub use chain_parser::{ChainParser, ParseEvent};
pub use classifier::{classify, evaluate_tx_type};
pub use genesis::{is_genesis, validate_genesis};
pub use resolver::{ResolvedBlock, resolve_block_txs};
pub use tx_parser::parse_tx;
