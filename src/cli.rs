// CLI commands

use crate::config::ParserConfig;
use crate::core::{Tx, TxId, TxOutputKey};
use crate::error::{ParseError, Result};
use crate::parser::{ChainParser, ParseEvent};
use crate::source::{ChainDataSource, InMemoryChainSource};
use crate::state::Ledger;
use crate::storage::SnapshotStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Parser)]
#[command(name = "bsq-parser")]
#[command(about = "BSQ transaction parser and ledger", long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the snapshot database (overrides the config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a chain fixture from genesis or the latest snapshot
    Parse {
        /// JSON file with raw blocks and txs
        #[arg(long)]
        chain: PathBuf,
        /// Last height to parse (default: chain head)
        #[arg(long)]
        to: Option<u32>,
    },

    /// Show ledger info
    Info,

    /// Show a BSQ transaction
    Tx {
        /// Transaction id
        id: String,
    },

    /// Look up an unspent BSQ output
    Utxo {
        tx_id: String,
        index: u32,
    },
}

/// CLI handler
pub struct CliHandler {
    config: ParserConfig,
    data_dir: PathBuf,
}

impl CliHandler {
    /// Create a handler from the global options
    pub fn new(config_path: Option<&PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                ParserConfig::load(path)?
            }
            None => ParserConfig::default(),
        };
        let data_dir = data_dir
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self { config, data_dir })
    }

    /// Handle CLI command
    pub fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Parse { chain, to } => self.parse(chain, to),
            Commands::Info => self.info(),
            Commands::Tx { id } => self.show_tx(&TxId::new(id)),
            Commands::Utxo { tx_id, index } => self.show_utxo(TxOutputKey::new(TxId::new(tx_id), index)),
        }
    }

    fn open_store(&self) -> Result<SnapshotStore> {
        SnapshotStore::new(&self.data_dir)
    }

    fn parse(&self, chain: PathBuf, to: Option<u32>) -> Result<()> {
        let source: Arc<dyn ChainDataSource> = Arc::new(InMemoryChainSource::from_json_file(&chain)?);
        let mut parser = ChainParser::with_snapshot_store(self.config.clone(), self.open_store()?)?;
        println!("Parsing from height {}...", parser.next_height());

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ParseError::Source(format!("Failed to start runtime: {}", e)))?;
        let committed = runtime.block_on(parser.sync_backlog(source, to, |event| match event {
            ParseEvent::ReorgDetected {
                failed_height,
                resume_height,
            } => println!("  Reorg at height {}, resuming at {}", failed_height, resume_height),
            ParseEvent::SnapshotTaken { height } => println!("  Snapshot at height {}", height),
            ParseEvent::BlockCommitted { .. } => {}
        }))?;

        if let Some(store) = parser.snapshots().store() {
            store.store_tip(parser.ledger().blocks())?;
        }

        println!("✓ Parsed {} blocks", committed);
        print_ledger(parser.ledger());
        Ok(())
    }

    /// Ledger as left by the last parse run
    fn load_ledger(&self) -> Result<Ledger> {
        let blocks = self.open_store()?.get_tip()?.unwrap_or_default();
        Ledger::from_blocks(self.config.genesis_total_supply, blocks)
    }

    fn info(&self) -> Result<()> {
        let ledger = self.load_ledger()?;
        if ledger.is_empty() {
            println!("No blocks parsed yet");
            return Ok(());
        }
        print_ledger(&ledger);
        Ok(())
    }

    fn show_tx(&self, id: &TxId) -> Result<()> {
        let ledger = self.load_ledger()?;
        match ledger.get_tx(id) {
            Some(tx) => {
                print_tx(tx);
                Ok(())
            }
            None => Err(ParseError::Source(format!("BSQ tx not found: {}", id))),
        }
    }

    fn show_utxo(&self, key: TxOutputKey) -> Result<()> {
        let ledger = self.load_ledger()?;
        match ledger.get_unspent_output(&key) {
            Some(output) => {
                println!("Unspent output {}:", key);
                println!("  Value: {} sat", output.value);
                println!("  Type: {:?}", output.output_type);
                println!("  Height: {}", output.block_height);
            }
            None => println!("{} is not an unspent BSQ output", key),
        }
        Ok(())
    }
}

fn print_ledger(ledger: &Ledger) {
    println!("BSQ Ledger:");
    if let Some((height, hash)) = ledger.tip() {
        println!("  Height: {}", height);
        println!("  Tip: {}", hash);
    }
    println!("  Genesis supply: {} sat", ledger.genesis_total_supply());
    println!("  BSQ txs: {}", ledger.tx_count());
    println!("  Unspent outputs: {} ({} sat)", ledger.unspent_count(), ledger.total_unspent_value());
    println!("  Burnt fees: {} sat", ledger.total_burnt_fee());
    println!("  State hash: {}", ledger.state_hash());
}

fn print_tx(tx: &Tx) {
    println!("Transaction:");
    println!("  ID: {}", tx.id);
    println!("  Type: {:?}", tx.tx_type);
    println!("  Block: {} ({})", tx.block_height, tx.block_hash);
    println!("  BSQ in: {} sat", tx.bsq_input_value());
    println!("  Burnt fee: {} sat", tx.burnt_fee);
    println!("  Outputs: {}", tx.outputs.len());

    for output in &tx.outputs {
        println!("    [{}] {} sat {:?}", output.index, output.value, output.output_type);
    }
}
