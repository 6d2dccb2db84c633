//! ledger-tx command line tool
//!
//! Offline helpers around the wire codec: decode and encode transactions,
//! compute digests, read execution status from effects, derive signer
//! addresses and print the effective configuration.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use ledger_tx::codec::{
    decode_effects, decode_transaction, encode_transaction, status_of, transaction_digest,
};
use ledger_tx::config::{Config, LoggingConfig};
use ledger_tx::tx_builder::TransactionData;
use ledger_tx::wallet::Ed25519Signer;
use ledger_tx::Signer;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "LEDGER_TX_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode base64 transaction bytes to JSON
    DecodeTx {
        /// Base64 bytes; read from stdin when omitted
        input: Option<String>,
    },

    /// Encode a JSON transaction to base64 bytes
    EncodeTx {
        /// JSON file; read from stdin when omitted
        file: Option<PathBuf>,
    },

    /// Digest of base64 transaction bytes
    Digest { input: Option<String> },

    /// Execution status of base64 effects bytes
    Status { input: Option<String> },

    /// Decode base64 effects bytes to JSON
    DecodeEffects { input: Option<String> },

    /// Address of the key stored in a key file
    Address {
        #[arg(short, long)]
        key_file: PathBuf,
    },

    /// Print the effective configuration as TOML
    PrintConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let mut logging = config.logging.clone();
    logging.json |= args.json_logs;
    init_logging(&logging)?;

    debug!(command = ?args.command, "running command");
    run(args.command, &config)
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::DecodeTx { input } => {
            let bytes = read_base64(input)?;
            let tx = decode_transaction(&bytes).context("Failed to decode transaction")?;
            print_json(&tx)
        }
        Command::EncodeTx { file } => {
            let json = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => read_stdin()?,
            };
            let tx: TransactionData =
                serde_json::from_str(&json).context("Failed to parse transaction JSON")?;
            let bytes = encode_transaction(&tx).context("Failed to encode transaction")?;
            info!(digest = %transaction_digest(&bytes), len = bytes.len(), "transaction encoded");
            println!("{}", BASE64.encode(&bytes));
            Ok(())
        }
        Command::Digest { input } => {
            let bytes = read_base64(input)?;
            println!("{}", transaction_digest(&bytes));
            Ok(())
        }
        Command::Status { input } => {
            let bytes = read_base64(input)?;
            let status = status_of(&bytes).context("Failed to read execution status")?;
            print_json(&status)
        }
        Command::DecodeEffects { input } => {
            let bytes = read_base64(input)?;
            let effects = decode_effects(&bytes).context("Failed to decode effects")?;
            print_json(&effects)
        }
        Command::Address { key_file } => {
            let signer = Ed25519Signer::from_file(&key_file)
                .with_context(|| format!("Failed to load key from {}", key_file.display()))?;
            println!("{}", signer.address());
            Ok(())
        }
        Command::PrintConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}

fn read_base64(input: Option<String>) -> Result<Vec<u8>> {
    let text = match input {
        Some(text) => text,
        None => read_stdin()?,
    };
    BASE64
        .decode(text.trim())
        .context("Input is not valid base64")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
