//! StashKV Admin CLI
//!
//! Inspect and maintain a store file from the command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use stashkv::log::LogRecovery;
use stashkv::{Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// StashKV CLI
#[derive(Parser, Debug)]
#[command(name = "stashkv")]
#[command(about = "Admin tool for StashKV store files")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./stash.db")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show key and file statistics
    Stats,

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Store a string value
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Time-to-live in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Purge expired entries
    Cleanup,

    /// Rewrite the file down to its live records
    Compact,

    /// Scan the file for damage without opening it for writes
    Verify,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> stashkv::Result<()> {
    if let Commands::Verify = args.command {
        let result = LogRecovery::verify(&args.file)?;
        println!("records:    {}", result.records_recovered);
        println!("valid_len:  {}", result.valid_len);
        println!(
            "torn_tail:  {}",
            if result.was_truncated { "yes" } else { "no" }
        );
        return Ok(());
    }

    let store = Store::open(Config::new(&args.file))?;

    match args.command {
        Commands::Stats => {
            let stats = store.stats()?;
            println!("keys:       {}", stats.indexed_keys);
            println!("expired:    {}", stats.expired_keys);
            println!("file_size:  {}", stats.file_size);
        }
        Commands::Get { key } => match store.get_value(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Put { key, value, ttl } => {
            store.put(&key, value, ttl.map(Duration::from_secs))?;
            println!("OK");
        }
        Commands::Del { key } => {
            let removed = store.delete(&key)?;
            println!("{}", if removed { 1 } else { 0 });
        }
        Commands::Cleanup => {
            let removed = store.cleanup()?;
            println!("removed {} expired entries", removed);
        }
        Commands::Compact => {
            let stats = store.compact()?;
            println!(
                "kept {} records, dropped {} expired, {} -> {} bytes",
                stats.live_records, stats.expired_dropped, stats.bytes_before, stats.bytes_after
            );
        }
        Commands::Verify => {}
    }

    store.close()
}
