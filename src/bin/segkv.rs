//! segkv CLI
//!
//! Runs a single command against a local store directory.

use clap::{Parser, Subcommand};
use segkv::{Config, KvError, SegmentedStore};
use tracing_subscriber::{fmt, EnvFilter};

/// segkv
#[derive(Parser, Debug)]
#[command(name = "segkv")]
#[command(about = "Segmented append-only key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./segkv_data")]
    data_dir: String,

    /// Segment rotation threshold in bytes
    #[arg(short = 's', long, default_value_t = segkv::config::DEFAULT_MAX_SEGMENT_SIZE)]
    max_segment_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Compact all segments into one
    Merge,

    /// List segments and their sizes
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .max_segment_size(args.max_segment_size)
        .build();

    let store = match SegmentedStore::open_with_config(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&store, args.command);
    let closed = store.close();

    let code = match (outcome, closed) {
        (Ok(()), Ok(())) => 0,
        (Err(KvError::NotFound), Ok(())) => {
            eprintln!("(not found)");
            1
        }
        (Err(e), _) | (Ok(()), Err(e)) => {
            tracing::error!("{}", e);
            2
        }
    };
    std::process::exit(code);
}

fn run(store: &SegmentedStore, command: Commands) -> segkv::Result<()> {
    match command {
        Commands::Get { key } => {
            let value = store.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put { key, value } => {
            store.put(key.as_bytes(), value.as_bytes())?;
            store.flush()?;
        }
        Commands::Del { key } => store.delete(key.as_bytes())?,
        Commands::Merge => store.merge()?,
        Commands::Stats => {
            for (name, size) in store.segment_sizes()? {
                println!("{}\t{}", name, size);
            }
        }
    }
    Ok(())
}
