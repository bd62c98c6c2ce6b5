//! needlestore CLI
//!
//! Command-line interface for creating and using a local store.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use needlestore::{needle, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// needlestore CLI
#[derive(Parser, Debug)]
#[command(name = "needlestore")]
#[command(about = "Needle-based object store for small blobs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new store directory
    Create {
        /// Store directory (must not exist)
        path: PathBuf,

        /// Store name
        #[arg(short, long, default_value = "default")]
        name: String,

        /// Number of volumes
        #[arg(short, long, default_value = "10")]
        volumes: usize,

        /// Maximum size of each volume in bytes
        #[arg(short, long, default_value = "1073741824")]
        max_volume_size: u64,
    },

    /// Show store metadata and volume usage
    Info {
        /// Store directory
        path: PathBuf,
    },

    /// Store a file under a key
    Put {
        /// Store directory
        path: PathBuf,

        /// Needle key
        key: u64,

        /// File whose contents become the payload
        file: PathBuf,
    },

    /// Fetch the payload stored under a key
    Get {
        /// Store directory
        path: PathBuf,

        /// Needle key
        key: u64,

        /// Write the payload here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,needlestore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> needlestore::Result<()> {
    match command {
        Commands::Create {
            path,
            name,
            volumes,
            max_volume_size,
        } => Store::create(&name, &path, volumes, max_volume_size),

        Commands::Info { path } => {
            let store = Store::open(&path)?;
            println!("name:            {}", store.name());
            println!("volumes:         {}", store.volume_count());
            println!("max_volume_size: {}", store.max_volume_size());
            for volume in store.volumes() {
                println!(
                    "vol-{:<4} keys={:<8} used={:<12} free={}",
                    volume.id(),
                    volume.len(),
                    volume.cur(),
                    volume.free_space()
                );
            }
            store.close()
        }

        Commands::Put { path, key, file } => {
            let store = Store::open(&path)?;
            let data = fs::read(&file)?;
            store.put_bytes(key, needle::checksum(&data), &data)?;
            tracing::info!(
                "Stored {} bytes under key {} in vol-{}",
                data.len(),
                key,
                store.volume_index_for(key)
            );
            store.close()
        }

        Commands::Get { path, key, out } => {
            let store = Store::open(&path)?;
            let (needle, payload) = store.read(key)?;
            if needle::checksum(&payload) != needle.checksum {
                tracing::warn!("Key {} payload does not match its CRC32 checksum", key);
            }
            match out {
                Some(out) => File::create(out)?.write_all(&payload)?,
                None => std::io::stdout().write_all(&payload)?,
            }
            store.close()
        }
    }
}
