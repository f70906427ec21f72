//! imagepile — content-addressed block-pool store for deduplicating disk
//! images.
//!
//! Usage:
//!   imagepile add [trim] <input> <manifest>
//!   imagepile read <manifest> <output>

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use imagepile::config::StorePaths;
use imagepile::manifest::{reconstruct, ingest};
use imagepile::store::Store;
use imagepile::storage::pool::BlockPool;
use imagepile::BLOCK_SIZE;

#[derive(Parser)]
#[command(name = "imagepile", about = "Content-addressed disk image dedup store", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a raw disk image into the store, writing a manifest.
    Add {
        /// Bytes to trim from the start of the first block (0 <= trim < 4096).
        #[arg(value_parser = parse_trim)]
        trim: Option<u32>,
        /// Input file, or "-" for standard input.
        input: String,
        /// Manifest file to write.
        manifest: PathBuf,
    },
    /// Reconstruct the original stream described by a manifest.
    Read {
        /// Manifest file to read.
        manifest: PathBuf,
        /// Output file, or "-" for standard output.
        output: String,
    },
}

fn parse_trim(s: &str) -> Result<u32, String> {
    let trim: u32 = s.parse().map_err(|_| format!("trim must be a non-negative integer, got '{s}'"))?;
    if trim as usize >= BLOCK_SIZE {
        return Err(format!("trim must be less than {BLOCK_SIZE}, got {trim}"));
    }
    Ok(trim)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Add { trim, input, manifest } => run_add(trim.unwrap_or(0), &input, &manifest),
        Command::Read { manifest, output } => run_read(&manifest, &output),
    };

    if let Err(e) = result {
        error!(error = %e, "{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_add(trim: u32, input: &str, manifest: &PathBuf) -> imagepile::Result<()> {
    if std::path::Path::new(input) == manifest.as_path() {
        return Err(imagepile::ImagepileError::Config(
            "input and output paths must differ".into(),
        ));
    }

    let paths = StorePaths::from_env()?;
    info!(pool = ?paths.pool, index = ?paths.index, "opening store");
    let mut store = Store::open(&paths)?;

    let stats = if input == "-" {
        let stdin = std::io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        ingest(&mut store, &mut reader, trim, manifest, None)?
    } else {
        let file = File::open(input)
            .map_err(|e| imagepile::ImagepileError::Open { path: input.into(), source: e })?;
        let total = file.metadata().map(|m| m.len()).ok();
        let mut reader = BufReader::new(file);
        ingest(&mut store, &mut reader, trim, manifest, total)?
    };

    println!(
        "Stats: {} total searches, {} hash failures",
        stats.total_comparisons, stats.hash_failures
    );
    Ok(())
}

fn run_read(manifest: &PathBuf, output: &str) -> imagepile::Result<()> {
    let paths = StorePaths::from_env()?;
    let mut pool = BlockPool::open_read_only(&paths.pool)?;

    if output == "-" {
        let stdout = std::io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        reconstruct(&mut pool, manifest, &mut writer)?;
    } else {
        if std::path::Path::new(output) == manifest.as_path() {
            return Err(imagepile::ImagepileError::Config(
                "input and output paths must differ".into(),
            ));
        }
        let file = File::create(output)
            .map_err(|e| imagepile::ImagepileError::Open { path: output.into(), source: e })?;
        let mut writer = BufWriter::new(file);
        reconstruct(&mut pool, manifest, &mut writer)?;
    }
    Ok(())
}
