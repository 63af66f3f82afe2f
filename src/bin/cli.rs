//! blocklog CLI
//!
//! Command-line interface for a local blocklog store.

use std::path::PathBuf;
use std::process;

use blocklog::segment::list_segments;
use blocklog::{Config, StoreManager};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// blocklog CLI
#[derive(Parser, Debug)]
#[command(name = "blocklog-cli")]
#[command(about = "CLI for the blocklog block store")]
#[command(version)]
struct Args {
    /// Segment directory
    #[arg(short, long, default_value = "./blocklog_data/segments")]
    root_dir: PathBuf,

    /// Index directory
    #[arg(short, long, default_value = "./blocklog_data/index")]
    index_dir: PathBuf,

    /// Segment size in bytes before rotating
    #[arg(short = 's', long, default_value_t = blocklog::config::DEFAULT_MAX_SEGMENT_SIZE)]
    max_segment_size: u64,

    /// Re-derive missing index entries on open
    #[arg(long)]
    repair_index: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store data and print its block id
    Write {
        /// The data to store
        data: String,
    },

    /// Print the data stored under a block id
    Read {
        /// The block id returned by `write`
        id: String,
    },

    /// Scan segments and report their valid prefix (read-only)
    Verify {
        /// Segment sequence number; all segments when omitted
        seq: Option<u64>,
    },

    /// Open the store and print the recovery report
    Status,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blocklog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> blocklog::Result<()> {
    if let Commands::Verify { seq } = args.command {
        return verify(&args.root_dir, seq);
    }

    let config = Config::builder()
        .root_dir(&args.root_dir)
        .index_dir(&args.index_dir)
        .max_segment_size(args.max_segment_size)
        .repair_index_on_open(args.repair_index)
        .build()?;

    let store = StoreManager::open_with_config(config)?;

    let result = match &args.command {
        Commands::Write { data } => store.write(data.as_bytes()).map(|id| println!("{}", id)),
        Commands::Read { id } => store
            .read(id)
            .map(|payload| println!("{}", String::from_utf8_lossy(&payload))),
        Commands::Status => {
            let report = store.recovery_report();
            println!("segments dir:     {}", store.root_dir().display());
            println!("index dir:        {}", store.index_dir().display());
            println!("max segment size: {}", store.config().max_segment_size);
            println!("checkpoint found: {}", report.checkpoint_found);
            println!(
                "checkpoint:       segment {} offset {}",
                report.checkpoint.last_segment_seq, report.checkpoint.last_good_offset
            );
            println!("frames scanned:   {}", report.frames_scanned);
            println!("frames adopted:   {}", report.frames_adopted);
            println!("bytes truncated:  {}", report.bytes_truncated);
            println!("indexes repaired: {}", report.indexes_repaired);
            store
                .segment_count()
                .map(|count| println!("segments:         {}", count))
        }
        Commands::Verify { .. } => Ok(()),
    };

    // Close even when the command failed; report the command's error first
    let closed = store.close();
    result.and(closed)
}

fn verify(root_dir: &std::path::Path, seq: Option<u64>) -> blocklog::Result<()> {
    let seqs = match seq {
        Some(seq) => vec![seq],
        None => list_segments(root_dir)?,
    };

    for seq in seqs {
        let report = StoreManager::verify_segment(root_dir, seq)?;
        println!(
            "segment {:06}: {} frames, {} valid bytes, {} trailing bytes",
            report.segment_seq,
            report.scan.frames,
            report.scan.last_good_offset,
            report.trailing_bytes()
        );
    }

    Ok(())
}
