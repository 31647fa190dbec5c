//! CLI driver for the fingerprinter: `sabi enroll` and `sabi identify`.
//!
//! Thin glue only, decoding and index wiring live in `sabi_fp::io` and
//! `sabi_fp::orchestrator`; this binary just parses args, owns the `anyhow`
//! boundary, and prints results.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use sabi_fp::index::OpenMode;
use sabi_fp::io::decode::decode_file;
use sabi_fp::io::capture::resample_linear;
use sabi_fp::matcher::CancellationToken;
use sabi_fp::{enroll, identify, open_index, Config, TrackId};

#[derive(Parser, Debug)]
#[command(name = "sabi")]
#[command(about = "Landmark audio fingerprinting: enroll tracks, identify clips")]
struct Args {
    /// Path to the fingerprint index file (created if missing).
    #[arg(short, long, default_value = "index.bin")]
    index: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a reference track to the index.
    Enroll {
        /// Numeric track id to store postings under.
        track_id: u32,
        /// Path to the audio file to fingerprint.
        file: PathBuf,
    },
    /// Identify a query clip against the index.
    Identify {
        /// Path to the query audio file.
        file: PathBuf,
        /// How many ranked candidates to print.
        #[arg(short, long, default_value_t = 5)]
        top_k: usize,
        /// Wall-clock budget in milliseconds before returning a partial ranking.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = Config::default();

    match args.command {
        Command::Enroll { track_id, file } => run_enroll(&args.index, track_id, &file, &config),
        Command::Identify { file, top_k, timeout_ms } => {
            run_identify(&args.index, &file, top_k, timeout_ms, &config)
        }
    }
}

fn load_pcm(path: &PathBuf, config: &Config) -> Result<Vec<f32>> {
    let decoded = decode_file(path).with_context(|| format!("decoding {}", path.display()))?;
    Ok(resample_linear(&decoded.samples, decoded.sample_rate, config.sample_rate))
}

fn run_enroll(index_path: &PathBuf, track_id: u32, file: &PathBuf, config: &Config) -> Result<()> {
    let pcm = load_pcm(file, config)?;
    let mut store = open_index(index_path, OpenMode::Append, config)
        .with_context(|| format!("opening index {}", index_path.display()))?;

    let outcome = enroll(TrackId(track_id), &pcm, &mut store, config)
        .with_context(|| format!("enrolling track {track_id}"))?;
    info!("enrolled track {track_id}: {} hashes", outcome.num_hashes);
    println!("enrolled track {track_id}: {} hashes", outcome.num_hashes);
    Ok(())
}

fn run_identify(
    index_path: &PathBuf,
    file: &PathBuf,
    top_k: usize,
    timeout_ms: u64,
    config: &Config,
) -> Result<()> {
    let pcm = load_pcm(file, config)?;
    let store = open_index(index_path, OpenMode::Read, config)
        .with_context(|| format!("opening index {}", index_path.display()))?;

    let outcome = identify(
        &pcm,
        &store,
        top_k,
        Duration::from_millis(timeout_ms),
        &CancellationToken::new(),
        config,
    )?;

    if outcome.partial {
        println!("(timed out before scanning every query hash, ranking is partial)");
    }
    if outcome.candidates.is_empty() {
        println!("no candidates found");
        return Ok(());
    }
    println!("confident: {}", outcome.confident);
    for candidate in &outcome.candidates {
        println!(
            "track {}: score {} at offset {} frames",
            candidate.track_id.0, candidate.score, candidate.delta
        );
    }
    Ok(())
}
