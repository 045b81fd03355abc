use anyhow::Result;
use audio_feature_batch_extract::{run_extraction, ExtractionOptions};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// input audio file or directory to scan
    input: PathBuf,

    /// output CSV path
    output: PathBuf,

    /// target sample rate for loading and analysis
    #[arg(short, long, default_value_t = 44100)]
    rate: u32,

    /// target loudness in LUFS, pass 0 to disable normalization
    #[arg(short, long, default_value_t = -24.0, allow_hyphen_values = true)]
    normalize: f64,

    /// number of threads to use, default to CPU core count
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_filters("symphonia=error")
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();

    // --- Configuration ---
    let options = ExtractionOptions {
        input: cli.input,
        output: cli.output,
        sample_rate: cli.rate,
        // 0 is the opt-out sentinel; a usable target is always negative
        normalize_lufs: (cli.normalize != 0.0).then_some(cli.normalize),
        num_threads: cli.threads,
    };

    info!("Starting feature extraction with options:");
    info!("  Input: {:?}", options.input);
    info!("  Output: {:?}", options.output);
    info!("  Sample Rate: {} Hz", options.sample_rate);
    if let Some(target) = options.normalize_lufs {
        info!("  Normalization Target: {:.2} LUFS", target);
    } else {
        info!("  Normalization: disabled");
    }
    if let Some(n) = options.num_threads {
        info!("  Threads: {}", n);
    } else {
        info!("  Threads: Default");
    }
    info!("---");

    match run_extraction(&options) {
        Ok(_) => {
            info!("Feature extraction finished successfully!");
            Ok(())
        }
        Err(e) => {
            error!("Feature extraction failed: {}", e);
            Err(e)?
        }
    }
}
