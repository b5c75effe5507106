//! mpx-capture: real-time FM MPX baseband analyzer
//!
//! Reads interleaved stereo f32 frames from stdin, extracts the 19 kHz
//! pilot level, the 57 kHz RDS subcarrier level, the MPX true-peak, and
//! the BS.412 MPX power, and emits newline-delimited JSON records with
//! a spectrum magnitude vector on stdout. Configuration hot-reloads
//! from a JSON file on disk.

mod config;
mod emit;
mod input;
mod pipeline;

use std::io;
use std::path::PathBuf;

use clap::Parser;

use mpx_core::{AnalyzerConfig, AnalyzerError, AnalyzerResult};

use crate::config::ConfigWatcher;
use crate::emit::Emitter;
use crate::input::FrameReader;
use crate::pipeline::Analyzer;

/// Blocks between config polls (one block = 2048 frames)
const CONFIG_POLL_BLOCKS: u32 = 50;

#[derive(Parser, Debug)]
#[command(name = "mpx-capture", about = "Real-time FM MPX baseband analyzer", version)]
struct Args {
    /// Capture sample rate in Hz
    #[arg(default_value_t = 192_000)]
    sample_rate: u32,

    /// Capture device name (display only)
    #[arg(default_value = "Default")]
    device: String,

    /// FFT size; a power of two >= 512, anything else coerces to 4096
    #[arg(default_value_t = 4096)]
    fft_size: usize,

    /// Path to the hot-reloaded JSON configuration file
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()) {
        log::error!("fatal: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> AnalyzerResult<()> {
    if args.sample_rate == 0 {
        return Err(AnalyzerError::InvalidArgument(
            "sample rate must be non-zero".into(),
        ));
    }
    let sample_rate = args.sample_rate as f64;

    log::info!(
        "init sr:{} fft:{} dev:'{}'",
        args.sample_rate,
        args.fft_size,
        args.device
    );

    let mut cfg = AnalyzerConfig::default();
    let mut watcher = args.config.map(ConfigWatcher::new);
    if let Some(watcher) = watcher.as_mut() {
        watcher.poll(&mut cfg);
    }

    let mut analyzer = Analyzer::new(sample_rate, args.fft_size, cfg);

    let stdin = io::stdin();
    let mut reader = FrameReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut emitter = Emitter::new(stdout.lock());

    let mut blocks_since_poll = 0u32;
    while let Some(frames) = reader.read_block()? {
        blocks_since_poll += 1;
        if blocks_since_poll >= CONFIG_POLL_BLOCKS {
            blocks_since_poll = 0;
            if let Some(watcher) = watcher.as_mut() {
                let mut next = analyzer.config().clone();
                if watcher.poll(&mut next) {
                    analyzer.set_config(next);
                }
            }
        }

        for &frame in frames {
            if let Some(record) = analyzer.process_frame(frame) {
                emitter.write_frame(&record)?;
            }
        }
    }

    log::info!("stream ended");
    Ok(())
}
