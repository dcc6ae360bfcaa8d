//! frame_sample - thin a recording down to numbered PNG stills.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use mate_console::sampler;
use mate_console::ui::Ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sample a recorded video into still images")]
struct Args {
    /// Recorded video (`.avi`, or anything FFmpeg reads with decode-ffmpeg).
    #[arg(value_name = "VIDEO")]
    source: PathBuf,

    /// Destination directory. Replaced on every run.
    #[arg(value_name = "DIR")]
    destination: PathBuf,

    /// Stills per second of 30 fps footage (1-30).
    #[arg(long, default_value_t = 30)]
    frame_rate: u32,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if !(1..=30).contains(&args.frame_rate) {
        return Err(anyhow!("frame rate must be between 1 and 30"));
    }
    let ui = Ui::from_args(
        Some(&args.ui),
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );

    let report = {
        let _stage = ui.stage("Sample frames");
        sampler::sample(&args.source, &args.destination, args.frame_rate)?
    };

    println!(
        "frame_sample: kept {} of {} frames (every {}) in {}",
        report.frames_written,
        report.frames_read,
        report.interval,
        report.destination.display()
    );
    Ok(())
}
