//! carp_render - render the map animation from a year/flag table.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use mate_console::carp::{self, MapAnimator, DEFAULT_OUTPUT};
use mate_console::ui::Ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render the carp map animation")]
struct Args {
    /// CSV table: a header row, then `year,flag,flag,...` with Y/N flags.
    #[arg(value_name = "TABLE")]
    table: PathBuf,

    /// Background map image (PNG).
    #[arg(long, env = "MATE_CARP_BACKGROUND", default_value = "illinois.png")]
    background: PathBuf,

    /// Output video.
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::from_args(
        Some(&args.ui),
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );

    let rows = {
        let _stage = ui.stage("Read table");
        carp::read_table(&args.table)?
    };
    let animator = MapAnimator::new(&args.background)?;
    let report = {
        let _stage = ui.stage("Render frames");
        animator.render(&rows, &args.output)?
    };

    println!(
        "carp_render: {} frames ({}x{}) written to {}",
        report.frames,
        report.width,
        report.height,
        report.output.display()
    );
    Ok(())
}
