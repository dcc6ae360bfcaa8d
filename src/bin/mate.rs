//! mate - operator console
//!
//! Decodes both camera streams, and reads operator commands from stdin
//! (`help` lists them). Runs until `quit`, end of input or Ctrl-C.

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Instant;

use mate_console::console::{Command, Console, Flow};
use mate_console::reconstruction::OrchestratorState;
use mate_console::ui::{ReconstructionProgress, Ui};
use mate_console::ConsoleConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "MATE operator console")]
struct Args {
    /// JSON config file (same as MATE_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum Input {
    Line(String),
    Shutdown,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("MATE_CONFIG", path);
    }

    let cfg = ConsoleConfig::load()?;
    let tick = cfg.tick;
    let ui = Ui::from_args(
        Some(&args.ui),
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );

    let mut console = Console::from_config(cfg)?;
    console.start()?;

    let (tx, rx) = mpsc::channel();
    let signal_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = signal_tx.send(Input::Shutdown);
    })
    .expect("error setting Ctrl-C handler");

    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(Input::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Input::Shutdown);
        })?;

    log::info!("mate running, type 'help' for commands");

    let mut progress: Option<ReconstructionProgress> = None;
    let mut next_tick = Instant::now() + tick;
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Input::Line(line)) => match Command::parse(&line) {
                Ok(Some(command)) => match console.execute(command) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(err) => log::error!("{:#}", err),
                },
                Ok(None) => {}
                Err(err) => log::warn!("{:#}", err),
            },
            Ok(Input::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if Instant::now() < next_tick {
            continue;
        }
        next_tick = Instant::now() + tick;

        let report = console.tick();
        let running = report.reconstruction_state == OrchestratorState::Running;
        if running && !report.reconstruction.completed {
            progress
                .get_or_insert_with(|| ui.reconstruction("reconstruction"))
                .update(&report.reconstruction);
        } else if let Some(mut bar) = progress.take() {
            bar.update(&report.reconstruction);
            bar.finish(if report.reconstruction.completed {
                "complete"
            } else {
                "stopped"
            });
        }
    }

    console.shutdown();
    Ok(())
}
