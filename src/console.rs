//! The operator console.
//!
//! `Console` is the application context: it is built once at startup from a
//! `ConsoleConfig`, owns every component, and is driven by a UI loop that
//! calls `execute` for operator commands and `tick` once per refresh.
//!
//! ```text
//! stream 1 ──> display
//! stream 2 ──> display
//!          ├─> photosphere capture ──> stitch stills
//!          └─> photogrammetry capture ──> reconstruction stills ──> engine
//! table.csv ──> map animator ──> carp.avi
//! ```

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::{CaptureSession, CaptureState};
use crate::carp::{self, MapAnimator, RenderReport};
use crate::config::ConsoleConfig;
use crate::display::Placement;
use crate::ingest::VideoSource;
use crate::notes::Notes;
use crate::reconstruction::{
    open_engine, OrchestratorState, ProgressReport, ReconstructionEngine,
    ReconstructionOrchestrator, ReconstructionPlan,
};
use crate::sampler::FrameSampler;
use crate::task::{TaskSlot, TaskState};

/// Stream the capture sessions listen to.
pub const CAPTURE_STREAM: usize = 1;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionTarget {
    Photosphere,
    Photogrammetry,
}

impl SessionTarget {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "photosphere" | "sphere" => Ok(Self::Photosphere),
            "photogrammetry" | "pgm" => Ok(Self::Photogrammetry),
            other => bail!("unknown session '{}' (photosphere or pgm)", other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Usdz,
    Obj,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start or stop recording for a session.
    Record(SessionTarget),
    /// Sample the photosphere recording into stitch stills.
    Stitch,
    /// Start or stop photogrammetry reconstruction.
    Reconstruct,
    /// Set a session's sampling rate.
    Rate(SessionTarget, u32),
    /// Render the map animation from a CSV table.
    Carp(PathBuf),
    Note(String),
    ShowNotes,
    ClearNotes,
    /// Open a finished model in the system viewer.
    Open(ModelFormat),
    /// Report a stream window's size.
    Resize {
        stream: usize,
        width: u32,
        height: u32,
    },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  record <photosphere|pgm>      start/stop recording
  stitch                        sample the photosphere recording
  reconstruct                   start/stop reconstruction
  rate <photosphere|pgm> <1-30> set the sampling rate
  carp <table.csv>              render the map animation
  note <text>                   append a line to the notes
  notes [clear]                 show or clear the notes
  open <usdz|obj>               open the reconstructed model
  resize <1|2> <w> <h>          set a stream window size
  status                        show component state
  quit";

impl Command {
    /// `None` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match (word, args.as_slice()) {
            ("", _) => return Ok(None),
            ("record", [target]) => Self::Record(SessionTarget::parse(target)?),
            ("stitch", []) => Self::Stitch,
            ("reconstruct", []) => Self::Reconstruct,
            ("rate", [target, rate]) => Self::Rate(
                SessionTarget::parse(target)?,
                rate.parse()
                    .map_err(|_| anyhow!("rate must be a whole number, got '{}'", rate))?,
            ),
            ("carp", [_, ..]) => Self::Carp(PathBuf::from(rest)),
            ("note", _) => Self::Note(rest.to_string()),
            ("notes", []) => Self::ShowNotes,
            ("notes", ["clear"]) => Self::ClearNotes,
            ("open", ["usdz"]) | ("open", ["preview"]) => Self::Open(ModelFormat::Usdz),
            ("open", ["obj"]) | ("open", ["meshlab"]) => Self::Open(ModelFormat::Obj),
            ("resize", [stream, width, height]) => {
                let stream: usize = stream
                    .parse()
                    .map_err(|_| anyhow!("stream must be 1 or 2, got '{}'", stream))?;
                if !(1..=2).contains(&stream) {
                    bail!("stream must be 1 or 2, got {}", stream);
                }
                Self::Resize {
                    stream: stream - 1,
                    width: width
                        .parse()
                        .map_err(|_| anyhow!("invalid width '{}'", width))?,
                    height: height
                        .parse()
                        .map_err(|_| anyhow!("invalid height '{}'", height))?,
                }
            }
            ("status", []) => Self::Status,
            ("help", _) | ("?", _) => Self::Help,
            ("quit", []) | ("exit", []) => Self::Quit,
            _ => bail!("unrecognized command '{}' (try 'help')", line),
        };
        Ok(Some(command))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What the UI shows after a tick.
#[derive(Clone, Debug)]
pub struct TickReport {
    pub reconstruction_state: OrchestratorState,
    pub reconstruction: ProgressReport,
    pub placements: [Option<Placement>; 2],
}

pub struct Console {
    config: ConsoleConfig,
    streams: Vec<VideoSource>,
    photosphere: CaptureSession,
    photogrammetry: CaptureSession,
    stitcher: FrameSampler,
    reconstruction: ReconstructionOrchestrator,
    animator: Arc<MapAnimator>,
    carp: TaskSlot<RenderReport>,
    notes: Notes,
    windows: [(u32, u32); 2],
    last_health_log: Instant,
}

impl Console {
    /// Build the console, opening the engine named in the config.
    pub fn from_config(config: ConsoleConfig) -> Result<Self> {
        let engine = open_engine(&config.engine)
            .with_context(|| format!("open reconstruction engine '{}'", config.engine))?;
        Self::with_engine(config, engine)
    }

    pub fn with_engine(config: ConsoleConfig, engine: Box<dyn ReconstructionEngine>) -> Result<Self> {
        let streams = (0..2)
            .map(|index| VideoSource::new(config.stream_config(index)))
            .collect::<Result<Vec<_>>>()?;

        let photosphere = CaptureSession::new(config.photosphere_capture());
        let photogrammetry = CaptureSession::new(config.photogrammetry_capture());
        photosphere.attach(&streams[CAPTURE_STREAM])?;
        photogrammetry.attach(&streams[CAPTURE_STREAM])?;

        let animator = MapAnimator::new(config.carp_background_path())?;
        log::info!(
            "console: workspace {}, engine {}",
            config.workspace.display(),
            engine.describe()
        );

        Ok(Self {
            streams,
            photosphere,
            photogrammetry,
            stitcher: FrameSampler::new("photosphere-sampler"),
            reconstruction: ReconstructionOrchestrator::new(engine),
            animator: Arc::new(animator),
            carp: TaskSlot::new("carp"),
            notes: Notes::new(),
            windows: [(0, 0); 2],
            last_health_log: Instant::now(),
            config,
        })
    }

    /// Start decoding every stream.
    pub fn start(&mut self) -> Result<()> {
        for stream in &mut self.streams {
            stream.start()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn notes(&self) -> &Notes {
        &self.notes
    }

    pub fn session(&self, target: SessionTarget) -> &CaptureSession {
        match target {
            SessionTarget::Photosphere => &self.photosphere,
            SessionTarget::Photogrammetry => &self.photogrammetry,
        }
    }

    fn session_mut(&mut self, target: SessionTarget) -> &mut CaptureSession {
        match target {
            SessionTarget::Photosphere => &mut self.photosphere,
            SessionTarget::Photogrammetry => &mut self.photogrammetry,
        }
    }

    pub fn reconstruction(&self) -> &ReconstructionOrchestrator {
        &self.reconstruction
    }

    pub fn stitcher_state(&self) -> TaskState {
        self.stitcher.state()
    }

    pub fn carp_state(&self) -> TaskState {
        self.carp.state()
    }

    pub fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Record(target) => {
                self.session_mut(target).toggle()?;
            }
            Command::Stitch => {
                if !self.recording_settled(SessionTarget::Photosphere) {
                    return Ok(Flow::Continue);
                }
                let recording = self.photosphere.recording_path();
                let rate = self.photosphere.frame_rate();
                if self.stitcher.start(&recording, &self.config.stitch_dir(), rate)? {
                    log::info!("photosphere: stitching...");
                }
            }
            Command::Reconstruct => {
                // Stopping a running session never depends on the recording.
                if self.reconstruction.state() == OrchestratorState::Idle
                    && !self.recording_settled(SessionTarget::Photogrammetry)
                {
                    return Ok(Flow::Continue);
                }
                let plan = self.reconstruction_plan();
                self.reconstruction.toggle(&plan)?;
            }
            Command::Rate(target, rate) => {
                let session = self.session_mut(target);
                session.set_frame_rate(rate);
                log::info!("{}: frame rate {}", session.name(), session.frame_rate());
            }
            Command::Carp(table) => self.render_carp(&table)?,
            Command::Note(line) => self.notes.append_line(&line),
            Command::ShowNotes => println!("{}", self.notes.text()),
            Command::ClearNotes => self.notes.clear(),
            Command::Open(format) => self.open_model(format)?,
            Command::Resize {
                stream,
                width,
                height,
            } => {
                if let Some(window) = self.windows.get_mut(stream) {
                    *window = (width, height);
                }
            }
            Command::Status => println!("{}", self.status()),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// One UI refresh: lay out stream windows and collect finished work.
    pub fn tick(&mut self) -> TickReport {
        let mut placements = [None; 2];
        for (index, stream) in self.streams.iter().enumerate() {
            let (width, height) = self.windows[index];
            placements[index] = stream.refresh(width, height);
        }

        for session in [&mut self.photosphere, &mut self.photogrammetry] {
            // Failures are logged by the task slot.
            let _ = session.poll();
        }
        if let Some(Ok(report)) = self.stitcher.poll() {
            log::info!(
                "photosphere: {} stills ready in {}",
                report.frames_written,
                report.destination.display()
            );
        }
        if let Some(Ok(report)) = self.carp.reap() {
            log::info!("carp: wrote {}", report.output.display());
        }

        let reconstruction = match self.reconstruction.poll() {
            Ok(report) => report,
            Err(err) => {
                log::error!("reconstruction failed: {:#}", err);
                self.reconstruction.report().clone()
            }
        };

        if self.last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            for stream in &self.streams {
                let stats = stream.stats();
                log::info!(
                    "{} running={} frames={} dropped={} url={}",
                    stream.name(),
                    stream.is_running(),
                    stats.frames_decoded,
                    stats.frames_dropped,
                    stats.url
                );
            }
            self.last_health_log = Instant::now();
        }

        TickReport {
            reconstruction_state: self.reconstruction.state(),
            reconstruction,
            placements,
        }
    }

    pub fn status(&self) -> String {
        let mut lines = Vec::new();
        for stream in &self.streams {
            let stats = stream.stats();
            lines.push(format!(
                "{}: {} ({} frames, {} dropped)",
                stream.name(),
                stats.url,
                stats.frames_decoded,
                stats.frames_dropped
            ));
        }
        for session in [&self.photosphere, &self.photogrammetry] {
            lines.push(format!(
                "{}: {} at {} fps, {} frames buffered{}",
                session.name(),
                capture_label(session.state()),
                session.frame_rate(),
                session.buffered_frames(),
                failure_suffix(&session.flush_state())
            ));
        }
        lines.push(format!(
            "stitch: {}",
            task_label(&self.stitcher.state())
        ));
        let report = self.reconstruction.report();
        lines.push(format!(
            "reconstruction: {:?} {} {}",
            self.reconstruction.state(),
            report.percent(),
            report.eta_label()
        ));
        lines.push(format!("carp: {}", task_label(&self.carp.state())));
        lines.join("\n")
    }

    /// Stop the engine, wait for in-flight work and stop the streams.
    pub fn shutdown(&mut self) {
        self.reconstruction.wait_idle();
        self.reconstruction.stop();
        for session in [&mut self.photosphere, &mut self.photogrammetry] {
            if session.state() == CaptureState::Flushing {
                log::info!("{}: waiting for recording to be saved", session.name());
            }
            let _ = session.wait();
        }
        let _ = self.stitcher.wait();
        let _ = self.carp.wait();
        for stream in &mut self.streams {
            stream.stop();
        }
        log::info!("console: shut down");
    }

    /// False while the session is recording or saving; its recording is
    /// not ready to sample yet.
    fn recording_settled(&self, target: SessionTarget) -> bool {
        let session = self.session(target);
        match session.state() {
            CaptureState::Idle => true,
            state => {
                log::debug!(
                    "{}: {}, ignoring until the recording is saved",
                    session.name(),
                    capture_label(state)
                );
                false
            }
        }
    }

    pub fn reconstruction_plan(&self) -> ReconstructionPlan {
        ReconstructionPlan {
            recording: self.photogrammetry.recording_path(),
            directory: self.config.reconstruction_dir(),
            frame_rate: self.photogrammetry.frame_rate(),
        }
    }

    fn render_carp(&mut self, table: &Path) -> Result<()> {
        let rows = carp::read_table(table)?;
        let animator = self.animator.clone();
        let output = self.config.carp_output_path();
        if self
            .carp
            .try_spawn(move || animator.render(&rows, &output))?
        {
            log::info!("carp: rendering {}", table.display());
        }
        Ok(())
    }

    fn open_model(&self, format: ModelFormat) -> Result<()> {
        let paths = self
            .reconstruction
            .model_paths()
            .unwrap_or_else(|| crate::reconstruction::model_paths(&self.config.reconstruction_dir()));
        let path = match format {
            ModelFormat::Usdz => paths.usdz,
            ModelFormat::Obj => paths.obj,
        };
        if !path.exists() {
            bail!("{} does not exist yet", path.display());
        }
        open_in_viewer(&path)
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        for stream in &mut self.streams {
            stream.stop();
        }
    }
}

fn open_in_viewer(path: &Path) -> Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };
    std::process::Command::new(opener)
        .arg(path)
        .spawn()
        .with_context(|| format!("run {} {}", opener, path.display()))?;
    Ok(())
}

fn capture_label(state: CaptureState) -> &'static str {
    match state {
        CaptureState::Idle => "idle",
        CaptureState::Armed => "recording",
        CaptureState::Flushing => "saving recording",
    }
}

fn task_label(state: &TaskState) -> String {
    match state {
        TaskState::Idle => "idle".to_string(),
        TaskState::Running => "running".to_string(),
        TaskState::Failed(err) => format!("failed: {}", err),
    }
}

fn failure_suffix(state: &TaskState) -> String {
    match state {
        TaskState::Failed(err) => format!(" (last save failed: {})", err),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line)
            .expect("valid command")
            .expect("non-empty command")
    }

    #[test]
    fn parses_operator_commands() {
        assert_eq!(parse("record pgm"), Command::Record(SessionTarget::Photogrammetry));
        assert_eq!(
            parse("  record photosphere "),
            Command::Record(SessionTarget::Photosphere)
        );
        assert_eq!(parse("rate pgm 10"), Command::Rate(SessionTarget::Photogrammetry, 10));
        assert_eq!(parse("carp data/my table.csv"), Command::Carp(PathBuf::from("data/my table.csv")));
        assert_eq!(parse("note hull  colour: red"), Command::Note("hull  colour: red".to_string()));
        assert_eq!(parse("notes clear"), Command::ClearNotes);
        assert_eq!(parse("open meshlab"), Command::Open(ModelFormat::Obj));
        assert_eq!(
            parse("resize 2 1280 720"),
            Command::Resize {
                stream: 1,
                width: 1280,
                height: 720
            }
        );
        assert_eq!(parse("quit"), Command::Quit);
    }

    #[test]
    fn blank_lines_are_not_commands() -> Result<()> {
        assert_eq!(Command::parse("")?, None);
        assert_eq!(Command::parse("   ")?, None);
        Ok(())
    }

    #[test]
    fn rejects_malformed_commands() {
        for line in [
            "record",
            "record drone",
            "rate pgm fast",
            "resize 3 10 10",
            "carp",
            "open png",
            "launch",
        ] {
            assert!(Command::parse(line).is_err(), "{line}");
        }
    }
}
