//! Photogrammetry reconstruction.
//!
//! - `engine`: the `ReconstructionEngine` trait and progress normalization
//! - `native`: the shared-library engine, bound at runtime
//! - `simulated`: a wall-clock engine behind `stub://`
//!
//! `ReconstructionOrchestrator` drives one engine through a session:
//!
//! ```text
//! Idle --start--> Preparing --(stills sampled)--> Running --stop--> Idle
//! ```
//!
//! Preparing samples the photogrammetry recording into the engine's input
//! directory. The engine is only started once sampling has finished, and
//! never while a session is preparing or running.

pub mod engine;
pub mod native;
pub mod simulated;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sampler::{FrameSampler, SampleReport};

pub use engine::{normalize_eta, normalize_progress, open_engine, ReconstructionEngine};
pub use native::NativeEngine;
pub use simulated::SimulatedEngine;

/// Engine-owned output directory inside the reconstruction directory.
pub const MODEL_DIR: &str = "model";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Preparing,
    Running,
}

/// What to reconstruct and where.
#[derive(Clone, Debug)]
pub struct ReconstructionPlan {
    /// The photogrammetry capture session's recording.
    pub recording: PathBuf,
    /// Still-image directory the engine reads (`pgm/reconstruction`).
    pub directory: PathBuf,
    /// Sampling rate, 1..=30.
    pub frame_rate: u32,
}

/// Values shown next to the reconstruction button.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressReport {
    /// Always within `[0, 1]`.
    pub progress: f64,
    /// Seconds remaining, `None` when the engine has no estimate.
    pub eta: Option<f64>,
    pub completed: bool,
}

impl ProgressReport {
    pub fn percent(&self) -> String {
        format!("{:.2}%", self.progress * 100.0)
    }

    pub fn eta_label(&self) -> String {
        match self.eta {
            Some(eta) => format!("ETA: {:.2}s", eta),
            None => "ETA: unknown".to_string(),
        }
    }
}

/// Engine outputs for the external viewers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub usdz: PathBuf,
    pub obj: PathBuf,
}

pub struct ReconstructionOrchestrator {
    engine: Box<dyn ReconstructionEngine>,
    sampler: FrameSampler,
    state: OrchestratorState,
    directory: Option<PathBuf>,
    report: ProgressReport,
}

impl ReconstructionOrchestrator {
    pub fn new(engine: Box<dyn ReconstructionEngine>) -> Self {
        Self {
            engine,
            sampler: FrameSampler::new("reconstruction-sampler"),
            state: OrchestratorState::Idle,
            directory: None,
            report: ProgressReport::default(),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn report(&self) -> &ProgressReport {
        &self.report
    }

    pub fn engine_name(&self) -> String {
        self.engine.describe()
    }

    /// Begin a session: sample the recording, then start the engine from
    /// `poll()`. Ignored unless idle.
    pub fn start(&mut self, plan: &ReconstructionPlan) -> Result<bool> {
        if self.state != OrchestratorState::Idle {
            log::debug!("reconstruction: {:?}, ignoring start", self.state);
            return Ok(false);
        }
        if !self
            .sampler
            .start(&plan.recording, &plan.directory, plan.frame_rate)?
        {
            return Ok(false);
        }
        log::info!(
            "reconstruction: setting up from {}",
            plan.recording.display()
        );
        self.state = OrchestratorState::Preparing;
        self.directory = Some(plan.directory.clone());
        self.report = ProgressReport::default();
        Ok(true)
    }

    /// Stop a running session. Ignored while preparing or idle.
    pub fn stop(&mut self) -> bool {
        match self.state {
            OrchestratorState::Running => {
                self.engine.stop();
                self.state = OrchestratorState::Idle;
                log::info!("reconstruction: stopped");
                true
            }
            OrchestratorState::Preparing => {
                log::debug!("reconstruction: still setting up, ignoring stop");
                false
            }
            OrchestratorState::Idle => false,
        }
    }

    /// The single start/stop button.
    pub fn toggle(&mut self, plan: &ReconstructionPlan) -> Result<bool> {
        match self.state {
            OrchestratorState::Idle => self.start(plan),
            OrchestratorState::Preparing => Ok(false),
            OrchestratorState::Running => Ok(self.stop()),
        }
    }

    /// Advance the session once per UI tick and return the current report.
    ///
    /// A failed sampling pass returns the session to idle and surfaces the
    /// error here.
    pub fn poll(&mut self) -> Result<ProgressReport> {
        match self.state {
            OrchestratorState::Preparing => {
                if let Some(result) = self.sampler.poll() {
                    self.finish_preparing(result)?;
                }
            }
            OrchestratorState::Running => self.observe_engine(),
            OrchestratorState::Idle => {}
        }
        Ok(self.report.clone())
    }

    /// Block until preparation finishes and the engine is started.
    pub fn wait_until_running(&mut self) -> Result<()> {
        if self.state != OrchestratorState::Preparing {
            return Ok(());
        }
        match self.sampler.wait() {
            Some(result) => self.finish_preparing(result),
            None => {
                self.state = OrchestratorState::Idle;
                Ok(())
            }
        }
    }

    /// Block until an in-flight sampling pass finishes, without starting
    /// the engine. Used at shutdown.
    pub fn wait_idle(&mut self) {
        if self.state != OrchestratorState::Preparing {
            return;
        }
        if let Some(Err(err)) = self.sampler.wait() {
            log::warn!("reconstruction: sampling failed during shutdown: {:#}", err);
        }
        self.state = OrchestratorState::Idle;
    }

    /// Where the engine writes its model for the current or last session.
    pub fn model_paths(&self) -> Option<ModelPaths> {
        self.directory.as_deref().map(model_paths)
    }

    fn finish_preparing(&mut self, sampled: Result<SampleReport>) -> Result<()> {
        self.state = OrchestratorState::Idle;
        let sampled = sampled.context("sample reconstruction input")?;
        let model = sampled.destination.join(MODEL_DIR);
        fs::create_dir_all(&model).with_context(|| format!("create {}", model.display()))?;

        self.engine.start(&sampled.destination)?;
        self.state = OrchestratorState::Running;
        log::info!(
            "reconstruction: {} started on {} stills",
            self.engine.describe(),
            sampled.frames_written
        );
        Ok(())
    }

    /// Completion does not end the session; only `stop` returns to idle.
    /// The engine's completed flag can stay set across sessions.
    fn observe_engine(&mut self) {
        let was_completed = self.report.completed;
        self.report = ProgressReport {
            progress: normalize_progress(self.engine.progress()),
            eta: normalize_eta(self.engine.eta()),
            completed: self.engine.is_completed(),
        };
        if self.report.completed {
            self.report.progress = 1.0;
            if !was_completed {
                log::info!("reconstruction: processing is complete");
            }
        }
    }
}

pub fn model_paths(directory: &Path) -> ModelPaths {
    ModelPaths {
        usdz: directory.join("out.usdz"),
        obj: directory.join(MODEL_DIR).join("out.obj"),
    }
}
