//! Simulated engine (`stub://`) for demos and tests on machines without the
//! native library. Progress advances linearly with wall time.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::engine::ReconstructionEngine;

pub const DEFAULT_SIMULATED_SECONDS: u64 = 30;

pub struct SimulatedEngine {
    duration: Duration,
    started_at: Option<Instant>,
    images: Option<PathBuf>,
}

impl SimulatedEngine {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started_at: None,
            images: None,
        }
    }

    /// `stub://<name>` or `stub://<name>?seconds=N`.
    pub fn from_url(url: &str) -> Result<Self> {
        let seconds = match url.split_once("?seconds=") {
            Some((_, value)) => value
                .parse::<u64>()
                .map_err(|_| anyhow!("invalid simulated duration in '{}'", url))?,
            None => DEFAULT_SIMULATED_SECONDS,
        };
        Ok(Self::new(Duration::from_secs(seconds)))
    }

    fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }
}

impl ReconstructionEngine for SimulatedEngine {
    fn start(&mut self, images: &Path) -> Result<()> {
        log::info!("simulated engine: reconstructing {}", images.display());
        self.images = Some(images.to_path_buf());
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.elapsed()
            .map(|elapsed| elapsed >= self.duration)
            .unwrap_or(false)
    }

    fn progress(&self) -> f64 {
        match self.elapsed() {
            Some(_) if self.duration.is_zero() => 1.0,
            Some(elapsed) => elapsed.as_secs_f64() / self.duration.as_secs_f64(),
            None => 0.0,
        }
    }

    fn eta(&self) -> f64 {
        match self.elapsed() {
            Some(elapsed) => self.duration.saturating_sub(elapsed).as_secs_f64(),
            None => -1.0,
        }
    }

    fn stop(&mut self) {
        if self.started_at.take().is_none() {
            log::warn!("simulated engine: no active session to stop");
        }
        self.images = None;
    }

    fn describe(&self) -> String {
        format!("simulated engine ({}s)", self.duration.as_secs())
    }
}
