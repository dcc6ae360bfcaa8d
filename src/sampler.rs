//! Frame sampling: thin a recording down to numbered stills.
//!
//! Recordings are made at a nominal 30 fps. The operator's frame-rate setting
//! decides how many of those frames survive: every `max(1, 30 / rate)`-th
//! frame is kept, starting with the first, and written as
//! `frame_1.png`, `frame_2.png`, ... with dense numbering.
//!
//! The destination directory is deleted and recreated on every pass, so it
//! always holds exactly one pass worth of stills.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::media::VideoReader;
use crate::task::{TaskSlot, TaskState};

/// Frame rate every recording is written at.
pub const NOMINAL_FPS: u32 = 30;

/// Keep one frame out of this many.
pub fn skip_interval(frame_rate: u32) -> u32 {
    (NOMINAL_FPS / frame_rate.max(1)).max(1)
}

/// File name of the `index`-th kept still (1-based).
pub fn still_name(index: u32) -> String {
    format!("frame_{}.png", index)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleReport {
    pub frames_read: u32,
    pub frames_written: u32,
    pub interval: u32,
    pub destination: PathBuf,
}

/// Run one sampling pass synchronously.
pub fn sample(source: &Path, destination: &Path, frame_rate: u32) -> Result<SampleReport> {
    let interval = skip_interval(frame_rate);

    if destination.exists() {
        fs::remove_dir_all(destination)
            .with_context(|| format!("remove {}", destination.display()))?;
    }
    fs::create_dir_all(destination)
        .with_context(|| format!("create {}", destination.display()))?;

    let mut reader = VideoReader::open(source)?;
    let mut frames_read = 0u32;
    let mut frames_written = 0u32;

    while let Some(frame) = reader.next_frame()? {
        if frames_read % interval == 0 {
            frames_written += 1;
            let path = destination.join(still_name(frames_written));
            frame
                .save_with_format(&path, image::ImageFormat::Png)
                .with_context(|| format!("write {}", path.display()))?;
        }
        frames_read += 1;
    }

    log::info!(
        "sampled {} of {} frames (every {}) from {} into {}",
        frames_written,
        frames_read,
        interval,
        source.display(),
        destination.display()
    );

    Ok(SampleReport {
        frames_read,
        frames_written,
        interval,
        destination: destination.to_path_buf(),
    })
}

/// Background sampler with a one-pass-at-a-time guard.
pub struct FrameSampler {
    task: TaskSlot<SampleReport>,
}

impl FrameSampler {
    pub fn new(name: &'static str) -> Self {
        Self {
            task: TaskSlot::new(name),
        }
    }

    /// Start a pass. Returns false (and does nothing) while one is running.
    pub fn start(&mut self, source: &Path, destination: &Path, frame_rate: u32) -> Result<bool> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        self.task
            .try_spawn(move || sample(&source, &destination, frame_rate))
    }

    pub fn is_busy(&self) -> bool {
        self.task.is_busy()
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Collect a finished pass without blocking.
    pub fn poll(&mut self) -> Option<Result<SampleReport>> {
        self.task.reap()
    }

    /// Block until the running pass finishes.
    pub fn wait(&mut self) -> Option<Result<SampleReport>> {
        self.task.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_interval_follows_configured_rate() {
        assert_eq!(skip_interval(30), 1);
        assert_eq!(skip_interval(15), 2);
        assert_eq!(skip_interval(10), 3);
        assert_eq!(skip_interval(7), 4);
        assert_eq!(skip_interval(1), 30);
        assert_eq!(skip_interval(0), 30);
        assert_eq!(skip_interval(60), 1);
    }

    #[test]
    fn still_names_are_one_based() {
        assert_eq!(still_name(1), "frame_1.png");
        assert_eq!(still_name(12), "frame_12.png");
    }
}
