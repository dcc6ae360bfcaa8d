//! Capture sessions: record a camera feed for later sampling.
//!
//! A session listens to one `VideoSource`. `toggle()` arms it; while armed
//! every delivered frame is converted to RGB and appended to the capture
//! buffer. The next `toggle()` takes the buffer and encodes it on a background
//! task to `<root>/recording/video.avi` at the session's fixed resolution and
//! the nominal 30 fps. The configured frame rate plays no part in recording;
//! it is only read when the recording is sampled.
//!
//! ```text
//! Idle --toggle--> Armed --toggle--> Flushing --(encode done)--> Idle
//! ```
//!
//! Commands received while flushing are ignored.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::frame::{fit_to, Frame};
use crate::ingest::VideoSource;
use crate::media::{AviInfo, AviWriter};
use crate::sampler::NOMINAL_FPS;
use crate::task::{TaskSlot, TaskState};

pub const RECORDING_DIR: &str = "recording";
pub const RECORDING_FILE: &str = "video.avi";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Armed,
    Flushing,
}

/// Configuration for one capture session.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// "photosphere" or "photogrammetry"; used in logs and task names.
    pub name: &'static str,
    /// Session root, e.g. `photosphere/` or `pgm/`.
    pub root: PathBuf,
    /// Fixed output resolution of the recording.
    pub width: u32,
    pub height: u32,
    /// Initial sampling rate (1..=30).
    pub frame_rate: u32,
}

#[derive(Default)]
struct CaptureBuffer {
    armed: bool,
    frames: Vec<RgbImage>,
}

pub struct CaptureSession {
    config: CaptureConfig,
    buffer: Arc<Mutex<CaptureBuffer>>,
    flush: TaskSlot<AviInfo>,
    frame_rate: u32,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        let frame_rate = config.frame_rate.clamp(1, NOMINAL_FPS);
        Self {
            flush: TaskSlot::new(config.name),
            config,
            buffer: Arc::new(Mutex::new(CaptureBuffer::default())),
            frame_rate,
        }
    }

    /// Register this session as a listener on `source`.
    pub fn attach(&self, source: &VideoSource) -> Result<()> {
        source.register_listener(self.listener())
    }

    /// The frame callback. Appends while armed, ignores frames otherwise.
    pub fn listener(&self) -> impl Fn(&Frame) + Send + 'static {
        let buffer = self.buffer.clone();
        move |frame: &Frame| {
            if let Ok(mut buffer) = buffer.lock() {
                if buffer.armed {
                    buffer.frames.push(frame.to_rgb());
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn state(&self) -> CaptureState {
        if self.flush.is_busy() {
            return CaptureState::Flushing;
        }
        match self.buffer.lock() {
            Ok(buffer) if buffer.armed => CaptureState::Armed,
            _ => CaptureState::Idle,
        }
    }

    /// State of the last flush (`Failed` carries the encode error).
    pub fn flush_state(&self) -> TaskState {
        self.flush.state()
    }

    /// Frames buffered so far in the current armed interval.
    pub fn buffered_frames(&self) -> usize {
        self.buffer
            .lock()
            .map(|buffer| buffer.frames.len())
            .unwrap_or(0)
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Set the sampling rate, clamped to 1..=30.
    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.frame_rate = frame_rate.clamp(1, NOMINAL_FPS);
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn recording_dir(&self) -> PathBuf {
        self.config.root.join(RECORDING_DIR)
    }

    pub fn recording_path(&self) -> PathBuf {
        self.recording_dir().join(RECORDING_FILE)
    }

    /// The single start/stop button. Returns whether the command was acted on.
    pub fn toggle(&mut self) -> Result<bool> {
        match self.state() {
            CaptureState::Flushing => {
                log::debug!("{}: still saving recording, ignoring", self.config.name);
                Ok(false)
            }
            CaptureState::Idle => {
                let mut buffer = self.lock_buffer()?;
                buffer.frames.clear();
                buffer.armed = true;
                log::info!("{}: recording...", self.config.name);
                Ok(true)
            }
            CaptureState::Armed => self.begin_flush(),
        }
    }

    fn begin_flush(&mut self) -> Result<bool> {
        let frames = {
            let mut buffer = self.lock_buffer()?;
            buffer.armed = false;
            std::mem::take(&mut buffer.frames)
        };
        log::info!(
            "{}: saving recording ({} frames)...",
            self.config.name,
            frames.len()
        );

        let dir = self.recording_dir();
        let path = self.recording_path();
        let (width, height) = (self.config.width, self.config.height);
        self.flush
            .try_spawn(move || write_recording(&dir, &path, frames, width, height))
    }

    /// Reap a finished flush. Called once per UI tick.
    pub fn poll(&mut self) -> Option<Result<AviInfo>> {
        let result = self.flush.reap()?;
        if let Ok(info) = &result {
            log::info!(
                "{}: saved {} frames to {}",
                self.config.name,
                info.frame_count,
                self.recording_path().display()
            );
        }
        Some(result)
    }

    /// Block until an in-flight flush completes.
    pub fn wait(&mut self) -> Option<Result<AviInfo>> {
        self.flush.wait()
    }

    fn lock_buffer(&self) -> Result<std::sync::MutexGuard<'_, CaptureBuffer>> {
        self.buffer
            .lock()
            .map_err(|_| anyhow!("{} capture buffer lock poisoned", self.config.name))
    }
}

/// Replace `dir` with a fresh directory holding one video of `frames`.
pub fn write_recording(
    dir: &Path,
    path: &Path,
    frames: Vec<RgbImage>,
    width: u32,
    height: u32,
) -> Result<AviInfo> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let mut writer = AviWriter::create(path, width, height, NOMINAL_FPS)?;
    for frame in frames {
        writer.write_frame(&fit_to(frame, width, height))?;
    }
    writer.finish()
}
