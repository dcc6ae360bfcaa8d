//! Console configuration.
//!
//! Defaults for everything, an optional JSON file named by `MATE_CONFIG`, then
//! `MATE_*` environment overrides. Relative carp paths resolve against the
//! workspace.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::ingest::{RtpEncoding, StreamConfig};

#[cfg(feature = "stream-gstreamer")]
const DEFAULT_STREAM_URLS: [&str; 2] = ["udp://5600", "udp://5601"];
#[cfg(not(feature = "stream-gstreamer"))]
const DEFAULT_STREAM_URLS: [&str; 2] = ["stub://stream1", "stub://stream2"];
const DEFAULT_STREAM_ENCODING: &str = "h264";
const DEFAULT_STREAM_WIDTH: u32 = 640;
const DEFAULT_STREAM_HEIGHT: u32 = 480;
const DEFAULT_STREAM_FPS: u32 = 30;
const DEFAULT_WORKSPACE: &str = ".";
const DEFAULT_PHOTOSPHERE_SIZE: (u32, u32) = (1920, 1080);
const DEFAULT_PHOTOGRAMMETRY_SIZE: (u32, u32) = (800, 600);
const DEFAULT_FRAME_RATE: u32 = 30;
const DEFAULT_ENGINE: &str = "stub://engine";
const DEFAULT_CARP_BACKGROUND: &str = "illinois.png";
const DEFAULT_CARP_OUTPUT: &str = "carp.avi";
const DEFAULT_TICK_MS: u64 = 100;

pub const PHOTOSPHERE_DIR: &str = "photosphere";
pub const PHOTOGRAMMETRY_DIR: &str = "pgm";
pub const STITCH_DIR: &str = "stitch";
pub const RECONSTRUCTION_DIR: &str = "reconstruction";

#[derive(Debug, Deserialize, Default)]
struct ConsoleConfigFile {
    workspace: Option<PathBuf>,
    tick_ms: Option<u64>,
    streams: Option<Vec<StreamConfigFile>>,
    photosphere: Option<SessionConfigFile>,
    photogrammetry: Option<SessionConfigFile>,
    reconstruction: Option<ReconstructionConfigFile>,
    carp: Option<CarpConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    encoding: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    frame_rate: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ReconstructionConfigFile {
    engine: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CarpConfigFile {
    background: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Directory the session folders and carp output live under.
    pub workspace: PathBuf,
    pub tick: Duration,
    /// Stream 1 and stream 2. Capture sessions listen to stream 2.
    pub streams: [StreamSettings; 2],
    pub photosphere: SessionSettings,
    pub photogrammetry: SessionSettings,
    /// `stub://...` or the path of the native engine library.
    pub engine: String,
    pub carp_background: PathBuf,
    pub carp_output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: String,
    pub encoding: RtpEncoding,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl ConsoleConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON config without consulting the environment.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ConsoleConfigFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let mut cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConsoleConfigFile) -> Result<Self> {
        let mut stream_files = file.streams.unwrap_or_default().into_iter();
        let streams = [
            stream_settings(stream_files.next().unwrap_or_default(), DEFAULT_STREAM_URLS[0])?,
            stream_settings(stream_files.next().unwrap_or_default(), DEFAULT_STREAM_URLS[1])?,
        ];
        if stream_files.next().is_some() {
            return Err(anyhow!("at most two streams can be configured"));
        }

        let carp = file.carp.unwrap_or_default();
        Ok(Self {
            workspace: file
                .workspace
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE)),
            tick: Duration::from_millis(file.tick_ms.unwrap_or(DEFAULT_TICK_MS)),
            streams,
            photosphere: session_settings(file.photosphere, DEFAULT_PHOTOSPHERE_SIZE),
            photogrammetry: session_settings(file.photogrammetry, DEFAULT_PHOTOGRAMMETRY_SIZE),
            engine: file
                .reconstruction
                .and_then(|reconstruction| reconstruction.engine)
                .unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
            carp_background: carp
                .background
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CARP_BACKGROUND)),
            carp_output: carp
                .output
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CARP_OUTPUT)),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        for (index, key) in ["MATE_STREAM1_URL", "MATE_STREAM2_URL"].iter().enumerate() {
            if let Ok(url) = std::env::var(key) {
                if !url.trim().is_empty() {
                    self.streams[index].url = url;
                }
            }
        }
        if let Ok(engine) = std::env::var("MATE_ENGINE_LIB") {
            if !engine.trim().is_empty() {
                self.engine = engine;
            }
        }
        if let Ok(workspace) = std::env::var("MATE_WORKSPACE") {
            if !workspace.trim().is_empty() {
                self.workspace = PathBuf::from(workspace);
            }
        }
        if let Ok(background) = std::env::var("MATE_CARP_BACKGROUND") {
            if !background.trim().is_empty() {
                self.carp_background = PathBuf::from(background);
            }
        }
        if let Ok(tick) = std::env::var("MATE_TICK_MS") {
            let millis: u64 = tick
                .parse()
                .map_err(|_| anyhow!("MATE_TICK_MS must be an integer number of milliseconds"))?;
            self.tick = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (index, stream) in self.streams.iter().enumerate() {
            if stream.url.trim().is_empty() {
                return Err(anyhow!("stream {} url must not be empty", index + 1));
            }
            if stream.width == 0 || stream.height == 0 || stream.fps == 0 {
                return Err(anyhow!("stream {} size and fps must be non-zero", index + 1));
            }
        }
        for (name, session) in [
            (PHOTOSPHERE_DIR, &self.photosphere),
            (PHOTOGRAMMETRY_DIR, &self.photogrammetry),
        ] {
            if session.width == 0 || session.height == 0 {
                return Err(anyhow!("{} resolution must be non-zero", name));
            }
            if !(1..=30).contains(&session.frame_rate) {
                return Err(anyhow!("{} frame_rate must be between 1 and 30", name));
            }
        }
        if self.tick.is_zero() {
            return Err(anyhow!("tick must be greater than zero"));
        }
        if self.engine.trim().is_empty() {
            return Err(anyhow!("reconstruction engine must not be empty"));
        }
        Ok(())
    }

    pub fn stream_config(&self, index: usize) -> StreamConfig {
        let stream = &self.streams[index.min(1)];
        StreamConfig {
            name: format!("stream {}", index.min(1) + 1),
            url: stream.url.clone(),
            encoding: stream.encoding,
            width: stream.width,
            height: stream.height,
            fps: stream.fps,
        }
    }

    pub fn photosphere_root(&self) -> PathBuf {
        self.workspace.join(PHOTOSPHERE_DIR)
    }

    pub fn photogrammetry_root(&self) -> PathBuf {
        self.workspace.join(PHOTOGRAMMETRY_DIR)
    }

    pub fn stitch_dir(&self) -> PathBuf {
        self.photosphere_root().join(STITCH_DIR)
    }

    pub fn reconstruction_dir(&self) -> PathBuf {
        self.photogrammetry_root().join(RECONSTRUCTION_DIR)
    }

    pub fn photosphere_capture(&self) -> CaptureConfig {
        capture_config("photosphere", self.photosphere_root(), self.photosphere)
    }

    pub fn photogrammetry_capture(&self) -> CaptureConfig {
        capture_config("photogrammetry", self.photogrammetry_root(), self.photogrammetry)
    }

    /// Carp paths are resolved against the workspace unless absolute.
    pub fn carp_output_path(&self) -> PathBuf {
        self.workspace.join(&self.carp_output)
    }

    pub fn carp_background_path(&self) -> PathBuf {
        self.workspace.join(&self.carp_background)
    }
}

fn stream_settings(file: StreamConfigFile, default_url: &str) -> Result<StreamSettings> {
    Ok(StreamSettings {
        url: file.url.unwrap_or_else(|| default_url.to_string()),
        encoding: RtpEncoding::parse(
            file.encoding
                .as_deref()
                .unwrap_or(DEFAULT_STREAM_ENCODING),
        )?,
        width: file.width.unwrap_or(DEFAULT_STREAM_WIDTH),
        height: file.height.unwrap_or(DEFAULT_STREAM_HEIGHT),
        fps: file.fps.unwrap_or(DEFAULT_STREAM_FPS),
    })
}

fn session_settings(file: Option<SessionConfigFile>, size: (u32, u32)) -> SessionSettings {
    let file = file.unwrap_or_default();
    SessionSettings {
        width: file.width.unwrap_or(size.0),
        height: file.height.unwrap_or(size.1),
        frame_rate: file.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
    }
}

fn capture_config(name: &'static str, root: PathBuf, settings: SessionSettings) -> CaptureConfig {
    CaptureConfig {
        name,
        root,
        width: settings.width,
        height: settings.height,
        frame_rate: settings.frame_rate,
    }
}

fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
