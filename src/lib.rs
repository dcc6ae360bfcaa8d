//! MATE operator console
//!
//! Console for a remotely piloted vehicle: live camera streams, recording for
//! photosphere stitching and photogrammetry reconstruction, a map animation
//! renderer ("carp") and session notes.
//!
//! # Module Structure
//!
//! - `ingest`: network video streams (`VideoSource`) and frame fan-out
//! - `frame`, `display`: decoded frames and their on-screen texture
//! - `capture`: arm/flush recording sessions
//! - `media`: Motion-JPEG AVI files, plus FFmpeg reading behind a feature
//! - `sampler`: thinning recordings into still images
//! - `reconstruction`: engine interface and session orchestration
//! - `carp`: map animation from a year/flag table
//! - `notes`: session notes
//! - `task`: one-at-a-time background work
//! - `config`, `console`, `ui`: the application around the components

pub mod capture;
pub mod carp;
pub mod config;
pub mod console;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod media;
pub mod notes;
pub mod reconstruction;
pub mod sampler;
pub mod task;
pub mod ui;

pub use capture::{CaptureConfig, CaptureSession, CaptureState};
pub use carp::{MapAnimator, MapStyle, RenderReport, TableRow};
pub use config::ConsoleConfig;
pub use console::{Command, Console, Flow};
pub use display::{Placement, StreamDisplay};
pub use frame::Frame;
pub use ingest::{StreamConfig, VideoSource};
pub use notes::Notes;
pub use reconstruction::{
    ProgressReport, ReconstructionEngine, ReconstructionOrchestrator, ReconstructionPlan,
};
pub use sampler::{sample, FrameSampler, SampleReport};
pub use task::{TaskSlot, TaskState};
