//! Video files on disk.
//!
//! - `avi`: Motion-JPEG AVI writer and reader (recordings, carp output)
//! - `reader`: frame-by-frame reading of a recorded file, whatever its format
//! - `ffmpeg` (feature: decode-ffmpeg): FFmpeg-backed reader for non-AVI sources

pub mod avi;
#[cfg(feature = "decode-ffmpeg")]
pub(crate) mod ffmpeg;
pub mod reader;

pub use avi::{AviInfo, AviReader, AviWriter};
pub use reader::VideoReader;
