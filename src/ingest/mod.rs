//! Live frame ingestion.
//!
//! - `stream`: one camera feed per `VideoSource` (RTP over UDP, or `stub://`)
//!
//! Sources hand every decoded frame to the stream's display and to any
//! registered listeners (the capture sessions). They never write to disk.

pub mod stream;

pub use stream::{FrameFanout, FrameListener, RtpEncoding, StreamConfig, StreamStats, VideoSource};
