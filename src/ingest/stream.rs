//! Network video stream source.
//!
//! This module provides `VideoSource` for decoding one camera feed off the
//! vehicle's tether.
//!
//! A video source is responsible for:
//! - Decoding RTP video into RGBA frames on its own thread
//! - Pushing every frame to the stream's on-screen texture
//! - Handing every frame, in decode order, to registered listeners
//!
//! A video source MUST NOT:
//! - Store decoded frames to disk
//! - Surface decode errors to listeners (bad frames are logged and dropped)

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[cfg(feature = "stream-gstreamer")]
use anyhow::Context;

use crate::display::{Placement, StreamDisplay};
use crate::frame::Frame;

/// RTP payload carried by a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RtpEncoding {
    H264,
    Jpeg,
}

impl RtpEncoding {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "h264" => Ok(Self::H264),
            "jpeg" | "mjpeg" => Ok(Self::Jpeg),
            other => Err(anyhow!("unsupported RTP encoding '{}'", other)),
        }
    }
}

/// Configuration for one stream.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Display name ("stream 1").
    pub name: String,
    /// `udp://[host:]port` or `stub://<name>`.
    pub url: String,
    pub encoding: RtpEncoding,
    /// Frame size of the synthetic pattern. Real streams report their own.
    pub width: u32,
    pub height: u32,
    /// Frame rate of the synthetic pattern.
    pub fps: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: "stream".to_string(),
            url: "stub://camera".to_string(),
            encoding: RtpEncoding::H264,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Callback invoked on the decoder thread with each decoded frame.
pub type FrameListener = Box<dyn Fn(&Frame) + Send>;

#[derive(Clone, Debug)]
pub struct StreamStats {
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub url: String,
}

/// Where decoded frames go: the display first, then each listener in
/// registration order.
#[derive(Default)]
pub struct FrameFanout {
    listeners: Mutex<Vec<FrameListener>>,
    display: Mutex<StreamDisplay>,
    frames_decoded: AtomicU64,
    frames_dropped: AtomicU64,
}

impl FrameFanout {
    pub fn register_listener(&self, listener: FrameListener) -> Result<()> {
        self.listeners
            .lock()
            .map_err(|_| anyhow!("listener list lock poisoned"))?
            .push(listener);
        Ok(())
    }

    pub fn publish(&self, frame: &Frame) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut display) = self.display.lock() {
            display.present(frame);
        }
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(frame);
            }
        }
    }

    pub fn record_drop(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Recompute the display placement for the current window size.
    pub fn refresh(&self, window_width: u32, window_height: u32) -> Option<Placement> {
        self.display
            .lock()
            .ok()
            .and_then(|mut display| display.refresh(window_width, window_height))
    }

    pub fn with_display<R>(&self, f: impl FnOnce(&StreamDisplay) -> R) -> Result<R> {
        let display = self
            .display
            .lock()
            .map_err(|_| anyhow!("display lock poisoned"))?;
        Ok(f(&display))
    }

    fn counts(&self) -> (u64, u64) {
        (
            self.frames_decoded.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed),
        )
    }
}

/// One decoded camera feed.
///
/// Uses GStreamer for real RTP decode, with a synthetic fallback for
/// `stub://` URLs.
pub struct VideoSource {
    config: StreamConfig,
    backend: Option<StreamBackend>,
    fanout: Arc<FrameFanout>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

enum StreamBackend {
    Synthetic(SyntheticStream),
    #[cfg(feature = "stream-gstreamer")]
    Gstreamer(GstreamerStream),
}

impl StreamBackend {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            StreamBackend::Synthetic(source) => source.next_frame().map(Some),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match self {
            StreamBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.connect(),
        }
    }

    fn shutdown(&mut self) {
        match self {
            StreamBackend::Synthetic(_) => {}
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.shutdown(),
        }
    }
}

impl VideoSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        let backend = if config.url.starts_with("stub://") {
            StreamBackend::Synthetic(SyntheticStream::new(config.clone()))
        } else if config.url.starts_with("udp://") {
            #[cfg(feature = "stream-gstreamer")]
            {
                StreamBackend::Gstreamer(GstreamerStream::new(config.clone())?)
            }
            #[cfg(not(feature = "stream-gstreamer"))]
            {
                anyhow::bail!("{} requires the stream-gstreamer feature", config.url)
            }
        } else {
            anyhow::bail!("unsupported stream url '{}'", config.url)
        };

        Ok(Self {
            config,
            backend: Some(backend),
            fanout: Arc::new(FrameFanout::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Start decoding on a dedicated thread.
    pub fn start(&mut self) -> Result<()> {
        let mut backend = self
            .backend
            .take()
            .ok_or_else(|| anyhow!("{} already started", self.config.name))?;
        backend.connect()?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let fanout = self.fanout.clone();
        let name = self.config.name.clone();
        let worker = std::thread::Builder::new()
            .name(format!("decode-{}", name))
            .spawn(move || decode_loop(&name, backend, &fanout, &running))
            .map_err(|e| anyhow!("failed to spawn decoder for {}: {}", self.config.name, e))?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Add a listener. It receives every frame decoded after this call.
    pub fn register_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&Frame) + Send + 'static,
    {
        self.fanout.register_listener(Box::new(listener))
    }

    pub fn refresh(&self, window_width: u32, window_height: u32) -> Option<Placement> {
        self.fanout.refresh(window_width, window_height)
    }

    pub fn fanout(&self) -> Arc<FrameFanout> {
        self.fanout.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self
                .worker
                .as_ref()
                .map(|worker| !worker.is_finished())
                .unwrap_or(false)
    }

    pub fn stats(&self) -> StreamStats {
        let (frames_decoded, frames_dropped) = self.fanout.counts();
        StreamStats {
            frames_decoded,
            frames_dropped,
            url: self.config.url.clone(),
        }
    }

    /// Stop and join the decoder thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("{}: decoder thread panicked", self.config.name);
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_loop(name: &str, mut backend: StreamBackend, fanout: &FrameFanout, running: &AtomicBool) {
    log::info!("{}: decoding", name);
    while running.load(Ordering::SeqCst) {
        match backend.next_frame() {
            Ok(Some(frame)) => fanout.publish(&frame),
            Ok(None) => {}
            Err(err) => {
                fanout.record_drop();
                log::warn!("{}: dropped frame: {:#}", name, err);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
    backend.shutdown();
    log::info!("{}: decoder stopped", name);
}

/// Port of a `udp://[host:]port` URL.
pub fn parse_udp_port(url: &str) -> Result<u16> {
    let rest = url
        .strip_prefix("udp://")
        .ok_or_else(|| anyhow!("'{}' is not a udp:// url", url))?;
    let port = rest.rsplit(':').next().unwrap_or(rest).trim_end_matches('/');
    port.parse::<u16>()
        .map_err(|_| anyhow!("invalid udp port in '{}'", url))
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticStream {
    config: StreamConfig,
    frame_count: u64,
}

impl SyntheticStream {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("VideoSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    /// Moving diagonal gradient, paced at the configured frame rate.
    fn next_frame(&mut self) -> Result<Frame> {
        std::thread::sleep(Duration::from_millis(1000 / self.config.fps.max(1) as u64));
        self.frame_count += 1;

        let (width, height) = (self.config.width, self.config.height);
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height as u64 {
            for x in 0..width as u64 {
                let v = ((x + y + self.frame_count * 4) % 256) as u8;
                data.extend_from_slice(&[v, v / 2, 255 - v, 255]);
            }
        }
        Frame::new(width, height, data)
    }
}

// ----------------------------------------------------------------------------
// RTP over UDP using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "stream-gstreamer")]
struct GstreamerStream {
    config: StreamConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
}

#[cfg(feature = "stream-gstreamer")]
impl GstreamerStream {
    fn new(config: StreamConfig) -> Result<Self> {
        use gstreamer::prelude::*;

        gstreamer::init().context("initialize gstreamer")?;
        let port = parse_udp_port(&config.url)?;
        let depay = match config.encoding {
            RtpEncoding::H264 => {
                "application/x-rtp,media=video,encoding-name=H264,payload=96 ! rtph264depay ! \
                 h264parse ! avdec_h264"
            }
            RtpEncoding::Jpeg => {
                "application/x-rtp,media=video,encoding-name=JPEG,payload=26 ! rtpjpegdepay ! \
                 jpegdec"
            }
        };
        let description = format!(
            "udpsrc port={} ! {} ! videoconvert ! video/x-raw,format=RGBA ! \
             appsink name=sink sync=false max-buffers=1 drop=true",
            port, depay
        );
        let pipeline = gstreamer::parse::launch(&description)
            .context("build stream pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("stream pipeline is not a Pipeline"))?;
        let appsink = pipeline
            .by_name("sink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        Ok(Self {
            config,
            pipeline,
            appsink,
        })
    }

    fn connect(&mut self) -> Result<()> {
        use gstreamer::prelude::*;

        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set stream pipeline to Playing")?;
        log::info!("VideoSource: listening on {}", self.config.url);
        Ok(())
    }

    /// `None` when no sample arrived within the pull timeout.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(sample) = self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(500))
        else {
            return Ok(None);
        };
        sample_to_frame(&sample).map(Some)
    }

    fn shutdown(&mut self) {
        use gstreamer::prelude::*;

        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("{}: failed to stop pipeline: {}", self.config.name, err);
        }
    }
}

#[cfg(feature = "stream-gstreamer")]
fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame> {
    let buffer = sample.buffer().context("stream sample missing buffer")?;
    let caps = sample.caps().context("stream sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse stream caps as video info")?;

    let width = info.width();
    let height = info.height();
    let map = buffer.map_readable().context("map stream buffer")?;
    let pixels = crate::frame::unstride(
        map.as_slice(),
        info.stride()[0] as usize,
        width as usize * crate::frame::BYTES_PER_PIXEL,
        height as usize,
    )?;
    Frame::new(width, height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn udp_port_is_parsed_with_or_without_host() -> Result<()> {
        assert_eq!(parse_udp_port("udp://5600")?, 5600);
        assert_eq!(parse_udp_port("udp://0.0.0.0:5601")?, 5601);
        assert!(parse_udp_port("udp://host:notaport").is_err());
        assert!(parse_udp_port("rtsp://cam").is_err());
        Ok(())
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let config = StreamConfig {
            url: "rtsp://camera/stream".to_string(),
            ..StreamConfig::default()
        };
        assert!(VideoSource::new(config).is_err());
    }

    #[test]
    fn encoding_names_parse() -> Result<()> {
        assert_eq!(RtpEncoding::parse("H264")?, RtpEncoding::H264);
        assert_eq!(RtpEncoding::parse("mjpeg")?, RtpEncoding::Jpeg);
        assert!(RtpEncoding::parse("vp8").is_err());
        Ok(())
    }

    #[test]
    fn publish_reaches_display_and_every_listener_in_order() -> Result<()> {
        let fanout = FrameFanout::default();
        let (tx, rx) = mpsc::channel();
        for id in 0..3 {
            let tx = tx.clone();
            fanout.register_listener(Box::new(move |frame: &Frame| {
                let _ = tx.send((id, frame.width));
            }))?;
        }

        fanout.publish(&Frame::solid(4, 2, [0, 0, 0, 255]));
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen, vec![(0, 4), (1, 4), (2, 4)]);
        assert_eq!(fanout.with_display(|display| display.frames_shown())?, 1);
        Ok(())
    }

    #[test]
    fn synthetic_stream_delivers_frames_to_listeners() -> Result<()> {
        let mut source = VideoSource::new(StreamConfig {
            name: "test".to_string(),
            url: "stub://test".to_string(),
            width: 8,
            height: 6,
            fps: 200,
            ..StreamConfig::default()
        })?;
        let (tx, rx) = mpsc::channel();
        source.register_listener(move |frame: &Frame| {
            let _ = tx.send(frame.dimensions());
        })?;
        source.start()?;
        assert!(source.start().is_err());

        let first = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(first, (8, 6));
        source.stop();
        assert!(!source.is_running());
        assert!(source.stats().frames_decoded >= 1);
        Ok(())
    }
}
