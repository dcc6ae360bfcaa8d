use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use image::RgbImage;
use tempfile::tempdir;

use mate_console::capture::{CaptureConfig, CaptureSession, CaptureState};
use mate_console::console::{Command, Console, SessionTarget};
use mate_console::frame::Frame;
use mate_console::media::{AviReader, AviWriter};
use mate_console::reconstruction::OrchestratorState;
use mate_console::sampler::sample;
use mate_console::task::TaskState;
use mate_console::ConsoleConfig;

fn wait_for(what: &str, mut done: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !done() {
        if Instant::now() > deadline {
            bail!("timed out waiting for {}", what);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

fn console_in(workspace: &Path) -> Result<Console> {
    let json = format!(
        r#"{{
            "workspace": {workspace:?},
            "tick_ms": 10,
            "streams": [
                {{ "url": "stub://one", "width": 16, "height": 12, "fps": 100 }},
                {{ "url": "stub://two", "width": 16, "height": 12, "fps": 100 }}
            ],
            "photosphere": {{ "width": 640, "height": 480 }},
            "photogrammetry": {{ "width": 16, "height": 12, "frame_rate": 15 }},
            "reconstruction": {{ "engine": "stub://engine?seconds=0" }}
        }}"#,
        workspace = workspace.display().to_string()
    );
    Console::from_config(ConsoleConfig::from_json(&json)?)
}

/// Record `frames` frames on `target` and tick until the recording is saved.
fn record(console: &mut Console, target: SessionTarget, frames: usize) -> Result<u32> {
    console.execute(Command::Record(target))?;
    wait_for("buffered frames", || {
        console.session(target).buffered_frames() >= frames
    })?;
    console.execute(Command::Record(target))?;
    let deadline = Instant::now() + Duration::from_secs(20);
    while console.session(target).state() != CaptureState::Idle {
        if Instant::now() > deadline {
            bail!("recording was never saved");
        }
        console.tick();
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(AviReader::open(console.session(target).recording_path())?.info().frame_count)
}

fn tick_until_stitched(console: &mut Console) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(30);
    while console.stitcher_state() == TaskState::Running {
        if Instant::now() > deadline {
            bail!("stitching never finished");
        }
        console.tick();
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

fn stills(dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        files.push((name.unwrap_or_default(), std::fs::read(&path)?));
    }
    files.sort();
    Ok(files)
}

#[test]
fn record_then_reconstruct_through_the_console() -> Result<()> {
    let dir = tempdir()?;
    let mut console = console_in(dir.path())?;
    console.start()?;

    console.execute(Command::Record(SessionTarget::Photogrammetry))?;
    assert_eq!(
        console.session(SessionTarget::Photogrammetry).state(),
        CaptureState::Armed
    );
    assert_eq!(
        console.session(SessionTarget::Photosphere).state(),
        CaptureState::Idle
    );
    wait_for("buffered frames", || {
        console.session(SessionTarget::Photogrammetry).buffered_frames() >= 4
    })?;

    console.execute(Command::Record(SessionTarget::Photogrammetry))?;
    let deadline = Instant::now() + Duration::from_secs(20);
    while console.session(SessionTarget::Photogrammetry).state() != CaptureState::Idle {
        assert!(Instant::now() < deadline, "recording was never saved");
        console.tick();
        std::thread::sleep(Duration::from_millis(10));
    }

    let recording = console.session(SessionTarget::Photogrammetry).recording_path();
    let info = AviReader::open(&recording)?.info();
    assert!(info.frame_count >= 4, "{} frames", info.frame_count);
    assert_eq!((info.width, info.height), (16, 12));
    assert_eq!(info.fps, 30);
    assert!(!console.config().photosphere_root().exists());

    console.execute(Command::Reconstruct)?;
    assert_eq!(
        console.reconstruction().state(),
        OrchestratorState::Preparing
    );
    let deadline = Instant::now() + Duration::from_secs(20);
    let report = loop {
        let tick = console.tick();
        if tick.reconstruction.completed {
            break tick;
        }
        assert!(Instant::now() < deadline, "reconstruction never completed");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(report.reconstruction_state, OrchestratorState::Running);
    assert_eq!(report.reconstruction.progress, 1.0);
    console.execute(Command::Reconstruct)?;
    assert_eq!(console.reconstruction().state(), OrchestratorState::Idle);

    let stills = console.config().reconstruction_dir();
    assert!(stills.join("frame_1.png").is_file());
    assert!(stills.join("model").is_dir());
    let written = std::fs::read_dir(&stills)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "png"))
        .count();
    assert_eq!(written as u32, (info.frame_count + 1) / 2);

    console.shutdown();
    Ok(())
}

#[test]
fn a_second_recording_replaces_the_first() -> Result<()> {
    let dir = tempdir()?;
    let mut session = CaptureSession::new(CaptureConfig {
        name: "photogrammetry",
        root: dir.path().join("pgm"),
        width: 8,
        height: 8,
        frame_rate: 30,
    });
    let listener = session.listener();
    let frame = Frame::solid(8, 8, [10, 200, 30, 255]);

    for count in [6, 3] {
        assert!(session.toggle()?);
        for _ in 0..count {
            listener(&frame);
        }
        assert!(session.toggle()?);
        let info = session.wait().expect("flush in flight")?;
        assert_eq!(info.frame_count, count);
        assert_eq!(session.state(), CaptureState::Idle);

        let entries: Vec<_> = std::fs::read_dir(session.recording_dir())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("video.avi")]);
        assert_eq!(AviReader::open(session.recording_path())?.info().frame_count, count);
    }
    Ok(())
}

fn write_video(path: &Path, frames: u8) -> Result<()> {
    let mut writer = AviWriter::create(path, 8, 8, 30)?;
    for i in 0..frames {
        writer.write_frame(&RgbImage::from_pixel(8, 8, image::Rgb([i * 30, 0, 255 - i * 30])))?;
    }
    writer.finish()?;
    Ok(())
}

#[test]
fn sampling_keeps_every_second_frame_at_fifteen() -> Result<()> {
    let dir = tempdir()?;
    let video = dir.path().join("video.avi");
    write_video(&video, 7)?;

    let out = dir.path().join("stills");
    let report = sample(&video, &out, 15)?;
    assert_eq!(report.frames_read, 7);
    assert_eq!(report.interval, 2);
    assert_eq!(report.frames_written, 4);
    for index in 1..=4 {
        assert!(out.join(format!("frame_{index}.png")).is_file());
    }
    assert!(!out.join("frame_5.png").exists());
    Ok(())
}

#[test]
fn sampling_is_deterministic_and_replaces_the_destination() -> Result<()> {
    let dir = tempdir()?;
    let video = dir.path().join("video.avi");
    write_video(&video, 5)?;

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    std::fs::create_dir_all(&second)?;
    std::fs::write(second.join("stale.txt"), "left over")?;

    sample(&video, &first, 30)?;
    sample(&video, &second, 30)?;

    let listing = |path: &Path| -> Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    };
    assert_eq!(listing(&first)?, listing(&second)?);
    for name in listing(&first)? {
        assert_eq!(std::fs::read(first.join(&name))?, std::fs::read(second.join(&name))?);
    }
    Ok(())
}

#[test]
fn stitch_and_reconstruct_wait_for_the_recording() -> Result<()> {
    let dir = tempdir()?;
    let mut console = console_in(dir.path())?;
    console.start()?;

    console.execute(Command::Record(SessionTarget::Photosphere))?;
    console.execute(Command::Record(SessionTarget::Photogrammetry))?;
    console.execute(Command::Stitch)?;
    console.execute(Command::Reconstruct)?;
    assert_eq!(console.stitcher_state(), TaskState::Idle);
    assert_eq!(console.reconstruction().state(), OrchestratorState::Idle);
    assert!(!console.config().stitch_dir().exists());
    assert!(!console.config().reconstruction_dir().exists());

    wait_for("buffered frames", || {
        console.session(SessionTarget::Photosphere).buffered_frames() >= 30
    })?;
    console.execute(Command::Record(SessionTarget::Photosphere))?;
    if console.session(SessionTarget::Photosphere).state() == CaptureState::Flushing {
        console.execute(Command::Stitch)?;
        assert_eq!(console.stitcher_state(), TaskState::Idle);
    }
    console.execute(Command::Record(SessionTarget::Photogrammetry))?;
    if console.session(SessionTarget::Photogrammetry).state() == CaptureState::Flushing {
        console.execute(Command::Reconstruct)?;
        assert_eq!(console.reconstruction().state(), OrchestratorState::Idle);
    }

    console.shutdown();
    Ok(())
}

#[test]
fn stitching_twice_gives_the_same_stills() -> Result<()> {
    let dir = tempdir()?;
    let mut console = console_in(dir.path())?;
    console.start()?;
    let recorded = record(&mut console, SessionTarget::Photosphere, 30)?;

    console.execute(Command::Stitch)?;
    console.execute(Command::Stitch)?;
    assert_eq!(console.stitcher_state(), TaskState::Running);
    tick_until_stitched(&mut console)?;
    assert_eq!(console.stitcher_state(), TaskState::Idle);

    let stitch_dir = console.config().stitch_dir();
    let first = stills(&stitch_dir)?;
    assert_eq!(first.len() as u32, recorded);
    assert_eq!(first[0].0, "frame_1.png");

    console.execute(Command::Stitch)?;
    tick_until_stitched(&mut console)?;
    assert_eq!(stills(&stitch_dir)?, first);

    console.shutdown();
    Ok(())
}
