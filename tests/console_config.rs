use std::sync::Mutex;

use tempfile::NamedTempFile;

use mate_console::config::ConsoleConfig;
use mate_console::ingest::RtpEncoding;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MATE_CONFIG",
        "MATE_STREAM1_URL",
        "MATE_STREAM2_URL",
        "MATE_ENGINE_LIB",
        "MATE_WORKSPACE",
        "MATE_CARP_BACKGROUND",
        "MATE_TICK_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "workspace": "/data/mate",
        "tick_ms": 50,
        "streams": [
            { "url": "udp://5600", "encoding": "jpeg" },
            { "url": "udp://0.0.0.0:5601", "width": 1280, "height": 720, "fps": 25 }
        ],
        "photogrammetry": { "width": 1024, "height": 768, "frame_rate": 10 },
        "reconstruction": { "engine": "/opt/pgm/libpgm.so" },
        "carp": { "background": "maps/illinois.png", "output": "out/carp.avi" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MATE_CONFIG", file.path());
    std::env::set_var("MATE_STREAM1_URL", "stub://bench");
    std::env::set_var("MATE_ENGINE_LIB", "stub://engine?seconds=5");
    std::env::set_var("MATE_TICK_MS", "250");

    let cfg = ConsoleConfig::load().expect("load config");

    assert_eq!(cfg.workspace, std::path::Path::new("/data/mate"));
    assert_eq!(cfg.tick.as_millis(), 250);
    assert_eq!(cfg.streams[0].url, "stub://bench");
    assert_eq!(cfg.streams[0].encoding, RtpEncoding::Jpeg);
    assert_eq!(cfg.streams[1].url, "udp://0.0.0.0:5601");
    assert_eq!((cfg.streams[1].width, cfg.streams[1].height), (1280, 720));
    assert_eq!(cfg.streams[1].fps, 25);
    assert_eq!(cfg.photogrammetry.frame_rate, 10);
    assert_eq!((cfg.photosphere.width, cfg.photosphere.height), (1920, 1080));
    assert_eq!(cfg.engine, "stub://engine?seconds=5");
    assert_eq!(
        cfg.carp_output_path(),
        std::path::Path::new("/data/mate/out/carp.avi")
    );

    let capture = cfg.photogrammetry_capture();
    assert_eq!(capture.root, std::path::Path::new("/data/mate/pgm"));
    assert_eq!((capture.width, capture.height), (1024, 768));

    clear_env();
}

#[test]
fn rejects_invalid_tick_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MATE_TICK_MS", "fast");
    assert!(ConsoleConfig::load().is_err());
    std::env::set_var("MATE_TICK_MS", "0");
    assert!(ConsoleConfig::load().is_err());

    clear_env();
}
