use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::{Rgb, RgbImage, RgbaImage};
use tempfile::tempdir;

use mate_console::carp::{read_table, MapAnimator};
use mate_console::console::{Command, Console};
use mate_console::media::AviReader;
use mate_console::task::TaskState;
use mate_console::ConsoleConfig;

const MAP_WIDTH: u32 = 932;
const MAP_HEIGHT: u32 = 1241;

fn white_map(path: &Path) -> Result<()> {
    RgbaImage::from_pixel(MAP_WIDTH, MAP_HEIGHT, image::Rgba([255, 255, 255, 255])).save(path)?;
    Ok(())
}

fn is_blue(pixel: &Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0;
    b > 150 && r < 110 && g < 110
}

fn is_white(pixel: &Rgb<u8>) -> bool {
    pixel.0.iter().all(|&channel| channel > 200)
}

fn around(frame: &RgbImage, x: u32, y: u32) -> Vec<Rgb<u8>> {
    let mut pixels = Vec::new();
    for dy in 0..5 {
        for dx in 0..5 {
            pixels.push(*frame.get_pixel(x + dx - 2, y + dy - 2));
        }
    }
    pixels
}

fn dark_pixels_in_year_box(frame: &RgbImage) -> usize {
    let mut count = 0;
    for y in 1110..1215 {
        for x in 10..300 {
            if frame.get_pixel(x, y).0.iter().all(|&channel| channel < 80) {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn console_renders_one_frame_per_row() -> Result<()> {
    let dir = tempdir()?;
    white_map(&dir.path().join("illinois.png"))?;
    let table = dir.path().join("table.csv");
    std::fs::write(
        &table,
        "year,r1,r2,r3,r4,r5\n2020,Y,N,N,N,N\n2021,N,Y,N,N,N\n",
    )?;

    let json = format!(
        r#"{{ "workspace": {:?}, "reconstruction": {{ "engine": "stub://engine" }} }}"#,
        dir.path().display().to_string()
    );
    let mut console = Console::from_config(ConsoleConfig::from_json(&json)?)?;
    console.execute(Command::Carp(table))?;

    let output = console.config().carp_output_path();
    let deadline = Instant::now() + Duration::from_secs(60);
    while console.carp_state() == TaskState::Running {
        assert!(Instant::now() < deadline, "render never finished");
        console.tick();
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(console.carp_state(), TaskState::Idle);

    let mut reader = AviReader::open(&output)?;
    let info = reader.info();
    assert_eq!((info.width, info.height), (MAP_WIDTH, MAP_HEIGHT));
    assert_eq!(info.fps, 1);
    assert_eq!(info.frame_count, 2);

    let first = reader.next_frame()?.expect("frame for 2020");
    let second = reader.next_frame()?.expect("frame for 2021");
    assert!(reader.next_frame()?.is_none());

    // Region 1 passes through (206, 773), region 2 through (275, 582).
    assert!(around(&first, 206, 773).iter().any(is_blue));
    assert!(around(&first, 275, 582).iter().all(is_white));
    assert!(around(&second, 275, 582).iter().any(is_blue));
    assert!(around(&second, 206, 773).iter().all(is_white));

    assert!(dark_pixels_in_year_box(&first) > 100);
    assert!(dark_pixels_in_year_box(&second) > 100);
    assert!(is_white(first.get_pixel(MAP_WIDTH - 5, 5)));

    console.shutdown();
    Ok(())
}

#[test]
fn empty_table_leaves_no_output() -> Result<()> {
    let dir = tempdir()?;
    let background = dir.path().join("map.png");
    white_map(&background)?;
    let table = dir.path().join("empty.csv");
    std::fs::write(&table, "year,r1,r2,r3,r4,r5\n")?;

    let rows = read_table(&table)?;
    assert!(rows.is_empty());

    let output = dir.path().join("carp.avi");
    let animator = MapAnimator::new(&background)?;
    assert!(animator.render(&rows, &output).is_err());
    assert!(!output.exists());
    Ok(())
}

#[test]
fn missing_background_fails_cleanly() -> Result<()> {
    let dir = tempdir()?;
    let table = dir.path().join("table.csv");
    std::fs::write(&table, "year,r1\n1999,Y\n")?;

    let output = dir.path().join("carp.avi");
    let animator = MapAnimator::new(dir.path().join("missing.png"))?;
    let err = animator
        .render(&read_table(&table)?, &output)
        .expect_err("background is missing");
    assert!(format!("{err:#}").contains("missing.png"));
    assert!(!output.exists());
    Ok(())
}
