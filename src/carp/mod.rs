//! Map animator ("carp").
//!
//! Renders a year-by-year animation of which river segments are highlighted.
//! Each table row becomes one frame: the map background, the row's flagged
//! regions stroked on top and the year stamped in the bottom-left corner.
//! Frames are written at 1 fps, so one second of video is one row.
//!
//! - `table`: CSV loading (`year,flag,flag,...`)
//! - `path`: SVG path data for region outlines
//! - `regions`: the built-in region outlines
//! - `glyphs`: stroked digits for the year stamp

pub mod glyphs;
pub mod path;
pub mod regions;
pub mod table;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tiny_skia::{LineCap, Paint, Pixmap, Stroke, Transform};

use crate::media::AviWriter;

pub use path::PathData;
pub use table::{read_table, TableRow};

/// Output written when the operator does not name one.
pub const DEFAULT_OUTPUT: &str = "carp.avi";
/// One row per second of output.
pub const OUTPUT_FPS: u32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct MapStyle {
    pub region_rgba: [u8; 4],
    pub region_width: f32,
    pub year_rgba: [u8; 4],
    /// Left end of the year's baseline, in background pixels.
    pub year_origin: (f32, f32),
    pub year_size: f32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            region_rgba: [0, 0, 255, 255],
            region_width: 10.0,
            year_rgba: [0, 0, 0, 255],
            year_origin: (11.884668, 1210.7764),
            year_size: 120.958,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderReport {
    pub frames: usize,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
}

pub struct MapAnimator {
    background: PathBuf,
    regions: Vec<PathData>,
    style: MapStyle,
}

impl MapAnimator {
    /// Animator over the built-in Illinois regions.
    pub fn new(background: impl Into<PathBuf>) -> Result<Self> {
        let regions = regions::REGIONS
            .iter()
            .enumerate()
            .map(|(i, data)| {
                PathData::parse(data).with_context(|| format!("built-in region {}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_regions(background, regions))
    }

    pub fn with_regions(background: impl Into<PathBuf>, regions: Vec<PathData>) -> Self {
        Self {
            background: background.into(),
            regions,
            style: MapStyle::default(),
        }
    }

    pub fn with_style(mut self, style: MapStyle) -> Self {
        self.style = style;
        self
    }

    pub fn background(&self) -> &Path {
        &self.background
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Render `rows` to `output`. Nothing is left at `output` on failure.
    pub fn render(&self, rows: &[TableRow], output: &Path) -> Result<RenderReport> {
        if rows.is_empty() {
            bail!("map table has no rows");
        }
        let background = Pixmap::load_png(&self.background)
            .map_err(|e| anyhow!("load map background {}: {}", self.background.display(), e))?;
        let (width, height) = (background.width(), background.height());

        let mut writer = AviWriter::create(output, width, height, OUTPUT_FPS)?;
        for row in rows {
            if row.flags.len() > self.regions.len() {
                log::debug!(
                    "carp: {} has {} flags for {} regions, extra flags ignored",
                    row.year,
                    row.flags.len(),
                    self.regions.len()
                );
            }
            let frame = self.compose(&background, row)?;
            writer
                .write_frame(&to_rgb(&frame))
                .with_context(|| format!("encode frame for {}", row.year))?;
        }
        writer.finish()?;

        log::info!(
            "carp: rendered {} frames ({}x{}) to {}",
            rows.len(),
            width,
            height,
            output.display()
        );
        Ok(RenderReport {
            frames: rows.len(),
            width,
            height,
            output: output.to_path_buf(),
        })
    }

    /// One frame: year stamp first, flagged regions over it.
    pub fn compose(&self, background: &Pixmap, row: &TableRow) -> Result<Pixmap> {
        let mut frame = background.clone();
        let style = &self.style;

        let year = row.year.to_string();
        let (x, y) = style.year_origin;
        if let Some(outline) = glyphs::text_path(&year, x, y, style.year_size) {
            let metrics = glyphs::GlyphMetrics::for_size(style.year_size);
            frame.stroke_path(
                &outline,
                &paint(style.year_rgba),
                &stroke(metrics.stroke_width),
                Transform::identity(),
                None,
            );
        }

        let region_paint = paint(style.region_rgba);
        let region_stroke = stroke(style.region_width);
        for (index, region) in self.regions.iter().enumerate() {
            if !row.is_shown(index) {
                continue;
            }
            let outline = region
                .to_skia()
                .ok_or_else(|| anyhow!("region {} has no drawable outline", index + 1))?;
            frame.stroke_path(
                &outline,
                &region_paint,
                &region_stroke,
                Transform::identity(),
                None,
            );
        }
        Ok(frame)
    }
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = true;
    paint
}

fn stroke(width: f32) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Round,
        ..Stroke::default()
    }
}

/// Flatten onto RGB, dropping alpha after un-premultiplying.
pub fn to_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(pixmap.width(), pixmap.height());
    for (out, px) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = px.demultiply();
        out.0 = [color.red(), color.green(), color.blue()];
    }
    image
}
