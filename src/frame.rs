//! Decoded video frames.
//!
//! - `Frame`: one RGBA8 raster produced by a `VideoSource`.
//! - Conversion helpers to the RGB layout the recording encoder consumes.
//!
//! Frames are ephemeral. They are handed to listeners by reference and only
//! outlive the decoder callback when a capture session copies them into its
//! buffer.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage, RgbaImage};

/// Bytes per pixel of the fixed frame layout.
pub const BYTES_PER_PIXEL: usize = 4;

/// One decoded RGBA8 frame, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap tightly packed RGBA pixels.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single RGBA colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * BYTES_PER_PIXEL)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Drop alpha. This is the colour conversion applied before a frame
    /// enters a capture buffer.
    pub fn to_rgb(&self) -> RgbImage {
        let rgb: Vec<u8> = self
            .data
            .chunks_exact(BYTES_PER_PIXEL)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        // Length is width * height * 3 by construction.
        RgbImage::from_raw(self.width, self.height, rgb)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl From<RgbaImage> for Frame {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// Copy rows out of a strided buffer into a tightly packed one.
///
/// Decoders (GStreamer, FFmpeg) may pad each row; `row_bytes` is the
/// unpadded row length.
pub fn unstride(data: &[u8], stride: usize, row_bytes: usize, height: usize) -> Result<Vec<u8>> {
    if stride == row_bytes {
        return data
            .get(..row_bytes * height)
            .map(|packed| packed.to_vec())
            .ok_or_else(|| anyhow!("frame buffer is shorter than {} rows", height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| anyhow!("frame row {} is out of bounds", row))?,
        );
    }
    Ok(pixels)
}

/// Resize to the encoder's fixed resolution. No-op when already there.
pub fn fit_to(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    imageops::resize(&image, width, height, imageops::FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_length() {
        assert!(Frame::new(2, 2, vec![0u8; 15]).is_err());
        assert!(Frame::new(2, 2, vec![0u8; 16]).is_ok());
    }

    #[test]
    fn to_rgb_drops_alpha() {
        let frame = Frame::solid(3, 2, [10, 20, 30, 255]);
        let rgb = frame.to_rgb();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert!(rgb.pixels().all(|p| p.0 == [10, 20, 30]));
    }

    #[test]
    fn unstride_removes_row_padding() -> Result<()> {
        // 2 rows of 3 bytes, padded to a stride of 4.
        let data = [1, 2, 3, 0, 4, 5, 6, 0];
        assert_eq!(unstride(&data, 4, 3, 2)?, vec![1, 2, 3, 4, 5, 6]);
        assert!(unstride(&data[..6], 4, 3, 2).is_err());
        Ok(())
    }

    #[test]
    fn fit_to_resizes_only_when_needed() {
        let image = RgbImage::new(8, 6);
        assert_eq!(fit_to(image.clone(), 8, 6).dimensions(), (8, 6));
        assert_eq!(fit_to(image, 4, 3).dimensions(), (4, 3));
    }
}
