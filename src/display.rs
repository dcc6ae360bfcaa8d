//! On-screen presentation of a stream.
//!
//! `StreamDisplay` owns the texture a stream is drawn into and computes where
//! it sits inside its window. The texture follows the stream: a frame with new
//! dimensions discards the old texture and allocates a fresh one before it is
//! shown.

use crate::frame::Frame;

/// Texture size before the first frame arrives.
pub const INITIAL_TEXTURE_WIDTH: u32 = 640;
pub const INITIAL_TEXTURE_HEIGHT: u32 = 480;

/// Pixel storage backing a stream's on-screen image.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    /// Incremented each time the texture is reallocated.
    pub generation: u64,
    rgba: Vec<u8>,
}

impl Texture {
    fn blank(width: u32, height: u32, generation: u64) -> Self {
        Self {
            width,
            height,
            generation,
            rgba: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }
}

/// Where the texture is drawn inside the window, in window pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct StreamDisplay {
    texture: Texture,
    placement: Option<Placement>,
    frames_shown: u64,
}

impl StreamDisplay {
    pub fn new() -> Self {
        Self {
            texture: Texture::blank(INITIAL_TEXTURE_WIDTH, INITIAL_TEXTURE_HEIGHT, 0),
            placement: None,
            frames_shown: 0,
        }
    }

    /// Push a decoded frame to the texture.
    pub fn present(&mut self, frame: &Frame) {
        if frame.dimensions() != (self.texture.width, self.texture.height) {
            let generation = self.texture.generation + 1;
            log::debug!(
                "display: reallocating texture {}x{} -> {}x{}",
                self.texture.width,
                self.texture.height,
                frame.width,
                frame.height
            );
            self.texture = Texture {
                width: frame.width,
                height: frame.height,
                generation,
                rgba: frame.pixels().to_vec(),
            };
        } else {
            self.texture.rgba.copy_from_slice(frame.pixels());
        }
        self.frames_shown += 1;
    }

    /// Recompute the placement for the current window size.
    ///
    /// Called once per UI tick, since the window size is only known after
    /// layout. A zero-sized window keeps the previous placement.
    pub fn refresh(&mut self, window_width: u32, window_height: u32) -> Option<Placement> {
        if window_width == 0 || window_height == 0 {
            return self.placement;
        }
        self.placement = Some(fit_aspect(
            self.texture.width,
            self.texture.height,
            window_width,
            window_height,
        ));
        self.placement
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Default for StreamDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest rectangle with the image's aspect ratio that fits the window,
/// centred along the slack axis.
pub fn fit_aspect(image_width: u32, image_height: u32, window_width: u32, window_height: u32) -> Placement {
    let image_aspect = image_width as f64 / image_height.max(1) as f64;
    let window_aspect = window_width as f64 / window_height as f64;

    if window_aspect > image_aspect {
        let width = (window_height as f64 * image_aspect).round() as u32;
        Placement {
            x: (window_width - width.min(window_width)) / 2,
            y: 0,
            width,
            height: window_height,
        }
    } else {
        let height = (window_width as f64 / image_aspect).round() as u32;
        Placement {
            x: 0,
            y: (window_height - height.min(window_height)) / 2,
            width: window_width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_is_reallocated_when_dimensions_change() {
        let mut display = StreamDisplay::new();
        assert_eq!(display.texture().generation, 0);

        display.present(&Frame::solid(640, 480, [1, 2, 3, 255]));
        assert_eq!(display.texture().generation, 0);
        assert_eq!(&display.texture().pixels()[..4], &[1, 2, 3, 255]);

        display.present(&Frame::solid(320, 200, [9, 9, 9, 255]));
        assert_eq!(display.texture().generation, 1);
        assert_eq!((display.texture().width, display.texture().height), (320, 200));
        assert_eq!(display.texture().pixels().len(), 320 * 200 * 4);

        display.present(&Frame::solid(320, 200, [7, 7, 7, 255]));
        assert_eq!(display.texture().generation, 1);
        assert_eq!(&display.texture().pixels()[..4], &[7, 7, 7, 255]);
        assert_eq!(display.frames_shown(), 3);
    }

    #[test]
    fn wide_window_pillarboxes() {
        let placement = fit_aspect(640, 480, 1000, 480);
        assert_eq!(
            placement,
            Placement {
                x: 180,
                y: 0,
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn tall_window_letterboxes() {
        let placement = fit_aspect(640, 480, 640, 1000);
        assert_eq!(
            placement,
            Placement {
                x: 0,
                y: 260,
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn zero_sized_window_keeps_previous_placement() {
        let mut display = StreamDisplay::new();
        assert_eq!(display.refresh(0, 0), None);
        let first = display.refresh(1280, 720);
        assert!(first.is_some());
        assert_eq!(display.refresh(0, 300), first);
    }
}
