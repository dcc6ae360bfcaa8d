//! Sequential reading of a recorded video.
//!
//! `.avi` files go through the built-in MJPEG reader. Anything else needs the
//! `decode-ffmpeg` feature.

use anyhow::Result;
use image::RgbImage;
use std::path::Path;

use super::avi::AviReader;
#[cfg(feature = "decode-ffmpeg")]
use super::ffmpeg::FfmpegReader;

pub struct VideoReader {
    backend: ReaderBackend,
}

enum ReaderBackend {
    Mjpeg(AviReader),
    #[cfg(feature = "decode-ffmpeg")]
    Ffmpeg(FfmpegReader),
}

impl VideoReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_avi = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("avi"))
            .unwrap_or(false);

        if is_avi {
            return Ok(Self {
                backend: ReaderBackend::Mjpeg(AviReader::open(path)?),
            });
        }

        #[cfg(feature = "decode-ffmpeg")]
        {
            Ok(Self {
                backend: ReaderBackend::Ffmpeg(FfmpegReader::open(path)?),
            })
        }
        #[cfg(not(feature = "decode-ffmpeg"))]
        {
            anyhow::bail!(
                "{} is not an AVI file; other formats require the decode-ffmpeg feature",
                path.display()
            )
        }
    }

    /// Next frame in decode order, `None` once the file is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            ReaderBackend::Mjpeg(reader) => reader.next_frame(),
            #[cfg(feature = "decode-ffmpeg")]
            ReaderBackend::Ffmpeg(reader) => reader.next_frame(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_avi_without_ffmpeg_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"")?;
        if cfg!(not(feature = "decode-ffmpeg")) {
            assert!(VideoReader::open(&path).is_err());
        }
        Ok(())
    }
}
