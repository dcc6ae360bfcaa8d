//! Motion-JPEG in AVI.
//!
//! Every video this console writes (recordings, the carp animation) is a
//! single MJPEG video stream in a RIFF/AVI container with an `idx1` index.
//! The reader only understands what a typical MJPEG AVI holds: it walks the
//! `movi` list and decodes each `##dc`/`##db` chunk as a JPEG.
//!
//! Files are written to a `.partial` sibling and renamed into place by
//! `finish()`. A writer dropped without `finish()` removes its partial file,
//! so a failed encode never leaves a truncated video behind.

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const JPEG_QUALITY: u8 = 90;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

// Fixed header layout: RIFF(12) + LIST hdrl(12) + avih(8+56)
// + LIST strl(12) + strh(8+56) + strf(8+40) + LIST movi(12).
const AVIH_LEN: u32 = 56;
const STRH_LEN: u32 = 56;
const STRF_LEN: u32 = 40;
const STRL_LIST_LEN: u32 = 4 + (8 + STRH_LEN) + (8 + STRF_LEN);
const HDRL_LIST_LEN: u32 = 4 + (8 + AVIH_LEN) + (8 + STRL_LIST_LEN);
/// Offset of the `movi` fourcc; idx1 offsets are relative to it.
const MOVI_FOURCC_OFFSET: u64 = 12 + 8 + HDRL_LIST_LEN as u64 + 8;
const HEADER_LEN: u64 = MOVI_FOURCC_OFFSET + 4;

/// Stream parameters of an AVI file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AviInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frame_count: u32,
}

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct AviWriter {
    path: PathBuf,
    partial_path: PathBuf,
    out: Option<BufWriter<File>>,
    width: u32,
    height: u32,
    fps: u32,
    index: Vec<IndexEntry>,
    movi_len: u64,
    max_chunk: u32,
}

impl AviWriter {
    /// Start a new file at `path`, replacing it on `finish()`.
    pub fn create(path: impl AsRef<Path>, width: u32, height: u32, fps: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("video dimensions must be non-zero ({}x{})", width, height);
        }
        if fps == 0 {
            bail!("video frame rate must be at least 1");
        }
        let path = path.as_ref().to_path_buf();
        let partial_path = partial_path(&path);
        let file = File::create(&partial_path)
            .with_context(|| format!("create {}", partial_path.display()))?;
        let mut writer = Self {
            path,
            partial_path,
            out: Some(BufWriter::new(file)),
            width,
            height,
            fps,
            index: Vec::new(),
            movi_len: 0,
            max_chunk: 0,
        };
        writer.write_header(false)?;
        Ok(writer)
    }

    pub fn frames_written(&self) -> usize {
        self.index.len()
    }

    /// Append one frame. Dimensions must match the stream.
    pub fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            bail!(
                "frame is {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode(frame.as_raw(), self.width, self.height, ExtendedColorType::Rgb8)
            .context("encode jpeg frame")?;

        let size = u32::try_from(jpeg.len()).map_err(|_| anyhow!("jpeg frame too large"))?;
        let offset = u32::try_from(4 + self.movi_len)
            .map_err(|_| anyhow!("video exceeds 4 GiB AVI limit"))?;

        let out = self.out()?;
        out.write_all(b"00dc")?;
        out.write_all(&size.to_le_bytes())?;
        out.write_all(&jpeg)?;
        let mut chunk_len = 8 + jpeg.len() as u64;
        if jpeg.len() % 2 == 1 {
            out.write_all(&[0])?;
            chunk_len += 1;
        }

        self.movi_len += chunk_len;
        self.max_chunk = self.max_chunk.max(size);
        self.index.push(IndexEntry { offset, size });
        Ok(())
    }

    /// Write the index, patch the header and move the file into place.
    pub fn finish(mut self) -> Result<AviInfo> {
        let frame_count = self.index.len() as u32;
        {
            let mut idx = Vec::with_capacity(self.index.len() * 16);
            for entry in &self.index {
                idx.extend_from_slice(b"00dc");
                idx.extend_from_slice(&AVIIF_KEYFRAME.to_le_bytes());
                idx.extend_from_slice(&entry.offset.to_le_bytes());
                idx.extend_from_slice(&entry.size.to_le_bytes());
            }
            let out = self.out()?;
            out.write_all(b"idx1")?;
            out.write_all(&(idx.len() as u32).to_le_bytes())?;
            out.write_all(&idx)?;
        }

        self.write_header(true)?;
        let out = self
            .out
            .take()
            .ok_or_else(|| anyhow!("avi writer already closed"))?;
        let file = out
            .into_inner()
            .map_err(|e| anyhow!("flush {}: {}", self.partial_path.display(), e.error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.partial_path, &self.path).with_context(|| {
            format!(
                "rename {} -> {}",
                self.partial_path.display(),
                self.path.display()
            )
        })?;

        Ok(AviInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count,
        })
    }

    fn out(&mut self) -> Result<&mut BufWriter<File>> {
        self.out
            .as_mut()
            .ok_or_else(|| anyhow!("avi writer already closed"))
    }

    /// (Re)write the fixed-size header at offset 0 and return to the end.
    fn write_header(&mut self, indexed: bool) -> Result<()> {
        let frames = self.index.len() as u32;
        let movi_list_len = u32::try_from(4 + self.movi_len)
            .map_err(|_| anyhow!("video exceeds 4 GiB AVI limit"))?;
        let riff_len = riff_len(self.movi_len, self.index.len(), indexed)?;
        let micros_per_frame = 1_000_000 / self.fps;
        let suggested = self.max_chunk + 8;

        let mut h = Vec::with_capacity(HEADER_LEN as usize);
        h.extend_from_slice(b"RIFF");
        put_u32(&mut h, riff_len);
        h.extend_from_slice(b"AVI ");

        h.extend_from_slice(b"LIST");
        put_u32(&mut h, HDRL_LIST_LEN);
        h.extend_from_slice(b"hdrl");

        h.extend_from_slice(b"avih");
        put_u32(&mut h, AVIH_LEN);
        put_u32(&mut h, micros_per_frame);
        put_u32(&mut h, suggested.saturating_mul(self.fps)); // max bytes/sec
        put_u32(&mut h, 0); // padding granularity
        put_u32(&mut h, AVIF_HASINDEX);
        put_u32(&mut h, frames);
        put_u32(&mut h, 0); // initial frames
        put_u32(&mut h, 1); // streams
        put_u32(&mut h, suggested);
        put_u32(&mut h, self.width);
        put_u32(&mut h, self.height);
        for _ in 0..4 {
            put_u32(&mut h, 0);
        }

        h.extend_from_slice(b"LIST");
        put_u32(&mut h, STRL_LIST_LEN);
        h.extend_from_slice(b"strl");

        h.extend_from_slice(b"strh");
        put_u32(&mut h, STRH_LEN);
        h.extend_from_slice(b"vids");
        h.extend_from_slice(b"MJPG");
        put_u32(&mut h, 0); // flags
        put_u16(&mut h, 0); // priority
        put_u16(&mut h, 0); // language
        put_u32(&mut h, 0); // initial frames
        put_u32(&mut h, 1); // scale
        put_u32(&mut h, self.fps); // rate
        put_u32(&mut h, 0); // start
        put_u32(&mut h, frames); // length
        put_u32(&mut h, suggested);
        put_u32(&mut h, u32::MAX); // quality: default
        put_u32(&mut h, 0); // sample size
        put_u16(&mut h, 0);
        put_u16(&mut h, 0);
        put_u16(&mut h, self.width.min(u16::MAX as u32) as u16);
        put_u16(&mut h, self.height.min(u16::MAX as u32) as u16);

        h.extend_from_slice(b"strf");
        put_u32(&mut h, STRF_LEN);
        put_u32(&mut h, STRF_LEN); // biSize
        put_u32(&mut h, self.width);
        put_u32(&mut h, self.height);
        put_u16(&mut h, 1); // planes
        put_u16(&mut h, 24); // bit count
        h.extend_from_slice(b"MJPG");
        put_u32(&mut h, self.width * self.height * 3);
        for _ in 0..4 {
            put_u32(&mut h, 0);
        }

        h.extend_from_slice(b"LIST");
        put_u32(&mut h, movi_list_len);
        h.extend_from_slice(b"movi");
        debug_assert_eq!(h.len() as u64, HEADER_LEN);

        let out = self.out()?;
        let end = out.stream_position()?;
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&h)?;
        if end > HEADER_LEN {
            out.seek(SeekFrom::Start(end))?;
        }
        Ok(())
    }
}

impl Drop for AviWriter {
    fn drop(&mut self) {
        if self.out.take().is_some() {
            let _ = fs::remove_file(&self.partial_path);
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

// ----------------------------------------------------------------------------
// Reader
// ----------------------------------------------------------------------------

pub struct AviReader {
    input: BufReader<File>,
    info: AviInfo,
    /// Absolute end of the `movi` list.
    movi_end: u64,
    frames_read: u32,
}

impl AviReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut input = BufReader::new(file);

        let mut riff = [0u8; 12];
        input
            .read_exact(&mut riff)
            .with_context(|| format!("{} is not a RIFF file", path.display()))?;
        if &riff[0..4] != b"RIFF" || &riff[8..12] != b"AVI " {
            bail!("{} is not an AVI file", path.display());
        }

        let mut info = None;
        loop {
            let Some((id, len)) = read_chunk_header(&mut input)? else {
                bail!("{} has no movi list", path.display());
            };
            let start = input.stream_position()?;
            if &id == b"LIST" {
                let mut kind = [0u8; 4];
                input.read_exact(&mut kind)?;
                match &kind {
                    b"hdrl" => {
                        info = Some(parse_hdrl(&mut input, start + len as u64)?);
                    }
                    b"movi" => {
                        let info = info
                            .ok_or_else(|| anyhow!("{} has movi before hdrl", path.display()))?;
                        return Ok(Self {
                            input,
                            info,
                            movi_end: start + len as u64,
                            frames_read: 0,
                        });
                    }
                    _ => {}
                }
            }
            input.seek(SeekFrom::Start(start + padded(len)))?;
        }
    }

    pub fn info(&self) -> AviInfo {
        self.info
    }

    /// Decode the next video frame, or `None` at the end of the stream.
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        loop {
            let pos = self.input.stream_position()?;
            if pos + 8 > self.movi_end {
                return Ok(None);
            }
            let Some((id, len)) = read_chunk_header(&mut self.input)? else {
                return Ok(None);
            };
            let start = self.input.stream_position()?;

            if &id == b"LIST" {
                // `rec ` lists group chunks; descend into them.
                self.input.seek(SeekFrom::Current(4))?;
                continue;
            }
            if is_video_chunk(&id) {
                let mut data = vec![0u8; len as usize];
                self.input.read_exact(&mut data)?;
                if len % 2 == 1 {
                    self.input.seek(SeekFrom::Current(1))?;
                }
                self.frames_read += 1;
                let image = image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
                    .with_context(|| format!("decode frame {}", self.frames_read))?;
                return Ok(Some(image.to_rgb8()));
            }
            self.input.seek(SeekFrom::Start(start + padded(len)))?;
        }
    }
}

impl Iterator for AviReader {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

fn is_video_chunk(id: &[u8; 4]) -> bool {
    id[0].is_ascii_digit() && id[1].is_ascii_digit() && (&id[2..] == b"dc" || &id[2..] == b"db")
}

fn padded(len: u32) -> u64 {
    len as u64 + (len as u64 & 1)
}

/// RIFF payload size for a file with `movi_len` bytes of frame chunks.
fn riff_len(movi_len: u64, frames: usize, indexed: bool) -> Result<u32> {
    let idx_len = if indexed { 8 + 16 * frames as u64 } else { 0 };
    let total = (HEADER_LEN - 8)
        .checked_add(movi_len)
        .and_then(|len| len.checked_add(idx_len))
        .ok_or_else(|| anyhow!("video exceeds 4 GiB AVI limit"))?;
    u32::try_from(total).map_err(|_| anyhow!("video exceeds 4 GiB AVI limit"))
}

fn read_chunk_header<R: Read>(input: &mut R) -> Result<Option<([u8; 4], u32)>> {
    let mut header = [0u8; 8];
    match input.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut id = [0u8; 4];
    id.copy_from_slice(&header[0..4]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Ok(Some((id, len)))
}

fn parse_hdrl<R: Read + Seek>(input: &mut R, end: u64) -> Result<AviInfo> {
    let mut info = AviInfo {
        width: 0,
        height: 0,
        fps: 0,
        frame_count: 0,
    };
    while input.stream_position()? + 8 <= end {
        let Some((id, len)) = read_chunk_header(input)? else {
            break;
        };
        let start = input.stream_position()?;
        match &id {
            b"avih" => {
                let body = read_body(input, len)?;
                info.frame_count = le_u32(&body, 16)?;
                info.width = le_u32(&body, 32)?;
                info.height = le_u32(&body, 36)?;
                if info.fps == 0 {
                    let micros = le_u32(&body, 0)?;
                    if micros > 0 {
                        info.fps = (1_000_000 + micros / 2) / micros;
                    }
                }
            }
            b"LIST" => {
                // strl: descend and pick up the stream rate.
                input.seek(SeekFrom::Current(4))?;
                continue;
            }
            b"strh" => {
                let body = read_body(input, len)?;
                if body.get(0..4) == Some(&b"vids"[..]) {
                    let scale = le_u32(&body, 20)?.max(1);
                    let rate = le_u32(&body, 24)?;
                    info.fps = rate / scale;
                }
            }
            _ => {}
        }
        input.seek(SeekFrom::Start(start + padded(len)))?;
    }
    Ok(info)
}

fn read_body<R: Read>(input: &mut R, len: u32) -> Result<Vec<u8>> {
    let mut body = vec![0u8; len as usize];
    input.read_exact(&mut body)?;
    Ok(body)
}

fn le_u32(body: &[u8], at: usize) -> Result<u32> {
    body.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| anyhow!("truncated AVI header"))
}
