//! Shared fixtures for integration tests.
//!
//! Builds small in-memory media files and provides a [`RecordingDownloader`]
//! and [`FailingArchiver`] for exercising packaging without touching disk.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;

use parking_lot::Mutex;

use convertforge::packaging::{ArchiveEntry, Archiver, Downloader, PackagingError};
use convertforge_av::SourceFile;

/// PNG image of `width` x `height` with a horizontal gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, _| {
        image::Rgba([(x * 255 / width.max(1)) as u8, 64, 128, 255])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// 16-bit PCM WAV with a 440 Hz tone.
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec).expect("wav writer");
        for frame in 0..frames {
            let t = frame as f32 / sample_rate as f32;
            let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }
    buf.into_inner()
}

pub fn png_source(name: &str, width: u32, height: u32) -> SourceFile {
    SourceFile::new(name, "image/png", png_bytes(width, height))
}

pub fn wav_source(name: &str, sample_rate: u32) -> SourceFile {
    SourceFile::new(name, "audio/wav", wav_bytes(sample_rate, 2, sample_rate as usize / 10))
}

/// Bytes that no decoder accepts, labeled as a PNG.
pub fn broken_png(name: &str) -> SourceFile {
    SourceFile::new(name, "image/png", b"definitely not a png".to_vec())
}

/// One call to [`RecordingDownloader::trigger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggered {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Downloader that remembers every trigger instead of writing files.
#[derive(Debug, Default)]
pub struct RecordingDownloader {
    calls: Mutex<Vec<Triggered>>,
}

impl RecordingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Triggered> {
        self.calls.lock().clone()
    }
}

impl Downloader for RecordingDownloader {
    fn trigger(&self, bytes: &[u8], filename: &str, mime: &str) -> Option<PathBuf> {
        self.calls.lock().push(Triggered {
            file_name: filename.to_string(),
            mime: mime.to_string(),
            bytes: bytes.to_vec(),
        });
        Some(PathBuf::from(filename))
    }
}

/// Archiver that always fails.
#[derive(Debug, Default)]
pub struct FailingArchiver;

impl Archiver for FailingArchiver {
    fn extension(&self) -> &'static str {
        "zip"
    }

    fn mime(&self) -> &'static str {
        "application/zip"
    }

    fn archive(&self, _entries: &[ArchiveEntry<'_>]) -> Result<Vec<u8>, PackagingError> {
        Err(PackagingError::Archive("archiver unavailable".to_string()))
    }
}
