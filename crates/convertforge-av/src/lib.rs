//! # convertforge-av
//!
//! Conversion adapters for the convertforge pipeline.
//!
//! This crate provides functionality for:
//! - Re-encoding still images between raster formats
//! - Decoding audio into the canonical WAV container, with optional resampling
//! - Transcoding audio and video through an external ffmpeg engine
//! - Building multi-page PDF documents from images
//!
//! Every adapter reports whether its output is a genuine conversion or a
//! passthrough via [`ConversionKind`].
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use convertforge_av::{ConversionAdapter, ConversionOptions, ImageAdapter, SourceFile};
//! use convertforge_common::TargetFormat;
//!
//! let bytes = std::fs::read("photo.png")?;
//! let source = SourceFile::new("photo.png", "image/png", bytes);
//! let blob = ImageAdapter::new().convert(
//!     &source,
//!     TargetFormat::Jpeg,
//!     &ConversionOptions::default(),
//!     &mut |percent| println!("{percent}%"),
//! )?;
//! println!("{} bytes, {:?}", blob.len(), blob.kind);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
mod blob;
pub mod document;
mod error;
pub mod images;
pub mod options;
pub mod tools;
pub mod transcode;
pub mod video;
pub mod workspace;

// Re-exports
pub use audio::AudioAdapter;
pub use blob::{ConversionKind, ConvertedBlob, PassthroughReason, SourceFile};
pub use document::DocumentAdapter;
pub use error::{Error, Result};
pub use images::ImageAdapter;
pub use options::{
    ConversionOptions, Orientation, PageOptions, PageSize, Resolution, VideoOptions, VideoQuality,
};
pub use tools::{check_tool, check_tools, locate, ToolInfo};
pub use transcode::TranscodeEngine;
pub use video::VideoAdapter;
pub use workspace::Workspace;

use convertforge_common::TargetFormat;

/// A converter from source files to one family of target formats.
///
/// `progress` receives percentages as the conversion advances. Adapters
/// never report 100; the caller marks completion.
pub trait ConversionAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this adapter can produce `target`.
    fn accepts(&self, target: TargetFormat) -> bool;

    /// Convert `source` into `target`.
    fn convert(
        &self,
        source: &SourceFile,
        target: TargetFormat,
        options: &ConversionOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<ConvertedBlob>;
}
