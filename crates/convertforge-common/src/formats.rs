//! Static catalog of supported media kinds and target formats.
//!
//! Every target format knows its display label, canonical MIME type and file
//! extension. The catalog is ordered: [`formats_for`] returns targets in the
//! order they are offered to users.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad category of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still images.
    Image,
    /// Audio recordings.
    Audio,
    /// Video files.
    Video,
}

impl MediaKind {
    /// Classify a MIME type by its top-level type.
    ///
    /// Returns `None` for anything that is not `image/*`, `audio/*` or `video/*`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top = mime.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// All media kinds, in catalog order.
    pub fn all() -> &'static [MediaKind] {
        &[MediaKind::Image, MediaKind::Audio, MediaKind::Video]
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(crate::Error::unknown_format(format!("media kind {s}"))),
        }
    }
}

/// A format a file can be converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    // Image targets
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Ico,
    Tiff,
    /// Multi-page document built from images.
    Pdf,

    // Audio targets
    Wav,
    Mp3,
    Ogg,
    Flac,
    Aac,
    M4a,

    // Video targets
    Mp4,
    Webm,
    Mov,
    Avi,
    Mkv,
}

const IMAGE_FORMATS: &[TargetFormat] = &[
    TargetFormat::Png,
    TargetFormat::Jpeg,
    TargetFormat::Webp,
    TargetFormat::Gif,
    TargetFormat::Bmp,
    TargetFormat::Ico,
    TargetFormat::Tiff,
    TargetFormat::Pdf,
];

const AUDIO_FORMATS: &[TargetFormat] = &[
    TargetFormat::Wav,
    TargetFormat::Mp3,
    TargetFormat::Ogg,
    TargetFormat::Flac,
    TargetFormat::Aac,
    TargetFormat::M4a,
];

const VIDEO_FORMATS: &[TargetFormat] = &[
    TargetFormat::Mp4,
    TargetFormat::Webm,
    TargetFormat::Mov,
    TargetFormat::Avi,
    TargetFormat::Mkv,
];

/// Ordered set of target formats offered for a media kind.
///
/// # Examples
///
/// ```
/// use convertforge_common::{formats_for, MediaKind, TargetFormat};
///
/// assert!(formats_for(MediaKind::Audio).contains(&TargetFormat::Wav));
/// assert!(!formats_for(MediaKind::Audio).contains(&TargetFormat::Png));
/// ```
#[must_use]
pub fn formats_for(kind: MediaKind) -> &'static [TargetFormat] {
    match kind {
        MediaKind::Image => IMAGE_FORMATS,
        MediaKind::Audio => AUDIO_FORMATS,
        MediaKind::Video => VIDEO_FORMATS,
    }
}

impl TargetFormat {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WebP",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Ico => "ICO",
            Self::Tiff => "TIFF",
            Self::Pdf => "PDF",
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
            Self::Ogg => "OGG",
            Self::Flac => "FLAC",
            Self::Aac => "AAC",
            Self::M4a => "M4A",
            Self::Mp4 => "MP4",
            Self::Webm => "WebM",
            Self::Mov => "MOV",
            Self::Avi => "AVI",
            Self::Mkv => "MKV",
        }
    }

    /// Canonical MIME type of the format.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Ico => "image/x-icon",
            Self::Tiff => "image/tiff",
            Self::Pdf => "application/pdf",
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::Aac => "audio/aac",
            Self::M4a => "audio/mp4",
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
            Self::Mov => "video/quicktime",
            Self::Avi => "video/x-msvideo",
            Self::Mkv => "video/x-matroska",
        }
    }

    /// File extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Ico => "ico",
            Self::Tiff => "tiff",
            Self::Pdf => "pdf",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
        }
    }

    /// Media kind whose sources this format accepts.
    pub fn kind(&self) -> MediaKind {
        if IMAGE_FORMATS.contains(self) {
            MediaKind::Image
        } else if AUDIO_FORMATS.contains(self) {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }

    /// Whether a quality setting changes the encoded output.
    ///
    /// Only lossy encodings honour quality; the WebP encoder is lossless.
    pub fn supports_quality(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// Whether this is the uncompressed intermediate used by the audio adapter.
    pub fn is_canonical_audio(&self) -> bool {
        matches!(self, Self::Wav)
    }

    /// Inverse mapping from a file extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let format = match ext.as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" | "jpe" => Self::Jpeg,
            "webp" => Self::Webp,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "ico" => Self::Ico,
            "tif" | "tiff" => Self::Tiff,
            "pdf" => Self::Pdf,
            "wav" | "wave" => Self::Wav,
            "mp3" => Self::Mp3,
            "ogg" | "oga" => Self::Ogg,
            "flac" => Self::Flac,
            "aac" => Self::Aac,
            "m4a" => Self::M4a,
            "mp4" | "m4v" => Self::Mp4,
            "webm" => Self::Webm,
            "mov" => Self::Mov,
            "avi" => Self::Avi,
            "mkv" => Self::Mkv,
            _ => return None,
        };
        Some(format)
    }

    /// Look up the format whose canonical MIME type matches (after normalizing aliases).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = normalize_mime(mime);
        IMAGE_FORMATS
            .iter()
            .chain(AUDIO_FORMATS)
            .chain(VIDEO_FORMATS)
            .copied()
            .find(|f| f.mime() == mime)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for TargetFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| crate::Error::unknown_format(s))
    }
}

/// Fold common MIME aliases onto the catalog's canonical spelling.
///
/// Parameters (`; codecs=...`) are dropped and the result is lowercase.
///
/// # Examples
///
/// ```
/// use convertforge_common::normalize_mime;
///
/// assert_eq!(normalize_mime("image/JPG"), "image/jpeg");
/// assert_eq!(normalize_mime("audio/x-wav"), "audio/wav");
/// assert_eq!(normalize_mime("video/webm; codecs=vp9"), "video/webm");
/// ```
pub fn normalize_mime(mime: &str) -> String {
    let base = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/vnd.microsoft.icon" | "image/ico" => "image/x-icon".to_string(),
        "image/x-ms-bmp" => "image/bmp".to_string(),
        "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => "audio/wav".to_string(),
        "audio/mp3" | "audio/x-mp3" => "audio/mpeg".to_string(),
        "audio/x-flac" => "audio/flac".to_string(),
        "audio/x-m4a" | "audio/m4a" => "audio/mp4".to_string(),
        "video/x-quicktime" => "video/quicktime".to_string(),
        "video/avi" | "video/msvideo" => "video/x-msvideo".to_string(),
        _ => base,
    }
}
