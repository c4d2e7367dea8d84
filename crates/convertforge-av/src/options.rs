//! Per-conversion options shared by all adapters.
//!
//! Each adapter reads only the fields that apply to it; the rest are ignored.

use serde::{Deserialize, Serialize};

/// Default encoder quality (percent), matching the usual canvas default of 0.92.
pub const DEFAULT_QUALITY: u8 = 92;

/// Options passed to every conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Encoder quality, 1-100. Only lossy image encodings use it.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Resample audio to this rate (Hz) before encoding.
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Audio bitrate for engine-encoded compressed targets.
    #[serde(default)]
    pub audio_bitrate_kbps: Option<u32>,

    #[serde(default)]
    pub video: VideoOptions,

    #[serde(default)]
    pub page: PageOptions,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            sample_rate: None,
            audio_bitrate_kbps: None,
            video: VideoOptions::default(),
            page: PageOptions::default(),
        }
    }
}

/// Video quality preset, mapped onto encoder-specific knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl VideoQuality {
    /// Constant rate factor for x264/VP9.
    pub fn crf(&self) -> u32 {
        match self {
            VideoQuality::Low => 28,
            VideoQuality::Medium => 23,
            VideoQuality::High => 18,
        }
    }

    /// Fixed quantizer for MPEG-4 part 2 (lower is better).
    pub fn qscale(&self) -> u32 {
        match self {
            VideoQuality::Low => 8,
            VideoQuality::Medium => 5,
            VideoQuality::High => 3,
        }
    }
}

/// Output resolution cap. Sources smaller than the cap are never upscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Original,
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    FullHd1080,
}

impl Resolution {
    /// Bounding box (width, height), or `None` to keep the source size.
    pub fn max_dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Resolution::Original => None,
            Resolution::Sd480 => Some((854, 480)),
            Resolution::Hd720 => Some((1280, 720)),
            Resolution::FullHd1080 => Some((1920, 1080)),
        }
    }
}

/// Options for engine-backed video transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoOptions {
    #[serde(default)]
    pub quality: VideoQuality,

    #[serde(default)]
    pub resolution: Resolution,

    /// Target video bitrate; overrides the quality preset when set.
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
}

impl VideoOptions {
    /// Whether these options ask for something a container relabel cannot provide.
    pub fn requires_reencode(&self) -> bool {
        self.resolution != Resolution::Original || self.bitrate_kbps.is_some()
    }
}

/// Page sizing mode for image-to-document output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    /// Each page takes the pixel size of its image.
    FitToImage,
}

impl PageSize {
    /// Portrait dimensions in points, or `None` for [`PageSize::FitToImage`].
    pub fn dimensions_pt(&self) -> Option<(f32, f32)> {
        match self {
            PageSize::A4 => Some((595.28, 841.89)),
            PageSize::Letter => Some((612.0, 792.0)),
            PageSize::FitToImage => None,
        }
    }
}

/// Page orientation for fixed page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Landscape for images wider than tall, portrait otherwise.
    #[default]
    Auto,
    Portrait,
    Landscape,
}

/// Layout options for image-to-document output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageOptions {
    #[serde(default)]
    pub size: PageSize,

    #[serde(default)]
    pub orientation: Orientation,

    /// Margin on every side, in points. Ignored for [`PageSize::FitToImage`].
    #[serde(default = "default_margin")]
    pub margin_pt: f32,
}

fn default_margin() -> f32 {
    20.0
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            size: PageSize::default(),
            orientation: Orientation::default(),
            margin_pt: default_margin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConversionOptions::default();
        assert_eq!(options.quality, 92);
        assert!(options.sample_rate.is_none());
        assert_eq!(options.video.quality, VideoQuality::Medium);
        assert_eq!(options.page.size, PageSize::A4);
        assert_eq!(options.page.margin_pt, 20.0);
    }

    #[test]
    fn test_video_quality_mapping() {
        assert!(VideoQuality::High.crf() < VideoQuality::Medium.crf());
        assert!(VideoQuality::Medium.crf() < VideoQuality::Low.crf());
        assert!(VideoQuality::High.qscale() < VideoQuality::Low.qscale());
    }

    #[test]
    fn test_requires_reencode() {
        assert!(!VideoOptions::default().requires_reencode());
        let options = VideoOptions {
            resolution: Resolution::Hd720,
            ..Default::default()
        };
        assert!(options.requires_reencode());
    }

    #[test]
    fn test_resolution_serialization() {
        let json = serde_json::to_string(&Resolution::Hd720).unwrap();
        assert_eq!(json, "\"720p\"");
        let parsed: Resolution = serde_json::from_str("\"original\"").unwrap();
        assert_eq!(parsed, Resolution::Original);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ConversionOptions = serde_json::from_str(r#"{"quality": 70}"#).unwrap();
        assert_eq!(options.quality, 70);
        assert_eq!(options.page, PageOptions::default());
    }
}
