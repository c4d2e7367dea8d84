use convertforge_av::{
    ConversionOptions, Orientation, PageOptions, PageSize, Resolution, TranscodeEngine,
    VideoOptions, VideoQuality,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub document: DocumentConfig,

    #[serde(default)]
    pub packaging: PackagingConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub usage: UsageConfig,
}

impl Config {
    /// Adapter options assembled from the conversion, transcode and document sections.
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            quality: self.conversion.quality,
            sample_rate: self.conversion.sample_rate,
            audio_bitrate_kbps: self.conversion.audio_bitrate_kbps,
            video: VideoOptions {
                quality: self.transcode.video_quality,
                resolution: self.transcode.resolution,
                bitrate_kbps: self.transcode.video_bitrate_kbps,
            },
            page: PageOptions {
                size: self.document.page_size,
                orientation: self.document.orientation,
                margin_pt: self.document.margin_pt,
            },
        }
    }

    /// The ffmpeg engine, if enabled and installed.
    pub fn transcode_engine(&self) -> Option<TranscodeEngine> {
        if !self.transcode.enabled {
            return None;
        }

        match TranscodeEngine::discover(self.transcode.ffmpeg_path.as_deref()) {
            Ok(engine) => Some(engine.with_hw_accel(self.transcode.hw_accel.clone())),
            Err(e) => {
                tracing::warn!("Transcoding engine unavailable, audio/video outputs will be relabeled: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Encoder quality for lossy image targets, 1-100 (default: 92)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Resample audio to this rate in Hz
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Bitrate for compressed audio targets (default: encoder default)
    #[serde(default)]
    pub audio_bitrate_kbps: Option<u32>,

    /// Items converted in parallel (default: 1, sequential)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_quality() -> u8 {
    convertforge_av::options::DEFAULT_QUALITY
}

fn default_workers() -> usize {
    1
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            sample_rate: None,
            audio_bitrate_kbps: None,
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Use ffmpeg for genuine audio/video transcodes when it is installed (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Hardware encoder family: nvenc, qsv or videotoolbox
    #[serde(default)]
    pub hw_accel: Option<String>,

    #[serde(default)]
    pub video_quality: VideoQuality,

    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default)]
    pub video_bitrate_kbps: Option<u32>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: None,
            hw_accel: None,
            video_quality: VideoQuality::default(),
            resolution: Resolution::default(),
            video_bitrate_kbps: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentConfig {
    #[serde(default)]
    pub page_size: PageSize,

    #[serde(default)]
    pub orientation: Orientation,

    /// Page margin in points (default: 20)
    #[serde(default = "default_margin")]
    pub margin_pt: f32,
}

fn default_margin() -> f32 {
    20.0
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            margin_pt: default_margin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackagingConfig {
    /// Bundle outputs into one ZIP download (default: true)
    #[serde(default = "default_true")]
    pub archive: bool,

    /// Nest archive entries under converted-YYYYMMDD-HHMMSS/ (default: true)
    #[serde(default = "default_true")]
    pub timestamped_folder: bool,

    /// Pause between individual downloads (default: 300)
    #[serde(default = "default_download_delay")]
    pub download_delay_ms: u64,

    /// Where downloads are saved (default: current directory)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_download_delay() -> u64 {
    300
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            archive: true,
            timestamped_folder: true,
            download_delay_ms: default_download_delay(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    /// Mirror the queue to disk so an interrupted batch can resume (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.local/share/convertforge")
}

impl PersistenceConfig {
    /// `data_dir` with a leading `~` expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).as_ref())
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsageConfig {
    /// Mirror usage counters to a remote stats service
    #[serde(default)]
    pub remote_enabled: bool,

    #[serde(default)]
    pub remote_url: Option<String>,

    /// Bearer token for the stats service
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}
