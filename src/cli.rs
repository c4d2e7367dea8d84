use clap::{Parser, Subcommand, ValueEnum};
use convertforge_av::{Orientation, PageSize};
use convertforge_common::{MediaKind, TargetFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convertforge")]
#[command(author, version, about = "Batch image, audio and video file converter")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert files to a target format and download the results
    Convert {
        /// Files to convert
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target format extension (png, jpg, mp3, webm, pdf, ...)
        #[arg(short, long)]
        to: TargetFormat,

        /// Encoder quality for lossy image targets (1-100)
        #[arg(short, long)]
        quality: Option<u8>,

        /// Resample audio to this rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Directory to save downloads into
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Download every file on its own instead of one archive
        #[arg(long)]
        no_archive: bool,

        /// Number of files converted in parallel
        #[arg(short, long)]
        workers: Option<usize>,

        /// Keep the finished queue on disk instead of clearing it
        #[arg(long)]
        keep: bool,
    },

    /// Combine images into one PDF document
    MergePdf {
        /// Images, one per page, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file name
        #[arg(short, long, default_value = "merged.pdf")]
        name: String,

        /// Directory to save the document into
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long, value_enum)]
        page_size: Option<PageSizeArg>,

        #[arg(long, value_enum)]
        orientation: Option<OrientationArg>,

        /// Page margin in points
        #[arg(long)]
        margin: Option<f32>,
    },

    /// List target formats per media kind
    Formats {
        /// Only list formats for this kind (image, audio, video)
        kind: Option<MediaKind>,
    },

    /// Finish a batch that was interrupted
    Resume {
        /// Directory to save downloads into
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Download every file on its own instead of one archive
        #[arg(long)]
        no_archive: bool,
    },

    /// Show conversion and download counts
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the optional transcoding tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PageSizeArg {
    A4,
    Letter,
    /// Each page matches its image
    Fit,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Fit => PageSize::FitToImage,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrientationArg {
    Auto,
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Auto => Orientation::Auto,
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}
