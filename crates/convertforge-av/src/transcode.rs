//! External transcoding engine (ffmpeg CLI).
//!
//! Genuine audio/video transcoding is delegated to ffmpeg, invoked with
//! explicit codec and container arguments. Argument construction is kept
//! separate from execution so it can be inspected without the tool installed.

use crate::options::{ConversionOptions, VideoOptions};
use crate::{tools, Error, Result, SourceFile, Workspace};
use convertforge_common::paths::split_extension;
use convertforge_common::TargetFormat;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default bitrate for compressed audio targets.
const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 192;

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

/// Handle to an ffmpeg executable plus encoder preferences.
#[derive(Debug, Clone)]
pub struct TranscodeEngine {
    ffmpeg: PathBuf,
    hw_accel: Option<String>,
}

impl TranscodeEngine {
    /// Use the ffmpeg binary at `ffmpeg`.
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            hw_accel: None,
        }
    }

    /// Locate ffmpeg, preferring a configured path over PATH lookup.
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        tools::locate("ffmpeg", configured).map(Self::new)
    }

    /// Hardware video encoder family (nvenc, qsv, videotoolbox).
    pub fn with_hw_accel(mut self, hw_accel: Option<String>) -> Self {
        self.hw_accel = hw_accel;
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Decode any audio ffmpeg understands into 16-bit PCM WAV bytes.
    ///
    /// Failures surface as [`Error::Decode`] because the caller is decoding.
    pub fn decode_audio_to_wav(&self, source: &SourceFile) -> Result<Vec<u8>> {
        let workspace = Workspace::stage(source.bytes(), source_extension(source), "wav")?;
        let args = decode_audio_args(workspace.source(), workspace.target());
        self.run(workspace, &args).map_err(|e| match e {
            Error::Transcode(message) => Error::decode(message),
            other => other,
        })
    }

    /// Encode canonical WAV bytes into a compressed audio target.
    pub fn transcode_audio(
        &self,
        wav: &[u8],
        target: TargetFormat,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>> {
        let workspace = Workspace::stage(wav, "wav", target.extension())?;
        let args = audio_args(workspace.source(), workspace.target(), target, options)?;
        self.run(workspace, &args)
    }

    /// Transcode a video into `target`'s container and codecs.
    pub fn transcode_video(
        &self,
        source: &SourceFile,
        target: TargetFormat,
        options: &VideoOptions,
    ) -> Result<Vec<u8>> {
        let workspace = Workspace::stage(source.bytes(), source_extension(source), target.extension())?;
        let args = video_args(
            workspace.source(),
            workspace.target(),
            target,
            options,
            self.hw_accel.as_deref(),
        )?;
        self.run(workspace, &args)
    }

    /// Run ffmpeg against a staged workspace and collect its output.
    ///
    /// Every failure from here on is an [`Error::Transcode`]: a binary that
    /// cannot be started, a non-zero exit, or a run that wrote nothing.
    fn run(&self, workspace: Workspace, args: &[String]) -> Result<Vec<u8>> {
        #[cfg(feature = "tracing")]
        tracing::debug!("FFmpeg args: {:?}", args);

        let output = Command::new(&self.ffmpeg).args(args).output().map_err(|e| {
            Error::transcode(format!("cannot start {}: {}", self.ffmpeg.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }

        workspace.finish().map_err(|e| match e {
            Error::Workspace(message) => Error::transcode(message),
            Error::Io(e) => Error::transcode(format!("cannot read ffmpeg output: {}", e)),
            other => other,
        })
    }
}

fn source_extension(source: &SourceFile) -> &str {
    split_extension(source.name()).1.unwrap_or("")
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Arguments decoding `input` to PCM WAV at `output`.
pub fn decode_audio_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-vn".to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        "-f".to_string(),
        "wav".to_string(),
        path_arg(output),
    ]
}

/// Arguments encoding WAV `input` into an audio `target`.
pub fn audio_args(
    input: &Path,
    output: &Path,
    target: TargetFormat,
    options: &ConversionOptions,
) -> Result<Vec<String>> {
    let codec = match target {
        TargetFormat::Wav => "pcm_s16le",
        TargetFormat::Mp3 => "libmp3lame",
        TargetFormat::Ogg => "libvorbis",
        TargetFormat::Flac => "flac",
        TargetFormat::Aac | TargetFormat::M4a => "aac",
        other => {
            return Err(Error::unsupported(format!(
                "{} is not an audio target",
                other
            )))
        }
    };

    let mut args = vec!["-y".to_string(), "-i".to_string(), path_arg(input)];
    args.extend(["-vn".to_string(), "-c:a".to_string(), codec.to_string()]);

    // Lossless codecs take no bitrate
    if !matches!(target, TargetFormat::Wav | TargetFormat::Flac) {
        let bitrate = options
            .audio_bitrate_kbps
            .unwrap_or(DEFAULT_AUDIO_BITRATE_KBPS);
        args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
    }

    if let Some(rate) = options.sample_rate {
        args.extend(["-ar".to_string(), rate.to_string()]);
    }

    args.push(path_arg(output));
    Ok(args)
}

/// Arguments transcoding `input` into a video `target`.
///
/// Quality maps to CRF (x264/VP9) or a fixed quantizer (MPEG-4); an explicit
/// bitrate overrides either. Resolution caps scale down only, preserving
/// aspect ratio.
pub fn video_args(
    input: &Path,
    output: &Path,
    target: TargetFormat,
    options: &VideoOptions,
    hw_accel: Option<&str>,
) -> Result<Vec<String>> {
    let (video_encoder, audio_encoder) = match target {
        TargetFormat::Mp4 | TargetFormat::Mov | TargetFormat::Mkv => {
            let encoder = match hw_accel {
                Some("nvenc") => "h264_nvenc",
                Some("qsv") => "h264_qsv",
                Some("videotoolbox") => "h264_videotoolbox",
                _ => "libx264",
            };
            (encoder, "aac")
        }
        TargetFormat::Webm => ("libvpx-vp9", "libopus"),
        TargetFormat::Avi => ("mpeg4", "libmp3lame"),
        other => {
            return Err(Error::unsupported(format!(
                "{} is not a video target",
                other
            )))
        }
    };

    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-c:v".to_string(),
        video_encoder.to_string(),
    ];

    match options.bitrate_kbps {
        Some(kbps) => {
            args.extend([
                "-b:v".to_string(),
                format!("{}k", kbps),
                "-maxrate".to_string(),
                format!("{}k", kbps * 3 / 2),
                "-bufsize".to_string(),
                format!("{}k", kbps * 3),
            ]);
        }
        None => match video_encoder {
            "libx264" => args.extend([
                "-crf".to_string(),
                options.quality.crf().to_string(),
                "-preset".to_string(),
                "medium".to_string(),
            ]),
            // VP9 constant quality mode needs a zero bitrate
            "libvpx-vp9" => args.extend([
                "-crf".to_string(),
                options.quality.crf().to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]),
            "mpeg4" => args.extend(["-q:v".to_string(), options.quality.qscale().to_string()]),
            // Hardware encoders use different quality settings
            _ => args.extend(["-b:v".to_string(), "5M".to_string()]),
        },
    }

    if let Some((max_width, max_height)) = options.resolution.max_dimensions() {
        args.extend([
            "-vf".to_string(),
            format!(
                "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease,scale=trunc(iw/2)*2:trunc(ih/2)*2",
                max_width, max_height
            ),
        ]);
    }

    args.extend(["-c:a".to_string(), audio_encoder.to_string()]);

    // Faststart for progressive playback
    if matches!(target, TargetFormat::Mp4 | TargetFormat::Mov) {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    args.push(path_arg(output));
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Resolution, VideoQuality};

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("/tmp/in.mkv"), PathBuf::from("/tmp/out.mp4"))
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_video_args_mp4_defaults() {
        let (input, output) = paths();
        let args = video_args(&input, &output, TargetFormat::Mp4, &VideoOptions::default(), None)
            .unwrap();
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-crf", "23"));
        assert!(has_pair(&args, "-c:a", "aac"));
        assert!(has_pair(&args, "-movflags", "+faststart"));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_video_args_hw_accel() {
        let (input, output) = paths();
        let args = video_args(
            &input,
            &output,
            TargetFormat::Mkv,
            &VideoOptions::default(),
            Some("nvenc"),
        )
        .unwrap();
        assert!(has_pair(&args, "-c:v", "h264_nvenc"));
        assert!(has_pair(&args, "-b:v", "5M"));
    }

    #[test]
    fn test_video_args_webm_quality_and_scale() {
        let (input, output) = paths();
        let options = VideoOptions {
            quality: VideoQuality::High,
            resolution: Resolution::Hd720,
            bitrate_kbps: None,
        };
        let args = video_args(&input, &output, TargetFormat::Webm, &options, None).unwrap();
        assert!(has_pair(&args, "-c:v", "libvpx-vp9"));
        assert!(has_pair(&args, "-crf", "18"));
        assert!(has_pair(&args, "-b:v", "0"));
        assert!(has_pair(&args, "-c:a", "libopus"));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].contains("min(1280,iw)"));
        assert!(args[vf + 1].contains("min(720,ih)"));
        assert!(!args.contains(&"-movflags".to_string()));
    }

    #[test]
    fn test_video_args_bitrate_overrides_quality() {
        let (input, output) = paths();
        let options = VideoOptions {
            bitrate_kbps: Some(2000),
            ..Default::default()
        };
        let args = video_args(&input, &output, TargetFormat::Avi, &options, None).unwrap();
        assert!(has_pair(&args, "-c:v", "mpeg4"));
        assert!(has_pair(&args, "-b:v", "2000k"));
        assert!(has_pair(&args, "-maxrate", "3000k"));
        assert!(!args.contains(&"-q:v".to_string()));
    }

    #[test]
    fn test_video_args_rejects_audio_target() {
        let (input, output) = paths();
        let err = video_args(&input, &output, TargetFormat::Mp3, &VideoOptions::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_audio_args() {
        let input = PathBuf::from("/tmp/in.wav");
        let output = PathBuf::from("/tmp/out.mp3");
        let options = ConversionOptions {
            sample_rate: Some(44_100),
            ..Default::default()
        };
        let args = audio_args(&input, &output, TargetFormat::Mp3, &options).unwrap();
        assert!(has_pair(&args, "-c:a", "libmp3lame"));
        assert!(has_pair(&args, "-b:a", "192k"));
        assert!(has_pair(&args, "-ar", "44100"));

        let args = audio_args(&input, &output, TargetFormat::Flac, &options).unwrap();
        assert!(!args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_decode_audio_args() {
        let args = decode_audio_args(Path::new("/tmp/a.mp3"), Path::new("/tmp/a.wav"));
        assert!(has_pair(&args, "-c:a", "pcm_s16le"));
        assert!(has_pair(&args, "-f", "wav"));
    }

    #[test]
    fn test_missing_binary_is_a_transcode_error() {
        let engine = TranscodeEngine::new("/nonexistent/ffmpeg-12345");
        let source = SourceFile::new("clip.mkv", "video/x-matroska", vec![0u8; 8]);
        let err = engine
            .transcode_video(&source, TargetFormat::Mp4, &VideoOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Transcode(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_successful_run_is_a_transcode_error() {
        // `true` exits 0 without writing the target file
        let Ok(stand_in) = which::which("true") else {
            return;
        };
        let engine = TranscodeEngine::new(stand_in);
        let source = SourceFile::new("clip.mkv", "video/x-matroska", vec![0u8; 8]);

        let err = engine
            .transcode_video(&source, TargetFormat::Mp4, &VideoOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Transcode(_)), "got {err:?}");

        let err = engine
            .transcode_audio(b"RIFF", TargetFormat::Mp3, &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Transcode(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_decode_is_a_decode_error() {
        let Ok(stand_in) = which::which("true") else {
            return;
        };
        let engine = TranscodeEngine::new(stand_in);
        let source = SourceFile::new("song.mp3", "audio/mpeg", vec![0u8; 8]);

        let err = engine.decode_audio_to_wav(&source).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = "a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(stderr_tail(stderr), "c | d | e | f | g");
    }
}
