//! Video conversion: engine transcode or container relabel.

use crate::{
    ConversionAdapter, ConversionOptions, ConvertedBlob, Error, PassthroughReason, Result,
    SourceFile, TranscodeEngine,
};
use convertforge_common::{normalize_mime, MediaKind, TargetFormat};

/// Adapter for video files.
///
/// With a [`TranscodeEngine`] every conversion is a genuine transcode.
/// Without one, the source bytes are returned under the target container's
/// MIME type and tagged [`PassthroughReason::Relabeled`].
#[derive(Debug, Clone, Default)]
pub struct VideoAdapter {
    engine: Option<TranscodeEngine>,
}

impl VideoAdapter {
    pub fn new() -> Self {
        Self { engine: None }
    }

    pub fn with_engine(engine: TranscodeEngine) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    pub fn engine(&self) -> Option<&TranscodeEngine> {
        self.engine.as_ref()
    }
}

impl ConversionAdapter for VideoAdapter {
    fn name(&self) -> &'static str {
        "video"
    }

    fn accepts(&self, target: TargetFormat) -> bool {
        target.kind() == MediaKind::Video
    }

    fn convert(
        &self,
        source: &SourceFile,
        target: TargetFormat,
        options: &ConversionOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<ConvertedBlob> {
        if !self.accepts(target) {
            return Err(Error::unsupported(format!(
                "video adapter cannot produce {}",
                target
            )));
        }

        let same_format = normalize_mime(source.mime()) == target.mime();
        let reencode = self.engine.is_some() && options.video.requires_reencode();

        if same_format && !reencode {
            return Ok(ConvertedBlob::passthrough(
                source.bytes().clone(),
                target,
                PassthroughReason::AlreadyTargetFormat,
            ));
        }

        let Some(engine) = &self.engine else {
            progress(50);
            return Ok(ConvertedBlob::passthrough(
                source.bytes().clone(),
                target,
                PassthroughReason::Relabeled,
            ));
        };

        progress(10);
        let encoded = engine.transcode_video(source, target, &options.video)?;
        progress(90);

        Ok(ConvertedBlob::real(encoded, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Resolution, VideoOptions};
    use crate::ConversionKind;
    use assert_matches::assert_matches;

    fn clip(mime: &str) -> SourceFile {
        SourceFile::new("clip.bin", mime, vec![0u8, 0, 0, 24, b'f', b't', b'y', b'p'])
    }

    fn convert(adapter: &VideoAdapter, source: &SourceFile, target: TargetFormat) -> Result<ConvertedBlob> {
        adapter.convert(source, target, &ConversionOptions::default(), &mut |_| {})
    }

    #[test]
    fn test_same_format_passthrough() {
        let source = clip("video/mp4");
        let blob = convert(&VideoAdapter::new(), &source, TargetFormat::Mp4).unwrap();
        assert_eq!(&blob.bytes, source.bytes());
        assert_eq!(
            blob.kind,
            ConversionKind::Passthrough(PassthroughReason::AlreadyTargetFormat)
        );
    }

    #[test]
    fn test_relabel_without_engine() {
        let source = clip("video/mp4");
        let blob = convert(&VideoAdapter::new(), &source, TargetFormat::Webm).unwrap();
        assert_eq!(&blob.bytes, source.bytes());
        assert_eq!(blob.mime(), "video/webm");
        assert_eq!(
            blob.kind,
            ConversionKind::Passthrough(PassthroughReason::Relabeled)
        );
    }

    #[test]
    fn test_engine_failure_propagates() {
        let adapter = VideoAdapter::with_engine(TranscodeEngine::new("/nonexistent/ffmpeg-12345"));
        let source = clip("video/quicktime");
        assert_matches!(
            convert(&adapter, &source, TargetFormat::Mp4),
            Err(Error::Transcode(_))
        );
    }

    #[test]
    fn test_same_format_with_engine_reencodes_when_scaling() {
        let adapter = VideoAdapter::with_engine(TranscodeEngine::new("/nonexistent/ffmpeg-12345"));
        let source = clip("video/mp4");
        let options = ConversionOptions {
            video: VideoOptions {
                resolution: Resolution::Sd480,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = adapter.convert(&source, TargetFormat::Mp4, &options, &mut |_| {});
        assert_matches!(result, Err(Error::Transcode(_)));

        // Without a scaling request the same container is passed through untouched
        let blob = convert(&adapter, &source, TargetFormat::Mp4).unwrap();
        assert!(!blob.kind.is_real());
    }

    #[test]
    fn test_rejects_image_target() {
        assert_matches!(
            convert(&VideoAdapter::new(), &clip("video/mp4"), TargetFormat::Png),
            Err(Error::Unsupported(_))
        );
    }
}
