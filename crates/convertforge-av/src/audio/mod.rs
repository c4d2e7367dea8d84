//! Audio conversion through the canonical WAV container.
//!
//! Every audio conversion decodes to PCM samples and re-encodes as 16-bit
//! WAV. Compressed targets are then produced by the transcoding engine when
//! one is configured; without it the WAV bytes are labeled with the target
//! MIME type and tagged as a passthrough.

mod resample;
mod wav;

pub use resample::resample_linear;
pub use wav::{decode_wav, encode_wav, is_wav, PcmAudio};

use crate::{
    ConversionAdapter, ConversionOptions, ConvertedBlob, Error, PassthroughReason, Result,
    SourceFile, TranscodeEngine,
};
use convertforge_common::{MediaKind, TargetFormat};

/// Adapter for audio files.
#[derive(Debug, Clone, Default)]
pub struct AudioAdapter {
    engine: Option<TranscodeEngine>,
}

impl AudioAdapter {
    /// Adapter without a transcoding engine: WAV sources only, compressed
    /// targets are relabeled.
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

    fn decode(&self, source: &SourceFile) -> Result<PcmAudio> {
        if is_wav(source.bytes()) {
            return decode_wav(source.bytes());
        }

        match &self.engine {
            Some(engine) => {
                let wav = engine.decode_audio_to_wav(source)?;
                decode_wav(&wav)
            }
            None => Err(Error::decode(format!(
                "{} ({}) needs the transcoding engine to decode",
                source.name(),
                source.mime()
            ))),
        }
    }
}

impl ConversionAdapter for AudioAdapter {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn accepts(&self, target: TargetFormat) -> bool {
        target.kind() == MediaKind::Audio
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
                "audio adapter cannot produce {}",
                target
            )));
        }

        let mut pcm = self.decode(source)?;
        progress(40);

        if let Some(rate) = options.sample_rate {
            pcm = resample_linear(&pcm, rate);
        }
        progress(60);

        let wav = encode_wav(&pcm)?;
        progress(80);

        if target.is_canonical_audio() {
            return Ok(ConvertedBlob::real(wav, target));
        }

        match &self.engine {
            Some(engine) => {
                let encoded = engine.transcode_audio(&wav, target, options)?;
                Ok(ConvertedBlob::real(encoded, target))
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    "No transcoding engine, labeling WAV output of {} as {}",
                    source.name(),
                    target
                );
                Ok(ConvertedBlob::passthrough(
                    wav,
                    target,
                    PassthroughReason::CanonicalRelabeled,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConversionKind;
    use assert_matches::assert_matches;

    fn wav_source(rate: u32, frames: usize) -> SourceFile {
        let pcm = PcmAudio {
            channels: 1,
            sample_rate: rate,
            samples: (0..frames).map(|i| (i as f32 * 0.1).sin() * 0.3).collect(),
        };
        SourceFile::new("tone.wav", "audio/wav", encode_wav(&pcm).unwrap())
    }

    fn convert(
        adapter: &AudioAdapter,
        source: &SourceFile,
        target: TargetFormat,
        options: &ConversionOptions,
    ) -> Result<ConvertedBlob> {
        adapter.convert(source, target, options, &mut |_| {})
    }

    #[test]
    fn test_wav_to_wav_is_real() {
        let source = wav_source(8_000, 800);
        let blob = convert(
            &AudioAdapter::new(),
            &source,
            TargetFormat::Wav,
            &ConversionOptions::default(),
        )
        .unwrap();
        assert_eq!(blob.kind, ConversionKind::Real);
        assert_eq!(blob.mime(), "audio/wav");
        assert_eq!(decode_wav(&blob.bytes).unwrap().frames(), 800);
    }

    #[test]
    fn test_compressed_target_without_engine_is_relabeled() {
        let source = wav_source(8_000, 100);
        let blob = convert(
            &AudioAdapter::new(),
            &source,
            TargetFormat::Mp3,
            &ConversionOptions::default(),
        )
        .unwrap();
        assert_eq!(
            blob.kind,
            ConversionKind::Passthrough(PassthroughReason::CanonicalRelabeled)
        );
        assert_eq!(blob.mime(), "audio/mpeg");
        assert!(is_wav(&blob.bytes));
    }

    #[test]
    fn test_sample_rate_option_resamples() {
        let source = wav_source(8_000, 800);
        let options = ConversionOptions {
            sample_rate: Some(16_000),
            ..Default::default()
        };
        let blob = convert(&AudioAdapter::new(), &source, TargetFormat::Wav, &options).unwrap();
        let pcm = decode_wav(&blob.bytes).unwrap();
        assert_eq!(pcm.sample_rate, 16_000);
        assert_eq!(pcm.frames(), 1_600);
    }

    #[test]
    fn test_non_wav_without_engine_is_decode_error() {
        let source = SourceFile::new("song.mp3", "audio/mpeg", b"ID3\x03fake".to_vec());
        assert_matches!(
            convert(
                &AudioAdapter::new(),
                &source,
                TargetFormat::Wav,
                &ConversionOptions::default()
            ),
            Err(Error::Decode(_))
        );
    }

    #[test]
    fn test_missing_engine_binary_surfaces_transcode_error() {
        let adapter = AudioAdapter::with_engine(TranscodeEngine::new("/nonexistent/ffmpeg-12345"));
        let source = wav_source(8_000, 100);
        assert_matches!(
            convert(&adapter, &source, TargetFormat::Ogg, &ConversionOptions::default()),
            Err(Error::Transcode(_))
        );
    }

    #[test]
    fn test_progress_sequence() {
        let source = wav_source(8_000, 10);
        let mut seen = Vec::new();
        AudioAdapter::new()
            .convert(
                &source,
                TargetFormat::Flac,
                &ConversionOptions::default(),
                &mut |p| seen.push(p),
            )
            .unwrap();
        assert_eq!(seen, vec![40, 60, 80]);
    }

    #[test]
    fn test_rejects_video_target() {
        let source = wav_source(8_000, 10);
        assert_matches!(
            convert(
                &AudioAdapter::new(),
                &source,
                TargetFormat::Mp4,
                &ConversionOptions::default()
            ),
            Err(Error::Unsupported(_))
        );
    }
}
