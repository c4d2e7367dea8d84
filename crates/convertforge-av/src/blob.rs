//! Input and output payloads of a conversion.

use bytes::Bytes;
use convertforge_common::{MediaKind, TargetFormat};
use serde::{Deserialize, Serialize};

/// An immutable source file: name, declared MIME type and bytes.
///
/// Cloning is cheap; the bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    mime: String,
    bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type as declared by whoever submitted the file.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Media kind implied by the declared MIME type.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime)
    }
}

/// Why an output is not a genuine transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughReason {
    /// The source was already in the target format; bytes are untouched.
    AlreadyTargetFormat,
    /// Source bytes relabeled with the target MIME type.
    Relabeled,
    /// Audio decoded and re-encoded as WAV, then labeled with the target MIME type.
    CanonicalRelabeled,
}

/// Whether a conversion actually produced the target encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    /// The output is genuinely encoded in the target format.
    Real,
    /// The output bytes are not (re)encoded in the target format.
    Passthrough(PassthroughReason),
}

impl ConversionKind {
    pub fn is_real(&self) -> bool {
        matches!(self, Self::Real)
    }
}

/// The result of converting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedBlob {
    pub bytes: Bytes,
    pub format: TargetFormat,
    pub kind: ConversionKind,
}

impl ConvertedBlob {
    pub fn real(bytes: impl Into<Bytes>, format: TargetFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            kind: ConversionKind::Real,
        }
    }

    pub fn passthrough(
        bytes: impl Into<Bytes>,
        format: TargetFormat,
        reason: PassthroughReason,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            kind: ConversionKind::Passthrough(reason),
        }
    }

    /// MIME type the output is labeled with.
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_mime() {
        let file = SourceFile::new("a.png", "image/png", vec![1, 2, 3]);
        assert_eq!(file.kind(), Some(MediaKind::Image));
        assert_eq!(file.len(), 3);

        let file = SourceFile::new("a.txt", "text/plain", Vec::new());
        assert_eq!(file.kind(), None);
        assert!(file.is_empty());
    }

    #[test]
    fn test_blob_labels() {
        let blob = ConvertedBlob::passthrough(
            vec![0u8; 4],
            TargetFormat::Mp3,
            PassthroughReason::CanonicalRelabeled,
        );
        assert_eq!(blob.mime(), "audio/mpeg");
        assert_eq!(blob.extension(), "mp3");
        assert!(!blob.kind.is_real());
    }

    #[test]
    fn test_conversion_kind_serialization() {
        let json = serde_json::to_string(&ConversionKind::Real).unwrap();
        assert_eq!(json, "\"real\"");
        let json =
            serde_json::to_string(&ConversionKind::Passthrough(PassthroughReason::Relabeled))
                .unwrap();
        assert_eq!(json, r#"{"passthrough":"relabeled"}"#);
    }
}
