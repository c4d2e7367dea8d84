//! Loading source files from disk.

use anyhow::{Context, Result};
use convertforge_av::SourceFile;
use convertforge_common::normalize_mime;
use std::path::Path;

/// Read a file into a [`SourceFile`], guessing its MIME type from the extension.
pub fn load_source(path: &Path) -> Result<SourceFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());

    Ok(SourceFile::new(name, guess_mime(path), bytes))
}

/// MIME type for a path, `application/octet-stream` when unknown.
pub fn guess_mime(path: &Path) -> String {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    normalize_mime(guessed.essence_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(&PathBuf::from("a.png")), "image/png");
        assert_eq!(guess_mime(&PathBuf::from("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(&PathBuf::from("song.wav")), "audio/wav");
        assert_eq!(guess_mime(&PathBuf::from("noext")), "application/octet-stream");
    }

    #[test]
    fn test_load_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        let source = load_source(&path).unwrap();
        assert_eq!(source.name(), "clip.mp4");
        assert_eq!(source.mime(), "video/mp4");
        assert_eq!(source.len(), 4);

        assert!(load_source(&dir.path().join("missing.png")).is_err());
    }
}
