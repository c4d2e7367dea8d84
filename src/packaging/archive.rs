//! Bundling converted outputs into a single archive.

use super::PackagingError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One file going into an archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveEntry<'a> {
    /// Path inside the archive, `/` separated.
    pub path: &'a str,
    pub bytes: &'a [u8],
}

/// Builds an in-memory archive from a list of entries.
pub trait Archiver: Send + Sync {
    /// File extension of produced archives, without the dot.
    fn extension(&self) -> &'static str;

    fn mime(&self) -> &'static str;

    fn archive(&self, entries: &[ArchiveEntry<'_>]) -> Result<Vec<u8>, PackagingError>;
}

/// Deflate-compressed ZIP archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl ZipArchiver {
    pub fn new() -> Self {
        Self
    }
}

impl Archiver for ZipArchiver {
    fn extension(&self) -> &'static str {
        "zip"
    }

    fn mime(&self) -> &'static str {
        "application/zip"
    }

    fn archive(&self, entries: &[ArchiveEntry<'_>]) -> Result<Vec<u8>, PackagingError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in entries {
            zip.start_file(entry.path, options).map_err(|e| {
                PackagingError::Archive(format!("zip start file failed ({}): {}", entry.path, e))
            })?;
            zip.write_all(entry.bytes).map_err(|e| {
                PackagingError::Archive(format!("zip write failed ({}): {}", entry.path, e))
            })?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| PackagingError::Archive(format!("zip finish failed: {}", e)))?;
        Ok(cursor.into_inner())
    }
}
