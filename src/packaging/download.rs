//! Delivering bytes to the user as a named file.

use convertforge_common::paths::{numbered_variant, sanitize_filename};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Give up on finding a free `name (n).ext` after this many attempts.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// A way of handing a finished file to the user.
///
/// Triggering never fails from the caller's point of view: problems are
/// logged and reported as `None`.
pub trait Downloader: Send + Sync {
    /// Deliver `bytes` as `filename`. Returns where the file landed, if
    /// anywhere.
    fn trigger(&self, bytes: &[u8], filename: &str, mime: &str) -> Option<PathBuf>;
}

/// How [`DownloadTrigger`] writes files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMethod {
    /// Write a temporary file beside the target, then atomically persist it.
    Staged,
    /// Create the target file and write into it.
    Direct,
}

/// Saves downloads into a directory, never overwriting existing files.
#[derive(Debug, Clone)]
pub struct DownloadTrigger {
    dir: PathBuf,
    method: DownloadMethod,
}

impl DownloadTrigger {
    /// Pick the best method `dir` supports. The choice is made once.
    pub fn probe(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Failed to create download directory {:?}: {}", dir, e);
        }

        let method = match NamedTempFile::new_in(&dir) {
            Ok(_) => DownloadMethod::Staged,
            Err(e) => {
                tracing::debug!("Staged downloads unavailable in {:?}: {}", dir, e);
                DownloadMethod::Direct
            }
        };

        tracing::debug!("Downloads go to {:?} ({:?})", dir, method);
        Self { dir, method }
    }

    pub fn with_method(dir: impl Into<PathBuf>, method: DownloadMethod) -> Self {
        Self {
            dir: dir.into(),
            method,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn method(&self) -> DownloadMethod {
        self.method
    }

    fn save(&self, bytes: &[u8], filename: &str) -> io::Result<PathBuf> {
        let name = sanitize_filename(filename);
        match self.method {
            DownloadMethod::Staged => self.save_staged(bytes, &name),
            DownloadMethod::Direct => self.save_direct(bytes, &name),
        }
    }

    fn save_staged(&self, bytes: &[u8], name: &str) -> io::Result<PathBuf> {
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;

        for n in 0..MAX_NAME_ATTEMPTS {
            let candidate = self.dir.join(numbered_variant(name, n));
            match staged.persist_noclobber(&candidate) {
                Ok(_) => return Ok(candidate),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => staged = e.file,
                Err(e) => return Err(e.error),
            }
        }
        Err(name_exhausted(name))
    }

    fn save_direct(&self, bytes: &[u8], name: &str) -> io::Result<PathBuf> {
        for n in 0..MAX_NAME_ATTEMPTS {
            let candidate = self.dir.join(numbered_variant(name, n));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => {
                    fill_or_remove(&candidate, file, bytes)?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(name_exhausted(name))
    }
}

impl Downloader for DownloadTrigger {
    fn trigger(&self, bytes: &[u8], filename: &str, mime: &str) -> Option<PathBuf> {
        match self.save(bytes, filename) {
            Ok(path) => {
                tracing::info!("Saved {} ({} bytes, {})", path.display(), bytes.len(), mime);
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to save download {}: {}", filename, e);
                None
            }
        }
    }
}

fn name_exhausted(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {}", name),
    )
}

/// Write `bytes` into a freshly created `path`, deleting it again if the
/// write fails so no partial file is left under the user's name.
fn fill_or_remove(path: &Path, mut out: impl Write, bytes: &[u8]) -> io::Result<()> {
    let written = out.write_all(bytes).and_then(|()| out.flush());
    drop(out);
    if let Err(e) = written {
        if let Err(remove) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove partial download {:?}: {}", path, remove);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_probe_prefers_staged() {
        let dir = tempdir().unwrap();
        let trigger = DownloadTrigger::probe(dir.path().join("downloads"));
        assert_eq!(trigger.method(), DownloadMethod::Staged);
        assert!(trigger.dir().exists());
    }

    #[test]
    fn test_never_overwrites() {
        for method in [DownloadMethod::Staged, DownloadMethod::Direct] {
            let dir = tempdir().unwrap();
            let trigger = DownloadTrigger::with_method(dir.path(), method);

            let first = trigger.trigger(b"one", "photo.png", "image/png").unwrap();
            let second = trigger.trigger(b"two", "photo.png", "image/png").unwrap();
            let third = trigger.trigger(b"three", "photo.png", "image/png").unwrap();

            assert_eq!(first, dir.path().join("photo.png"));
            assert_eq!(second, dir.path().join("photo (1).png"));
            assert_eq!(third, dir.path().join("photo (2).png"));
            assert_eq!(std::fs::read(&first).unwrap(), b"one");
            assert_eq!(std::fs::read(&third).unwrap(), b"three");
        }
    }

    #[test]
    fn test_sanitizes_name() {
        let dir = tempdir().unwrap();
        let trigger = DownloadTrigger::with_method(dir.path(), DownloadMethod::Direct);
        let path = trigger.trigger(b"x", "a/b:c.txt", "text/plain").unwrap();
        assert_eq!(path, dir.path().join("a_b_c.txt"));
    }

    /// Accepts a few bytes, then reports a full disk.
    struct FullDisk(usize);

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.0);
            self.0 -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"").unwrap();

        let err = fill_or_remove(&path, FullDisk(2), b"truncated").unwrap_err();
        assert!(err.to_string().contains("no space"));
        assert!(!path.exists());

        let path = dir.path().join("ok.png");
        let file = std::fs::File::create(&path).unwrap();
        fill_or_remove(&path, file, b"complete").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"complete");
    }

    #[test]
    fn test_failure_returns_none() {
        let dir = tempdir().unwrap();
        let trigger =
            DownloadTrigger::with_method(dir.path().join("missing"), DownloadMethod::Direct);
        assert!(trigger.trigger(b"x", "a.txt", "text/plain").is_none());
    }
}
