//! On-disk scratch space for engine-backed conversions.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A private directory holding one conversion's staged source and the file
/// the engine is expected to produce.
///
/// Dropping the workspace deletes the directory.
///
/// ```no_run
/// use convertforge_av::Workspace;
///
/// let scratch = Workspace::stage(b"RIFF....", "wav", "mp3")?;
/// // point ffmpeg at scratch.source() and scratch.target()
/// let encoded = scratch.finish()?;
/// # Ok::<(), convertforge_av::Error>(())
/// ```
pub struct Workspace {
    dir: TempDir,
    source: PathBuf,
    target: PathBuf,
}

impl Workspace {
    /// Write `bytes` to `source.<source_ext>` and reserve `target.<target_ext>`.
    pub fn stage(bytes: &[u8], source_ext: &str, target_ext: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("convertforge-")
            .tempdir()
            .map_err(|e| Error::Workspace(format!("cannot create scratch dir: {e}")))?;

        let source = dir.path().join(with_extension("source", source_ext));
        let target = dir.path().join(with_extension("target", target_ext));

        std::fs::write(&source, bytes)
            .map_err(|e| Error::Workspace(format!("cannot stage {}: {e}", source.display())))?;

        Ok(Self { dir, source, target })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Collect the engine's output and tear the directory down.
    ///
    /// A missing or zero-length target counts as a failed run.
    pub fn finish(self) -> Result<Vec<u8>> {
        let bytes = match std::fs::read(&self.target) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Workspace("engine produced no output".into()))
            }
            Err(e) => return Err(Error::Io(e)),
        };
        if bytes.is_empty() {
            return Err(Error::Workspace("engine produced an empty file".into()));
        }
        Ok(bytes)
    }
}

fn with_extension(stem: &str, ext: &str) -> String {
    match ext.trim_start_matches('.') {
        "" => stem.to_string(),
        ext => format!("{stem}.{ext}"),
    }
}
