//! Locating the external binaries the transcoding engine drives.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Binaries the engine can use. Only ffmpeg is required; ffprobe is reported
/// for completeness.
pub const ENGINE_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Result of probing one binary.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

impl ToolInfo {
    /// Run `<binary> -version` and record what came back.
    pub fn probe(name: &str, configured: Option<&Path>) -> Self {
        let Ok(path) = locate(name, configured) else {
            return Self::missing(name);
        };

        match Command::new(&path).arg("-version").output() {
            Ok(out) if out.status.success() => Self {
                name: name.to_string(),
                available: true,
                version: String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .next()
                    .map(str::to_string),
                path: Some(path),
            },
            _ => Self::missing(name),
        }
    }

    fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        }
    }
}

/// Probe a single binary found on PATH.
pub fn check_tool(name: &str) -> ToolInfo {
    ToolInfo::probe(name, None)
}

/// Probe every engine binary. `ffmpeg` honours a configured location; its
/// siblings are looked up next to it before falling back to PATH.
pub fn check_tools(ffmpeg: Option<&Path>) -> Vec<ToolInfo> {
    ENGINE_TOOLS
        .iter()
        .map(|name| {
            let configured = match (ffmpeg, *name) {
                (Some(path), "ffmpeg") => Some(path.to_path_buf()),
                (Some(path), other) => path.parent().map(|dir| dir.join(other)),
                (None, _) => None,
            };
            ToolInfo::probe(name, configured.as_deref())
        })
        .collect()
}

/// Resolve `name` to an executable path.
///
/// An existing `configured` path wins; otherwise PATH is searched.
pub fn locate(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        _ => which::which(name).map_err(|_| Error::tool_not_found(name)),
    }
}
