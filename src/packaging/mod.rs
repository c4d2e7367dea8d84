//! Handing converted outputs to the user.
//!
//! Outputs are bundled into one archive download when possible. If archiving
//! is disabled or fails, every output is downloaded on its own, one after the
//! other, with a short pause in between.

mod archive;
mod download;

pub use archive::{ArchiveEntry, Archiver, ZipArchiver};
pub use download::{DownloadMethod, DownloadTrigger, Downloader};

use crate::config::PackagingConfig;
use convertforge_av::ConvertedBlob;
use convertforge_common::paths::{numbered_variant, sanitize_filename};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default pause between individual downloads.
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_millis(300);

const FOLDER_PREFIX: &str = "converted";

/// Errors from [`PackagingService::package`].
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("nothing to package")]
    Empty,

    #[error("archive failed: {0}")]
    Archive(String),
}

/// One file handed to the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: String,
    /// Where the downloader put it; `None` if it could not.
    pub path: Option<PathBuf>,
}

/// How a batch of outputs was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// A single archive download.
    Archive { delivery: Delivery, entries: usize },
    /// One download per output, used when no archive could be produced.
    Individual {
        downloads: Vec<Delivery>,
        /// Why archiving was skipped; `None` when no archiver is configured.
        archive_error: Option<String>,
    },
}

impl PackageOutcome {
    /// Number of downloads triggered.
    pub fn download_count(&self) -> usize {
        match self {
            PackageOutcome::Archive { .. } => 1,
            PackageOutcome::Individual { downloads, .. } => downloads.len(),
        }
    }
}

/// Bundles converted outputs and triggers their download.
pub struct PackagingService {
    archiver: Option<Arc<dyn Archiver>>,
    downloader: Arc<dyn Downloader>,
    delay: Duration,
    timestamped_folder: bool,
}

impl PackagingService {
    /// ZIP archives into a timestamped folder, with the default delay.
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self {
            archiver: Some(Arc::new(ZipArchiver::new())),
            downloader,
            delay: DEFAULT_DOWNLOAD_DELAY,
            timestamped_folder: true,
        }
    }

    /// Build from config, saving downloads under `output_dir`.
    pub fn from_config(config: &PackagingConfig) -> Self {
        let dir = shellexpand::tilde(&config.output_dir.to_string_lossy()).to_string();
        let service = Self::new(Arc::new(DownloadTrigger::probe(dir)))
            .with_delay(Duration::from_millis(config.download_delay_ms))
            .with_timestamped_folder(config.timestamped_folder);

        if config.archive {
            service
        } else {
            service.without_archiver()
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// Always download outputs individually.
    pub fn without_archiver(mut self) -> Self {
        self.archiver = None;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timestamped_folder(mut self, enabled: bool) -> Self {
        self.timestamped_folder = enabled;
        self
    }

    /// Deliver `items` as `(file name, output)` pairs.
    pub fn package(
        &self,
        items: &[(String, ConvertedBlob)],
    ) -> Result<PackageOutcome, PackagingError> {
        if items.is_empty() {
            return Err(PackagingError::Empty);
        }

        let names = unique_names(items.iter().map(|(name, _)| name.as_str()));

        let archive_error = match &self.archiver {
            Some(archiver) => match self.archive(archiver.as_ref(), items, &names) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    tracing::warn!("Archive failed, downloading files individually: {}", e);
                    Some(e.to_string())
                }
            },
            None => None,
        };

        let mut downloads = Vec::with_capacity(items.len());
        for (index, ((_, blob), name)) in items.iter().zip(&names).enumerate() {
            if index > 0 && !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            downloads.push(self.deliver(&blob.bytes, name, blob.mime()));
        }

        Ok(PackageOutcome::Individual {
            downloads,
            archive_error,
        })
    }

    /// Download a single output.
    pub fn download_one(&self, name: &str, blob: &ConvertedBlob) -> Delivery {
        self.deliver(&blob.bytes, &sanitize_filename(name), blob.mime())
    }

    fn archive(
        &self,
        archiver: &dyn Archiver,
        items: &[(String, ConvertedBlob)],
        names: &[String],
    ) -> Result<PackageOutcome, PackagingError> {
        let folder = if self.timestamped_folder {
            Some(format!(
                "{}-{}",
                FOLDER_PREFIX,
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            ))
        } else {
            None
        };

        let paths: Vec<String> = names
            .iter()
            .map(|name| match &folder {
                Some(folder) => format!("{}/{}", folder, name),
                None => name.clone(),
            })
            .collect();
        let entries: Vec<ArchiveEntry<'_>> = items
            .iter()
            .zip(&paths)
            .map(|((_, blob), path)| ArchiveEntry {
                path,
                bytes: &blob.bytes,
            })
            .collect();

        let bytes = archiver.archive(&entries)?;
        let file_name = format!(
            "{}.{}",
            folder.as_deref().unwrap_or(FOLDER_PREFIX),
            archiver.extension()
        );

        tracing::info!(
            "Packaged {} files into {} ({} bytes)",
            entries.len(),
            file_name,
            bytes.len()
        );
        Ok(PackageOutcome::Archive {
            delivery: self.deliver(&bytes, &file_name, archiver.mime()),
            entries: entries.len(),
        })
    }

    fn deliver(&self, bytes: &[u8], file_name: &str, mime: &str) -> Delivery {
        Delivery {
            file_name: file_name.to_string(),
            path: self.downloader.trigger(bytes, file_name, mime),
        }
    }
}

impl std::fmt::Debug for PackagingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagingService")
            .field("archive", &self.archiver.is_some())
            .field("delay", &self.delay)
            .field("timestamped_folder", &self.timestamped_folder)
            .finish()
    }
}

/// Sanitize names and number repeats: `a.png`, `a (1).png`, ...
fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .map(|name| {
            let name = sanitize_filename(name);
            let mut n = 0;
            loop {
                let candidate = numbered_variant(&name, n);
                if seen.insert(candidate.to_lowercase()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}
