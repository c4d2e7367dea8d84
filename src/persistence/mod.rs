//! Mirroring queue state into durable storage.
//!
//! The bridge owns nothing: after every queue mutation it serializes a
//! [`QueueSnapshot`] into a [`KeyValueStore`], and on startup the queue can be
//! rebuilt from the last snapshot. Failures are reported to the caller, which
//! logs them and keeps working in memory.

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use crate::queue::{ItemState, ItemStatus, QueueItem};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use convertforge_av::{ConversionKind, ConvertedBlob, SourceFile};
use convertforge_common::{ItemId, TargetFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Store key holding the queue snapshot.
pub const SNAPSHOT_KEY: &str = "queue-snapshot";

/// Current snapshot layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Serializable image of a whole queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub items: Vec<SnapshotRecord>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl QueueSnapshot {
    pub fn new(items: Vec<SnapshotRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One queue item, with every payload base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub id: ItemId,
    pub file_name: String,
    pub file_size: u64,
    pub file_mime_type: String,
    pub file_bytes_base64: String,
    pub preview_bytes_base64: String,
    pub progress: u8,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_bytes_base64: Option<String>,
    pub target_format: TargetFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_kind: Option<ConversionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// A record decoded back into queue parts.
#[derive(Debug)]
pub struct RestoredItem {
    pub id: ItemId,
    pub source: SourceFile,
    pub preview: Bytes,
    pub target: TargetFormat,
    pub state: ItemState,
}

impl SnapshotRecord {
    pub fn from_item(item: &QueueItem) -> Self {
        let source = item.source();
        let output = item.output();

        Self {
            id: item.id(),
            file_name: source.name().to_string(),
            file_size: source.len() as u64,
            file_mime_type: source.mime().to_string(),
            file_bytes_base64: BASE64.encode(source.bytes()),
            preview_bytes_base64: item
                .preview()
                .bytes()
                .map(|b| BASE64.encode(b))
                .unwrap_or_default(),
            progress: item.progress(),
            status: item.status(),
            output_bytes_base64: output.map(|o| BASE64.encode(&o.bytes)),
            target_format: item.target(),
            output_mime_type: output.map(|o| o.mime().to_string()),
            conversion_kind: output.map(|o| o.kind),
            error_detail: item.error().map(str::to_string),
        }
    }

    /// Decode payloads and rebuild the item state.
    ///
    /// Items caught mid-conversion come back as pending; so do completed
    /// records whose output or conversion kind is missing.
    pub fn restore(self) -> Result<RestoredItem, PersistenceError> {
        let file_bytes = decode_field(&self.file_bytes_base64, "fileBytesBase64", self.id)?;
        let preview = if self.preview_bytes_base64.is_empty() {
            Bytes::from(file_bytes.clone())
        } else {
            Bytes::from(decode_field(
                &self.preview_bytes_base64,
                "previewBytesBase64",
                self.id,
            )?)
        };

        let state = match self.status {
            ItemStatus::Pending | ItemStatus::Converting => ItemState::Pending,
            ItemStatus::Completed => match (&self.output_bytes_base64, self.conversion_kind) {
                (Some(encoded), Some(kind)) => {
                    let bytes = decode_field(encoded, "outputBytesBase64", self.id)?;
                    ItemState::Completed {
                        output: ConvertedBlob {
                            bytes: bytes.into(),
                            format: self.target_format,
                            kind,
                        },
                    }
                }
                (None, _) => {
                    tracing::warn!("Snapshot item {} is completed without output", self.id);
                    ItemState::Pending
                }
                (Some(_), None) => {
                    tracing::warn!(
                        "Snapshot item {} has output of unknown conversion kind, converting again",
                        self.id
                    );
                    ItemState::Pending
                }
            },
            ItemStatus::Error => ItemState::Error {
                detail: self
                    .error_detail
                    .unwrap_or_else(|| "conversion failed".to_string()),
                progress: self.progress.min(100),
            },
        };

        Ok(RestoredItem {
            id: self.id,
            source: SourceFile::new(self.file_name, self.file_mime_type, file_bytes),
            preview,
            target: self.target_format,
            state,
        })
    }
}

fn decode_field(encoded: &str, field: &str, id: ItemId) -> Result<Vec<u8>, PersistenceError> {
    BASE64
        .decode(encoded)
        .map_err(|e| PersistenceError::Corrupt(format!("{field} of item {id}: {e}")))
}

/// Saves and loads queue snapshots through a [`KeyValueStore`].
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: SNAPSHOT_KEY.to_string(),
        }
    }

    /// Use a different store key, e.g. to keep several sessions apart.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn save(&self, snapshot: &QueueSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec(snapshot)?;
        self.store.set(&self.key, &json)
    }

    /// The last saved snapshot, or `None` if nothing was saved.
    pub fn load(&self) -> Result<Option<QueueSnapshot>, PersistenceError> {
        match self.store.get(&self.key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.store.remove(&self.key)
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("key", &self.key)
            .finish()
    }
}
