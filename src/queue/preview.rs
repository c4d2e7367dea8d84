//! Revocable preview references.
//!
//! A [`PreviewRegistry`] hands out [`PreviewHandle`]s, each pointing at the
//! bytes used to render one item's thumbnail. Dropping the handle revokes it,
//! so a preview lives exactly as long as the queue item that owns it.

use bytes::Bytes;
use convertforge_common::PreviewId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

type Entries = RwLock<HashMap<PreviewId, Bytes>>;

/// Shared table of live previews.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Entries>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register preview bytes and return the owning handle.
    pub fn create(&self, bytes: impl Into<Bytes>) -> PreviewHandle {
        let id = PreviewId::new();
        self.entries.write().insert(id, bytes.into());
        PreviewHandle {
            id,
            registry: Arc::downgrade(&self.entries),
        }
    }

    /// Resolve a preview id, or `None` once it has been revoked.
    pub fn resolve(&self, id: PreviewId) -> Option<Bytes> {
        self.entries.read().get(&id).cloned()
    }

    pub fn is_live(&self, id: PreviewId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Number of previews not yet revoked.
    pub fn live_count(&self) -> usize {
        self.entries.read().len()
    }
}

/// Owning reference to one preview. Revoked on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: PreviewId,
    registry: Weak<Entries>,
}

impl PreviewHandle {
    pub fn id(&self) -> PreviewId {
        self.id
    }

    /// Preview bytes, while the registry is still alive.
    pub fn bytes(&self) -> Option<Bytes> {
        self.registry
            .upgrade()
            .and_then(|entries| entries.read().get(&self.id).cloned())
    }

    /// Opaque reference string for the preview.
    pub fn url(&self) -> String {
        self.id.to_string()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Some(entries) = self.registry.upgrade() {
            entries.write().remove(&self.id);
        }
    }
}
