//! Conversion and download counters.
//!
//! Counts are always kept locally in the shared [`KeyValueStore`]. When a
//! remote stats service is configured, increments are mirrored to it and its
//! totals are returned instead; any remote failure falls back to the local
//! numbers.

mod remote;

pub use remote::{RemoteSyncError, StatsClient};

use crate::config::UsageConfig;
use crate::persistence::{KeyValueStore, PersistenceError};
use convertforge_common::MediaKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Store key holding the local counters.
pub const USAGE_KEY: &str = "usage-stats";

/// A counter the tracker maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageCounter {
    Image,
    Audio,
    Video,
    Download,
}

impl From<MediaKind> for UsageCounter {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => UsageCounter::Image,
            MediaKind::Audio => UsageCounter::Audio,
            MediaKind::Video => UsageCounter::Video,
        }
    }
}

/// Where a [`UsageStats`] value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatsSource {
    #[default]
    Local,
    Remote,
}

/// Counter totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub images: u64,
    #[serde(default)]
    pub audio: u64,
    #[serde(default)]
    pub video: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(skip)]
    pub source: StatsSource,
}

impl UsageStats {
    pub fn get(&self, counter: UsageCounter) -> u64 {
        match counter {
            UsageCounter::Image => self.images,
            UsageCounter::Audio => self.audio,
            UsageCounter::Video => self.video,
            UsageCounter::Download => self.downloads,
        }
    }

    fn add(&mut self, counter: UsageCounter, count: u64) {
        let slot = match counter {
            UsageCounter::Image => &mut self.images,
            UsageCounter::Audio => &mut self.audio,
            UsageCounter::Video => &mut self.video,
            UsageCounter::Download => &mut self.downloads,
        };
        *slot = slot.saturating_add(count);
    }

    /// Conversions across all media kinds.
    pub fn conversions(&self) -> u64 {
        self.images
            .saturating_add(self.audio)
            .saturating_add(self.video)
    }

    pub fn is_remote(&self) -> bool {
        self.source == StatsSource::Remote
    }
}

/// Optional remote mirror for the counters.
#[derive(Debug, Clone)]
pub enum RemoteStats {
    Unavailable,
    Http(StatsClient),
}

impl RemoteStats {
    pub fn from_config(config: &UsageConfig) -> Self {
        match (config.remote_enabled, &config.remote_url) {
            (true, Some(url)) => RemoteStats::Http(StatsClient::new(url, config.api_key.clone())),
            _ => RemoteStats::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RemoteStats::Http(_))
    }
}

/// Records usage locally and, when possible, remotely.
pub struct UsageTracker {
    store: Arc<dyn KeyValueStore>,
    remote: RemoteStats,
    lock: Mutex<()>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, remote: RemoteStats) -> Self {
        Self {
            store,
            remote,
            lock: Mutex::new(()),
        }
    }

    pub fn remote(&self) -> &RemoteStats {
        &self.remote
    }

    /// Local totals. Unreadable counters read as zero.
    pub fn local_stats(&self) -> UsageStats {
        match self.read_local() {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Failed to read usage stats, using zero counts: {}", e);
                UsageStats::default()
            }
        }
    }

    /// Count `count` conversions of `kind`.
    pub async fn record(&self, kind: MediaKind, count: u64) -> UsageStats {
        self.record_counter(kind.into(), count).await
    }

    /// Count `count` triggered downloads.
    pub async fn record_downloads(&self, count: u64) -> UsageStats {
        self.record_counter(UsageCounter::Download, count).await
    }

    /// Remote totals when reachable, else local.
    pub async fn stats(&self) -> UsageStats {
        if let RemoteStats::Http(client) = &self.remote {
            match client.fetch().await {
                Ok(stats) => return stats,
                Err(e) => tracing::warn!("Failed to fetch remote usage stats: {}", e),
            }
        }
        self.local_stats()
    }

    async fn record_counter(&self, counter: UsageCounter, count: u64) -> UsageStats {
        let local = self.bump_local(counter, count);
        tracing::debug!("Recorded {} {:?} (local total {})", count, counter, local.get(counter));

        match &self.remote {
            RemoteStats::Http(client) => match client.increment(counter, count).await {
                Ok(remote) => remote,
                Err(e) => {
                    tracing::warn!("Failed to sync usage to {}: {}", client.base_url(), e);
                    local
                }
            },
            RemoteStats::Unavailable => local,
        }
    }

    fn bump_local(&self, counter: UsageCounter, count: u64) -> UsageStats {
        let _guard = self.lock.lock();

        let mut stats = self.local_stats();
        stats.add(counter, count);

        let saved = serde_json::to_vec(&stats)
            .map_err(PersistenceError::from)
            .and_then(|json| self.store.set(USAGE_KEY, &json));
        if let Err(e) = saved {
            tracing::warn!("Failed to save usage stats: {}", e);
        }
        stats
    }

    fn read_local(&self) -> Result<UsageStats, PersistenceError> {
        match self.store.get(USAGE_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(UsageStats::default()),
        }
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("remote", &self.remote.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn tracker() -> UsageTracker {
        UsageTracker::new(Arc::new(MemoryStore::new()), RemoteStats::Unavailable)
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let tracker = tracker();
        tracker.record(MediaKind::Image, 3).await;
        let stats = tracker.record(MediaKind::Image, 2).await;
        assert_eq!(stats.images, 5);
        assert_eq!(stats.source, StatsSource::Local);

        let stats = tracker.record_downloads(1).await;
        assert_eq!(stats.downloads, 1);
        assert_eq!(stats.conversions(), 5);
        assert_eq!(tracker.stats().await, stats);
    }

    #[tokio::test]
    async fn test_corrupt_local_counts_restart_at_zero() {
        let store = Arc::new(MemoryStore::new());
        store.set(USAGE_KEY, b"garbage").unwrap();
        let tracker = UsageTracker::new(store, RemoteStats::Unavailable);

        assert_eq!(tracker.local_stats(), UsageStats::default());
        assert_eq!(tracker.record(MediaKind::Audio, 1).await.audio, 1);
    }

    #[test]
    fn test_stats_serialization() {
        let mut stats = UsageStats::default();
        stats.add(UsageCounter::Video, 2);
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"images": 0, "audio": 0, "video": 2, "downloads": 0})
        );
        assert_eq!(serde_json::to_value(UsageCounter::Download).unwrap(), "download");
    }

    #[test]
    fn test_remote_from_config() {
        let mut config = UsageConfig::default();
        assert!(!RemoteStats::from_config(&config).is_available());

        config.remote_enabled = true;
        assert!(!RemoteStats::from_config(&config).is_available());

        config.remote_url = Some("http://stats.local".to_string());
        assert!(RemoteStats::from_config(&config).is_available());
    }
}
