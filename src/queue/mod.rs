//! The batch conversion queue.
//!
//! Items move `pending -> converting -> completed | error`. A failed item
//! never affects its siblings, and re-running the queue only touches items
//! that are still pending.

mod adapters;
mod events;
pub mod input;
mod item;
mod preview;

pub use adapters::AdapterSet;
pub use events::QueueEvent;
pub use item::{ItemState, ItemStatus, QueueItem};
pub use preview::{PreviewHandle, PreviewRegistry};

use crate::persistence::{PersistenceBridge, QueueSnapshot, SnapshotRecord};
use convertforge_av::{images, ConversionOptions, ConvertedBlob, Error, SourceFile};
use convertforge_common::{ItemId, MediaKind, TargetFormat};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Outcome counts of one run over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items that were pending and got converted or failed.
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items left alone because they were already completed or errored.
    pub skipped: usize,
}

/// Ordered collection of conversion items with aggregate progress.
pub struct BatchQueue {
    items: Vec<QueueItem>,
    adapters: Arc<AdapterSet>,
    options: ConversionOptions,
    previews: PreviewRegistry,
    persistence: Option<PersistenceBridge>,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl BatchQueue {
    pub fn new(adapters: AdapterSet) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: Vec::new(),
            adapters: Arc::new(adapters),
            options: ConversionOptions::default(),
            previews: PreviewRegistry::new(),
            persistence: None,
            event_tx,
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    /// Mirror every mutation into `bridge`.
    pub fn with_persistence(mut self, bridge: PersistenceBridge) -> Self {
        self.persistence = Some(bridge);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<QueueEvent> {
        self.event_tx.clone()
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rounded mean of item progress; 0 for an empty queue.
    pub fn overall_progress(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }
        let total: u32 = self.items.iter().map(|i| i.progress() as u32).sum();
        (total as f64 / self.items.len() as f64).round() as u8
    }

    /// Count of items per status, in status order.
    pub fn status_counts(&self) -> [(ItemStatus, usize); 4] {
        let count = |status| self.items.iter().filter(|i| i.status() == status).count();
        [
            (ItemStatus::Pending, count(ItemStatus::Pending)),
            (ItemStatus::Converting, count(ItemStatus::Converting)),
            (ItemStatus::Completed, count(ItemStatus::Completed)),
            (ItemStatus::Error, count(ItemStatus::Error)),
        ]
    }

    /// Append one pending item per file, each with a fresh preview.
    pub fn add(&mut self, files: Vec<SourceFile>, target: TargetFormat) -> Vec<ItemId> {
        let mut ids = Vec::with_capacity(files.len());

        for source in files {
            let preview = self.previews.create(preview_bytes(&source));
            let item = QueueItem::new(source, preview, target);
            let id = item.id();

            tracing::debug!("Queued {} ({}) -> {}", item.source().name(), id, target);
            self.broadcast(QueueEvent::ItemAdded {
                id,
                file_name: item.source().name().to_string(),
                target,
            });

            self.items.push(item);
            ids.push(id);
        }

        self.persist();
        ids
    }

    /// Remove an item and revoke its preview. Absent ids are a no-op.
    pub fn remove(&mut self, id: ItemId) -> bool {
        let Some(index) = self.items.iter().position(|i| i.id() == id) else {
            return false;
        };

        self.items.remove(index);
        self.broadcast(QueueEvent::ItemRemoved { id });
        self.persist();
        true
    }

    /// Discard every item and revoke every preview.
    pub fn reset(&mut self) {
        let removed = self.items.len();
        self.items.clear();
        self.broadcast(QueueEvent::QueueReset { removed });

        if let Some(bridge) = &self.persistence {
            if let Err(e) = bridge.clear() {
                tracing::warn!("Failed to clear persisted queue: {}", e);
            }
        }
    }

    /// Reset, then add `files`.
    pub fn replace(&mut self, files: Vec<SourceFile>, target: TargetFormat) -> Vec<ItemId> {
        self.reset();
        self.add(files, target)
    }

    /// Send an errored item back to pending so the next run retries it.
    pub fn retry(&mut self, id: ItemId) -> bool {
        let retried = self
            .items
            .iter_mut()
            .find(|i| i.id() == id)
            .map(|i| i.reset_error())
            .unwrap_or(false);

        if retried {
            self.persist();
        }
        retried
    }

    /// Convert every pending item, one at a time, in queue order.
    pub fn run_all(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();

        for index in 0..self.items.len() {
            if !self.items[index].is_pending() {
                summary.skipped += 1;
                continue;
            }

            summary.attempted += 1;
            if self.convert_at(index) {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }

        tracing::info!(
            "Batch run finished: {} completed, {} failed, {} skipped",
            summary.completed,
            summary.failed,
            summary.skipped
        );
        summary
    }

    /// Convert pending items on a pool of `workers` threads.
    ///
    /// Results are applied in queue order. Falls back to [`run_all`](Self::run_all)
    /// for a single worker or when the pool cannot be built.
    pub fn run_all_concurrent(&mut self, workers: usize) -> RunSummary {
        if workers <= 1 {
            return self.run_all();
        }

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!("Failed to build worker pool, converting sequentially: {}", e);
                return self.run_all();
            }
        };

        let mut summary = RunSummary::default();
        let mut jobs = Vec::new();
        for (index, item) in self.items.iter_mut().enumerate() {
            if !item.is_pending() {
                summary.skipped += 1;
                continue;
            }
            item.start();
            jobs.push((index, item.id(), item.source().clone(), item.target()));
        }
        for (_, id, _, target) in &jobs {
            self.broadcast(QueueEvent::ItemStarted {
                id: *id,
                target: *target,
            });
        }
        self.persist();

        let adapters = Arc::clone(&self.adapters);
        let options = &self.options;
        let event_tx = &self.event_tx;

        let results: Vec<(usize, u8, Result<ConvertedBlob, Error>)> = pool.install(|| {
            jobs.par_iter()
                .map(|(index, id, source, target)| {
                    let mut reached = 0u8;
                    let result = match adapters.for_target(*target) {
                        Some(adapter) => adapter.convert(source, *target, options, &mut |p| {
                            if p > reached {
                                reached = p.min(100);
                                send_event(event_tx, QueueEvent::ItemProgress {
                                    id: *id,
                                    progress: reached,
                                });
                            }
                        }),
                        None => Err(no_adapter(*target)),
                    };
                    (*index, reached, result)
                })
                .collect()
        });

        for (index, reached, result) in results {
            summary.attempted += 1;
            self.items[index].update_progress(reached);
            if self.finish(index, result) {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }

        self.persist();
        tracing::info!(
            "Concurrent batch run finished ({} workers): {} completed, {} failed, {} skipped",
            workers,
            summary.completed,
            summary.failed,
            summary.skipped
        );
        summary
    }

    /// Converted outputs as `(file name, blob)` pairs, in queue order.
    pub fn completed_outputs(&self) -> Vec<(String, ConvertedBlob)> {
        self.items
            .iter()
            .filter_map(|item| {
                item.output()
                    .map(|output| (item.output_filename(), output.clone()))
            })
            .collect()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::new(self.items.iter().map(SnapshotRecord::from_item).collect())
    }

    /// Rebuild the queue from the attached persistence bridge.
    ///
    /// Returns the number of restored items. A missing or unreadable
    /// snapshot leaves the queue empty.
    pub fn restore(&mut self) -> usize {
        let Some(bridge) = &self.persistence else {
            return 0;
        };

        match bridge.load() {
            Ok(Some(snapshot)) => self.restore_from(snapshot),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!("Failed to load persisted queue, starting empty: {}", e);
                0
            }
        }
    }

    /// Replace the queue contents with the items of `snapshot`.
    ///
    /// Records that fail to decode are skipped.
    pub fn restore_from(&mut self, snapshot: QueueSnapshot) -> usize {
        self.items.clear();

        for record in snapshot.items {
            let id = record.id;
            match record.restore() {
                Ok(restored) => {
                    if self.items.iter().any(|i| i.id() == restored.id) {
                        tracing::warn!("Skipping duplicate snapshot item {}", id);
                        continue;
                    }
                    let preview = self.previews.create(restored.preview);
                    self.items.push(QueueItem::with_state(
                        restored.id,
                        restored.source,
                        preview,
                        restored.target,
                        restored.state,
                    ));
                }
                Err(e) => tracing::warn!("Skipping snapshot item {}: {}", id, e),
            }
        }

        tracing::info!("Restored {} queued items", self.items.len());
        self.persist();
        self.items.len()
    }

    fn convert_at(&mut self, index: usize) -> bool {
        let item = &mut self.items[index];
        item.start();
        let (id, target, source) = (item.id(), item.target(), item.source().clone());

        tracing::info!("Converting {} -> {}", source.name(), target);
        self.broadcast(QueueEvent::ItemStarted { id, target });
        self.persist();

        let result = match self.adapters.for_target(target) {
            Some(adapter) => {
                let item = &mut self.items[index];
                let event_tx = &self.event_tx;
                adapter.convert(&source, target, &self.options, &mut |p| {
                    if item.update_progress(p) {
                        send_event(event_tx, QueueEvent::ItemProgress {
                            id,
                            progress: item.progress(),
                        });
                    }
                })
            }
            None => Err(no_adapter(target)),
        };

        let completed = self.finish(index, result);
        self.persist();
        completed
    }

    fn finish(&mut self, index: usize, result: Result<ConvertedBlob, Error>) -> bool {
        let item = &mut self.items[index];
        let id = item.id();

        match result {
            Ok(output) => {
                tracing::debug!(
                    "Converted {} ({} bytes, {:?})",
                    item.source().name(),
                    output.len(),
                    output.kind
                );
                let event = QueueEvent::ItemCompleted {
                    id,
                    output_size: output.len(),
                    mime_type: output.mime().to_string(),
                    kind: output.kind,
                };
                item.complete(output);
                self.broadcast(event);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to convert {}: {}", item.source().name(), e);
                let error = e.to_string();
                item.fail(error.clone());
                self.broadcast(QueueEvent::ItemFailed { id, error });
                false
            }
        }
    }

    fn broadcast(&self, event: QueueEvent) {
        send_event(&self.event_tx, event);
    }

    fn persist(&self) {
        if let Some(bridge) = &self.persistence {
            if let Err(e) = bridge.save(&self.snapshot()) {
                tracing::warn!("Failed to persist queue: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for BatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchQueue")
            .field("items", &self.items.len())
            .field("adapters", &self.adapters.names())
            .field("persistence", &self.persistence.is_some())
            .finish()
    }
}

fn send_event(event_tx: &broadcast::Sender<QueueEvent>, event: QueueEvent) {
    if event_tx.send(event).is_err() {
        tracing::trace!("No subscribers for queue event");
    }
}

fn no_adapter(target: TargetFormat) -> Error {
    Error::unsupported(format!("no adapter produces {}", target))
}

/// Thumbnail for images, the raw bytes for everything else.
fn preview_bytes(source: &SourceFile) -> bytes::Bytes {
    if source.kind() == Some(MediaKind::Image) {
        if let Some(thumbnail) = images::thumbnail(source.bytes()) {
            return thumbnail.into();
        }
    }
    source.bytes().clone()
}
