use super::preview::PreviewHandle;
use convertforge_av::{ConvertedBlob, SourceFile};
use convertforge_common::{ItemId, TargetFormat};
use serde::{Deserialize, Serialize};

/// Externally visible status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Converting,
    Completed,
    Error,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Converting => write!(f, "converting"),
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Error => write!(f, "error"),
        }
    }
}

/// Conversion state. The output only exists in [`ItemState::Completed`].
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Converting { progress: u8 },
    Completed { output: ConvertedBlob },
    Error { detail: String, progress: u8 },
}

/// One file's conversion record.
#[derive(Debug)]
pub struct QueueItem {
    id: ItemId,
    source: SourceFile,
    preview: PreviewHandle,
    target: TargetFormat,
    state: ItemState,
}

impl QueueItem {
    pub fn new(source: SourceFile, preview: PreviewHandle, target: TargetFormat) -> Self {
        Self::with_state(ItemId::new(), source, preview, target, ItemState::Pending)
    }

    pub(crate) fn with_state(
        id: ItemId,
        source: SourceFile,
        preview: PreviewHandle,
        target: TargetFormat,
        state: ItemState,
    ) -> Self {
        Self {
            id,
            source,
            preview,
            target,
            state,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn target(&self) -> TargetFormat {
        self.target
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> ItemStatus {
        match self.state {
            ItemState::Pending => ItemStatus::Pending,
            ItemState::Converting { .. } => ItemStatus::Converting,
            ItemState::Completed { .. } => ItemStatus::Completed,
            ItemState::Error { .. } => ItemStatus::Error,
        }
    }

    /// 0 while pending, 100 once completed, the last reached value otherwise.
    pub fn progress(&self) -> u8 {
        match self.state {
            ItemState::Pending => 0,
            ItemState::Converting { progress } => progress,
            ItemState::Completed { .. } => 100,
            ItemState::Error { progress, .. } => progress,
        }
    }

    pub fn output(&self) -> Option<&ConvertedBlob> {
        match &self.state {
            ItemState::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ItemState::Error { detail, .. } => Some(detail),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ItemState::Pending)
    }

    /// Name the converted output is delivered under.
    pub fn output_filename(&self) -> String {
        convertforge_common::paths::converted_filename(self.source.name(), self.target.extension())
    }

    pub(crate) fn start(&mut self) {
        self.state = ItemState::Converting { progress: 0 };
    }

    /// Record progress. Returns `true` if the value moved forward.
    ///
    /// Lower values than the current one are ignored.
    pub(crate) fn update_progress(&mut self, value: u8) -> bool {
        if let ItemState::Converting { progress } = &mut self.state {
            let value = value.min(100);
            if value > *progress {
                *progress = value;
                return true;
            }
        }
        false
    }

    pub(crate) fn complete(&mut self, output: ConvertedBlob) {
        self.state = ItemState::Completed { output };
    }

    pub(crate) fn fail(&mut self, detail: impl Into<String>) {
        let progress = self.progress();
        self.state = ItemState::Error {
            detail: detail.into(),
            progress,
        };
    }

    /// Send an errored item back to pending. Other states are left alone.
    pub(crate) fn reset_error(&mut self) -> bool {
        if matches!(self.state, ItemState::Error { .. }) {
            self.state = ItemState::Pending;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PreviewRegistry;

    fn item() -> QueueItem {
        let registry = PreviewRegistry::new();
        let source = SourceFile::new("photo.jpeg", "image/jpeg", vec![1, 2, 3]);
        let preview = registry.create(source.bytes().clone());
        QueueItem::new(source, preview, TargetFormat::Png)
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = item();
        assert_eq!(item.status(), ItemStatus::Pending);
        assert_eq!(item.progress(), 0);
        assert!(item.output().is_none());
        assert!(item.error().is_none());
        assert_eq!(item.output_filename(), "photo.png");
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut item = item();
        assert!(!item.update_progress(10), "pending items ignore progress");

        item.start();
        assert!(item.update_progress(40));
        assert!(!item.update_progress(20));
        assert_eq!(item.progress(), 40);
        assert!(item.update_progress(250));
        assert_eq!(item.progress(), 100);
    }

    #[test]
    fn test_complete_sets_output() {
        let mut item = item();
        item.start();
        item.complete(ConvertedBlob::real(vec![9], TargetFormat::Png));
        assert_eq!(item.status(), ItemStatus::Completed);
        assert_eq!(item.progress(), 100);
        assert_eq!(item.output().unwrap().bytes.as_ref(), &[9]);
    }

    #[test]
    fn test_fail_keeps_reached_progress() {
        let mut item = item();
        item.start();
        item.update_progress(50);
        item.fail("decode failed: bad header");
        assert_eq!(item.status(), ItemStatus::Error);
        assert_eq!(item.progress(), 50);
        assert_eq!(item.error(), Some("decode failed: bad header"));
        assert!(item.output().is_none());

        assert!(item.reset_error());
        assert!(item.is_pending());
        assert!(!item.reset_error());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Converting).unwrap(),
            "\"converting\""
        );
        assert_eq!(ItemStatus::Error.to_string(), "error");
    }
}
