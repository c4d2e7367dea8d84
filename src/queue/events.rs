use convertforge_av::ConversionKind;
use convertforge_common::{ItemId, TargetFormat};
use serde::{Deserialize, Serialize};

/// Queue lifecycle event, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A file was submitted.
    ItemAdded {
        id: ItemId,
        file_name: String,
        target: TargetFormat,
    },
    /// Conversion of an item began.
    ItemStarted { id: ItemId, target: TargetFormat },
    /// An item's progress moved forward.
    ItemProgress { id: ItemId, progress: u8 },
    /// An item finished converting.
    ItemCompleted {
        id: ItemId,
        output_size: usize,
        mime_type: String,
        kind: ConversionKind,
    },
    /// An item failed to convert.
    ItemFailed { id: ItemId, error: String },
    /// An item was removed from the queue.
    ItemRemoved { id: ItemId },
    /// Every item was discarded.
    QueueReset { removed: usize },
}

impl QueueEvent {
    /// The item this event concerns, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            QueueEvent::ItemAdded { id, .. }
            | QueueEvent::ItemStarted { id, .. }
            | QueueEvent::ItemProgress { id, .. }
            | QueueEvent::ItemCompleted { id, .. }
            | QueueEvent::ItemFailed { id, .. }
            | QueueEvent::ItemRemoved { id } => Some(*id),
            QueueEvent::QueueReset { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let id = ItemId::new();
        let json = serde_json::to_value(QueueEvent::ItemProgress { id, progress: 40 }).unwrap();
        assert_eq!(json["event_type"], "item_progress");
        assert_eq!(json["progress"], 40);
        assert_eq!(json["id"], id.to_string());

        let json = serde_json::to_value(QueueEvent::QueueReset { removed: 3 }).unwrap();
        assert_eq!(json["event_type"], "queue_reset");
    }

    #[test]
    fn test_item_id() {
        let id = ItemId::new();
        assert_eq!(QueueEvent::ItemRemoved { id }.item_id(), Some(id));
        assert_eq!(QueueEvent::QueueReset { removed: 0 }.item_id(), None);
    }
}
