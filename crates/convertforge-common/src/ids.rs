//! UUID-backed identifiers.
//!
//! Queue items and preview handles are both keyed by UUIDs; the newtypes keep
//! one from being passed where the other is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, prefix = $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        /// Accepts the displayed form, with or without its prefix.
        impl FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                let raw = s.strip_prefix($prefix).unwrap_or(s);
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|e| crate::Error::invalid_id(stringify!($name), s, e))
            }
        }
    };
}

uuid_id! {
    /// Identifier of a queued conversion item, stable for the item's lifetime.
    ItemId, prefix = ""
}

uuid_id! {
    /// Identifier of a preview handle.
    PreviewId, prefix = "preview:"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
        assert_ne!(PreviewId::new(), PreviewId::new());
    }

    #[test]
    fn test_item_id_serializes_as_plain_uuid() {
        let id = ItemId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        assert_eq!(serde_json::from_str::<ItemId>(&json).unwrap(), id);
    }

    #[test]
    fn test_parse_displayed_form() {
        let id = ItemId::new();
        assert_eq!(id.to_string().parse::<ItemId>().unwrap(), id);

        let preview = PreviewId::new();
        let shown = preview.to_string();
        assert!(shown.starts_with("preview:"));
        assert_eq!(shown.parse::<PreviewId>().unwrap(), preview);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<ItemId>().unwrap_err();
        assert!(err.to_string().contains("ItemId"));
    }
}
