//! Errors raised while interpreting user-supplied names and identifiers.

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A format name, extension or media kind is not in the catalog.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// A string does not hold a valid identifier.
    #[error("Invalid {kind} {value:?}: {reason}")]
    InvalidId {
        kind: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    pub fn unknown_format(name: impl Into<String>) -> Self {
        Self::UnknownFormat(name.into())
    }

    pub fn invalid_id(kind: &'static str, value: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidId {
            kind,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
