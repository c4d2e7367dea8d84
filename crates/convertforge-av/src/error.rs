//! Error types for convertforge-av.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a single file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The target encoder rejected the decoded data.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The external transcoding engine failed.
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The adapter does not handle this source/target combination.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Workspace error.
    #[error("workspace error: {0}")]
    Workspace(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create a transcode error.
    pub fn transcode(message: impl Into<String>) -> Self {
        Self::Transcode(message.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create an unsupported error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}
