//! Convertforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across convertforge:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for queue items and previews
//! - **Format Catalog**: Media kinds, target formats, MIME types and extensions
//! - **Path Utilities**: Converted filename generation and filename sanitizing
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use convertforge_common::{formats_for, MediaKind, TargetFormat};
//! use convertforge_common::paths::converted_filename;
//!
//! let targets = formats_for(MediaKind::Image);
//! assert_eq!(targets[0], TargetFormat::Png);
//!
//! assert_eq!(converted_filename("my.file.name.jpg", "png"), "my.file.name.png");
//! ```

pub mod error;
pub mod formats;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use formats::{formats_for, normalize_mime, MediaKind, TargetFormat};
pub use ids::*;
