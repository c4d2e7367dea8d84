//! Convertforge - Batch file conversion pipeline
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod packaging;
pub mod persistence;
pub mod queue;
pub mod usage;
