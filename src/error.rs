//! Error types for Capture Gate
//!
//! The scheduling core never fails: truncated scans, stale node handles and
//! capture failures all degrade to flags or fallback decisions. These errors
//! only surface at the edges (configuration, snapshot/trace parsing, FFI).

use thiserror::Error;

/// Errors raised while loading inputs or configuration
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid view tree snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(String),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),
}
