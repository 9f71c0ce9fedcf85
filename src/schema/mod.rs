//! Serialized inputs: view-tree snapshots and capture traces
//!
//! Snapshots let the scanner run against a recorded hierarchy instead of a
//! live toolkit; traces replay a capture session through the engine.

mod snapshot;
mod trace;

pub use snapshot::*;
pub use trace::*;
