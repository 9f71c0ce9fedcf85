//! Capture heuristics
//!
//! Given recent user signals, the latest scan (or probe) motion flags and the
//! current layout signature, decide whether to render a frame now, defer it,
//! or reuse the previous one. Deferrals are always bounded by
//! `max_stale_seconds` so a continuously moving screen still gets captured.
//!
//! Pipeline position: ScanResult / signals → CaptureHeuristics → Decision

mod engine;
mod rules;
mod state;

pub use engine::CaptureHeuristics;
pub use state::{PendingDefer, SignalRecorder};
