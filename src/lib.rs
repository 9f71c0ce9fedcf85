//! Capture Gate - capture decision engine for session replay
//!
//! Decides, per capture tick, whether a screen should be rendered now,
//! deferred until user activity settles, or satisfied by reusing the previous
//! frame. A single bounded pass over the visual tree produces both the layout
//! signature used for change detection and the privacy regions to mask.
//!
//! ## Modules
//!
//! - **Scanner**: bounded traversal → layout signature, privacy frames, motion flags
//! - **Probe**: cheap re-check of the last scan's moving nodes while deferring
//! - **Heuristics**: signal recorder and ordered decision rules
//! - **Pipeline**: per-tick orchestration of scanner and engine
//! - **Replay**: offline evaluation of recorded capture traces

pub mod config;
pub mod error;
pub mod heuristics;
pub mod pipeline;
pub mod probe;
pub mod replay;
pub mod scanner;
pub mod schema;
pub mod tree;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{GateConfig, HeuristicsConfig};
pub use error::GateError;
pub use heuristics::{CaptureHeuristics, PendingDefer, SignalRecorder};
pub use pipeline::CapturePipeline;
pub use probe::{MotionState, ProbeOutcome, ProbeTargets, StabilityProbe};
pub use replay::{replay_ndjson, replay_trace, ReplayReport};
pub use scanner::{ScanResult, ScannerConfig, ViewHierarchyScanner};
pub use tree::{NodeId, NodeInfo, NodeKind, ViewTree};
pub use types::{CaptureAction, Decision, DecisionReason, Importance, Rect, Timestamp};

// Schema exports
pub use schema::{SnapshotTree, TraceEvent, ViewTreeSnapshot, SNAPSHOT_SCHEMA_VERSION, TRACE_SCHEMA_VERSION};

/// Library version embedded in replay reports
pub const GATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for replay reports
pub const PRODUCER_NAME: &str = "capture-gate";
