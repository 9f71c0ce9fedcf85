//! capture.trace.v1 schema
//!
//! A trace is newline-delimited JSON, one timestamped event per line, that
//! replays a capture session against the decision engine:
//!
//! ```text
//! {"t": 0.0, "kind": "tree", "snapshot": {...}}
//! {"t": 0.0, "kind": "touch"}
//! {"t": 0.2, "kind": "tick", "importance": "medium"}
//! {"t": 0.6, "kind": "tick"}
//! {"t": 0.6, "kind": "rendered"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::schema::snapshot::ViewTreeSnapshot;
use crate::tree::NodeId;
use crate::types::{Importance, Timestamp};

/// Current trace schema version
pub const TRACE_SCHEMA_VERSION: &str = "capture.trace.v1";

/// One line of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Caller clock, seconds
    pub t: Timestamp,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEventKind {
    Touch,
    Interaction,
    MapInteraction,
    Navigation,
    Keyboard {
        animating: bool,
    },
    /// Replace the current tree. `primary` defaults to the first container.
    Tree {
        snapshot: ViewTreeSnapshot,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary: Option<NodeId>,
    },
    /// Ask for a capture decision
    Tick {
        #[serde(default)]
        importance: Importance,
    },
    Rendered,
    RenderFailed,
    InvalidateSignature,
    Reset,
}

impl TraceEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            TraceEventKind::Touch => "touch",
            TraceEventKind::Interaction => "interaction",
            TraceEventKind::MapInteraction => "map_interaction",
            TraceEventKind::Navigation => "navigation",
            TraceEventKind::Keyboard { .. } => "keyboard",
            TraceEventKind::Tree { .. } => "tree",
            TraceEventKind::Tick { .. } => "tick",
            TraceEventKind::Rendered => "rendered",
            TraceEventKind::RenderFailed => "render_failed",
            TraceEventKind::InvalidateSignature => "invalidate_signature",
            TraceEventKind::Reset => "reset",
        }
    }
}

impl TraceEvent {
    pub fn new(t: Timestamp, kind: TraceEventKind) -> Self {
        Self { t, kind }
    }

    /// Parse NDJSON, skipping blank lines
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<TraceEvent>, GateError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(GateError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Parse a JSON array of events
    pub fn parse_array(json: &str) -> Result<Vec<TraceEvent>, GateError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
