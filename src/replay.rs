//! Trace replay
//!
//! Drives a [`CapturePipeline`] through a recorded capture trace and reports
//! every decision it made. Useful for tuning timing configuration offline
//! and for regression tests of the decision rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::pipeline::CapturePipeline;
use crate::schema::{SnapshotTree, TraceEvent, TraceEventKind, TRACE_SCHEMA_VERSION};
use crate::tree::NodeId;
use crate::types::{CaptureAction, Decision, DecisionReason, Importance, Timestamp};
use crate::{GATE_VERSION, PRODUCER_NAME};

/// Who produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    /// Decision engine instance that made the decisions
    pub instance_id: String,
}

/// One tick and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub t: Timestamp,
    pub importance: Importance,
    pub decision: Decision,
    /// Nodes visited if this tick ran a fresh scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views_scanned: Option<usize>,
}

/// Outcome of replaying one trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub trace_schema: String,
    pub producer: ReportProducer,
    pub generated_at: DateTime<Utc>,
    pub events: usize,
    pub ticks: Vec<TickRecord>,
    pub reason_counts: BTreeMap<DecisionReason, usize>,
}

impl ReplayReport {
    pub fn count(&self, action: CaptureAction) -> usize {
        self.ticks
            .iter()
            .filter(|tick| tick.decision.action == action)
            .count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Replay `events` in order. Timestamps must never decrease.
pub fn replay_trace(events: &[TraceEvent], config: &GateConfig) -> Result<ReplayReport, GateError> {
    let mut pipeline = CapturePipeline::with_config(config.clone())?;
    let mut tree: Option<(SnapshotTree, NodeId)> = None;
    let mut ticks = Vec::new();
    let mut last_t = f64::NEG_INFINITY;

    for (index, event) in events.iter().enumerate() {
        let t = event.t;
        if !t.is_finite() || t < last_t {
            return Err(GateError::InvalidTrace(format!(
                "event {} ({}) at t={} precedes t={}",
                index + 1,
                event.kind.name(),
                t,
                last_t
            )));
        }
        last_t = t;

        match &event.kind {
            TraceEventKind::Touch => pipeline.heuristics_mut().record_touch(t),
            TraceEventKind::Interaction => pipeline.heuristics_mut().record_interaction(t),
            TraceEventKind::MapInteraction => pipeline.heuristics_mut().record_map_interaction(t),
            TraceEventKind::Navigation => pipeline.heuristics_mut().record_navigation(t),
            TraceEventKind::Keyboard { animating } => {
                pipeline.heuristics_mut().set_keyboard_animating(*animating)
            }
            TraceEventKind::Tree { snapshot, primary } => {
                let primary = primary
                    .or_else(|| snapshot.containers.first().map(|container| container.id))
                    .ok_or_else(|| {
                        GateError::InvalidTrace(format!(
                            "event {} (tree) has no containers and no primary",
                            index + 1
                        ))
                    })?;
                tree = Some((SnapshotTree::from_snapshot(snapshot.clone())?, primary));
            }
            TraceEventKind::Tick { importance } => {
                let decision = match &tree {
                    Some((tree, primary)) => pipeline.tick(tree, *primary, t, *importance),
                    None => pipeline.tick_without_tree(t, *importance),
                };
                let views_scanned = pipeline
                    .last_scan()
                    .filter(|scan| scan.scan_timestamp == t && tree.is_some())
                    .map(|scan| scan.total_views_scanned);
                ticks.push(TickRecord {
                    t,
                    importance: *importance,
                    decision,
                    views_scanned,
                });
            }
            TraceEventKind::Rendered => pipeline.frame_rendered(t),
            TraceEventKind::RenderFailed => pipeline.frame_failed(t),
            TraceEventKind::InvalidateSignature => pipeline.heuristics_mut().invalidate_signature(),
            TraceEventKind::Reset => pipeline.reset(),
        }
    }

    let mut reason_counts = BTreeMap::new();
    for tick in &ticks {
        *reason_counts.entry(tick.decision.reason).or_insert(0) += 1;
    }

    let report = ReplayReport {
        trace_schema: TRACE_SCHEMA_VERSION.to_string(),
        producer: ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: GATE_VERSION.to_string(),
            instance_id: pipeline.heuristics().instance_id().to_string(),
        },
        generated_at: Utc::now(),
        events: events.len(),
        ticks,
        reason_counts,
    };

    debug!(
        target: "capture_gate::replay",
        events = report.events,
        ticks = report.ticks.len(),
        renders = report.count(CaptureAction::RenderNow),
        defers = report.count(CaptureAction::Defer),
        reuses = report.count(CaptureAction::ReuseLast),
        "trace replayed"
    );

    Ok(report)
}

/// Parse an NDJSON trace and replay it
pub fn replay_ndjson(ndjson: &str, config: &GateConfig) -> Result<ReplayReport, GateError> {
    let events = TraceEvent::parse_ndjson(ndjson)?;
    replay_trace(&events, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScannerConfig;
    use pretty_assertions::assert_eq;

    const TREE: &str = r#"{"t": 0.0, "kind": "tree", "snapshot": {
        "screen": {"x": 0, "y": 0, "width": 390, "height": 844},
        "containers": [{"id": 1, "type_name": "UIWindow",
            "frame": {"x": 0, "y": 0, "width": 390, "height": 844},
            "children": [{"id": 2, "type_name": "UILabel",
                "frame": {"x": 10, "y": 10, "width": 100, "height": 20}}]}]}}"#;

    fn config() -> GateConfig {
        GateConfig {
            scanner: ScannerConfig::default().with_time_budget(None),
            ..Default::default()
        }
    }

    fn trace(lines: &[&str]) -> String {
        let mut all = vec![TREE.replace('\n', " ")];
        all.extend(lines.iter().map(|line| line.to_string()));
        all.join("\n")
    }

    #[test]
    fn test_replay_touch_scenario() {
        let ndjson = trace(&[
            r#"{"t": 0.0, "kind": "touch"}"#,
            r#"{"t": 0.2, "kind": "tick"}"#,
            r#"{"t": 0.6, "kind": "tick"}"#,
            r#"{"t": 0.6, "kind": "rendered"}"#,
            r#"{"t": 0.9, "kind": "tick", "importance": "low"}"#,
        ]);
        let report = replay_ndjson(&ndjson, &config()).unwrap();

        let reasons: Vec<DecisionReason> =
            report.ticks.iter().map(|tick| tick.decision.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DecisionReason::DeferTouch,
                DecisionReason::DeadlineExpired,
                DecisionReason::ReuseSignatureUnchanged,
            ]
        );
        assert_eq!(report.ticks[0].decision.defer_until, Some(0.5));
        assert_eq!(report.ticks[0].views_scanned, None);
        assert_eq!(report.ticks[1].views_scanned, Some(2));
        assert_eq!(report.count(CaptureAction::ReuseLast), 1);
        assert_eq!(report.reason_counts[&DecisionReason::DeferTouch], 1);
        assert_eq!(report.events, 6);
        assert_eq!(report.producer.name, PRODUCER_NAME);
    }

    #[test]
    fn test_replay_without_tree_uses_signals_only() {
        let events = vec![
            TraceEvent::new(0.0, TraceEventKind::Navigation),
            TraceEvent::new(
                0.1,
                TraceEventKind::Tick {
                    importance: Importance::Medium,
                },
            ),
            TraceEvent::new(
                0.2,
                TraceEventKind::Tick {
                    importance: Importance::Critical,
                },
            ),
        ];
        let report = replay_trace(&events, &config()).unwrap();
        assert_eq!(report.ticks[0].decision.reason, DecisionReason::DeferTransition);
        assert_eq!(report.ticks[1].decision.reason, DecisionReason::RenderNow);
    }

    #[test]
    fn test_backwards_time_rejected() {
        let events = vec![
            TraceEvent::new(1.0, TraceEventKind::Touch),
            TraceEvent::new(0.5, TraceEventKind::Touch),
        ];
        let result = replay_trace(&events, &config());
        assert!(matches!(result, Err(GateError::InvalidTrace(_))));
    }

    #[test]
    fn test_report_serializes_reason_keys() {
        let ndjson = trace(&[r#"{"t": 0.1, "kind": "tick"}"#]);
        let report = replay_ndjson(&ndjson, &config()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["reason_counts"]["render_now"], 1);
        assert_eq!(json["trace_schema"], TRACE_SCHEMA_VERSION);
    }
}
