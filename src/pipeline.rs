//! Capture pipeline orchestration
//!
//! Glues one scanner and one decision engine into the per-tick flow a
//! capture orchestrator runs:
//!
//! 1. Refresh motion from the last scan's moving nodes with the cheap probe
//! 2. If the signals alone already defer, stop before scanning
//! 3. Otherwise scan every container and decide on the fresh signature
//!
//! The orchestrator then renders (or not) and reports back through
//! [`CapturePipeline::frame_rendered`] / [`CapturePipeline::frame_failed`].

use tracing::debug;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::heuristics::CaptureHeuristics;
use crate::scanner::{ScanResult, ViewHierarchyScanner};
use crate::tree::{NodeId, ViewTree};
use crate::types::{Decision, Importance, Timestamp};

/// Stateful scanner + engine pair for one capture session
#[derive(Debug, Default)]
pub struct CapturePipeline {
    scanner: ViewHierarchyScanner,
    heuristics: CaptureHeuristics,
    last_scan: Option<ScanResult>,
    has_last_frame: bool,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline from a validated configuration
    pub fn with_config(config: GateConfig) -> Result<Self, GateError> {
        config.validate()?;
        Ok(Self {
            scanner: ViewHierarchyScanner::with_config(config.scanner),
            heuristics: CaptureHeuristics::new(config.heuristics),
            last_scan: None,
            has_last_frame: false,
        })
    }

    pub fn heuristics(&self) -> &CaptureHeuristics {
        &self.heuristics
    }

    /// Signal recording goes through the engine
    pub fn heuristics_mut(&mut self) -> &mut CaptureHeuristics {
        &mut self.heuristics
    }

    pub fn scanner(&self) -> &ViewHierarchyScanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut ViewHierarchyScanner {
        &mut self.scanner
    }

    /// Most recent successful scan
    pub fn last_scan(&self) -> Option<&ScanResult> {
        self.last_scan.as_ref()
    }

    pub fn has_last_frame(&self) -> bool {
        self.has_last_frame
    }

    /// Run one capture tick against a live tree
    pub fn tick<T: ViewTree + ?Sized>(
        &mut self,
        tree: &T,
        primary: NodeId,
        now: Timestamp,
        importance: Importance,
    ) -> Decision {
        // Motion flags from an earlier scan are only trusted once re-checked
        if self.heuristics.has_pending_defer() || !self.heuristics.probe_targets().is_empty() {
            self.heuristics.update_with_stability_probe(tree, now);
        }

        let early = self
            .heuristics
            .peek(None, now, self.has_last_frame, importance);
        if early.is_defer() {
            return self
                .heuristics
                .decide(None, now, self.has_last_frame, importance);
        }

        match self.scanner.scan_all_containers(tree, primary, now) {
            Some(scan) => {
                self.heuristics.update_with_scan_result(&scan);
                self.last_scan = Some(scan);
            }
            None => {
                debug!(
                    target: "capture_gate::heuristics",
                    primary = primary.0,
                    "primary container unavailable, keeping previous scan"
                );
            }
        }
        self.decide_on_last_scan(now, importance)
    }

    /// Decide using only the retained scan (no tree access)
    pub fn tick_without_tree(&mut self, now: Timestamp, importance: Importance) -> Decision {
        self.decide_on_last_scan(now, importance)
    }

    /// A frame was captured for the last scanned layout
    pub fn frame_rendered(&mut self, now: Timestamp) {
        let signature = self
            .last_scan
            .as_ref()
            .and_then(|scan| scan.layout_signature.clone());
        self.heuristics.record_rendered_signature(signature, now);
        self.has_last_frame = true;
    }

    pub fn frame_failed(&mut self, now: Timestamp) {
        debug!(target: "capture_gate::heuristics", now, "frame capture failed");
        self.heuristics.report_render_failure();
    }

    /// Clear engine state and the retained scan. A previously captured frame
    /// stays available to the host.
    pub fn reset(&mut self) {
        self.heuristics.reset();
        self.last_scan = None;
    }

    fn decide_on_last_scan(&mut self, now: Timestamp, importance: Importance) -> Decision {
        let signature = self
            .last_scan
            .as_ref()
            .and_then(|scan| scan.layout_signature.as_deref());
        self.heuristics
            .decide(signature, now, self.has_last_frame, importance)
    }
}
