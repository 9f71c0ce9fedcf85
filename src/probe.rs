//! Stability probe
//!
//! While a capture is deferred, re-running the full scan on every poll would
//! cost as much as the capture being avoided. The probe instead re-inspects
//! only the handful of nodes the last scan flagged (scroll containers,
//! animated nodes, maps) and recomputes the motion flags from them.
//!
//! Handles may have been removed from the tree since the scan; those are
//! skipped and counted, never reported as errors.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::scanner::{is_visible, scroll_motion, NodeHandle, ScanResult};
use crate::tree::{NodeId, NodeInfo, ViewTree};
use crate::types::Rect;

/// Motion facts the decision engine consumes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionState {
    pub scroll_active: bool,
    pub bounce_active: bool,
    pub refresh_active: bool,
    pub map_active: bool,
    pub has_any_animations: bool,
    pub animation_area_ratio: f64,
}

impl MotionState {
    pub fn from_scan(scan: &ScanResult) -> Self {
        Self {
            scroll_active: scan.scroll_active,
            bounce_active: scan.bounce_active,
            refresh_active: scan.refresh_active,
            map_active: scan.map_active,
            has_any_animations: scan.has_any_animations,
            animation_area_ratio: scan.animation_area_ratio,
        }
    }

    /// No signal that would block a stable capture
    pub fn is_still(&self) -> bool {
        !(self.scroll_active
            || self.bounce_active
            || self.refresh_active
            || self.map_active
            || self.has_any_animations)
    }
}

/// Node handles worth re-checking, remembered from the last scan
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeTargets {
    pub scroll_containers: Vec<NodeHandle>,
    pub animated_nodes: Vec<NodeHandle>,
    pub map_views: Vec<NodeHandle>,
    /// Screen rectangle in primary-container coordinates
    pub screen: Rect,
}

impl ProbeTargets {
    pub fn from_scan(scan: &ScanResult) -> Self {
        Self {
            scroll_containers: scan.scroll_containers.clone(),
            animated_nodes: scan.animated_nodes.clone(),
            map_views: scan.map_view_handles.clone(),
            screen: scan.screen_frame,
        }
    }

    pub fn len(&self) -> usize {
        self.scroll_containers.len() + self.animated_nodes.len() + self.map_views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub motion: MotionState,
    /// Handles that no longer resolved or were no longer visible
    pub stale_handles: usize,
}

/// Lightweight motion re-check over remembered handles
#[derive(Debug, Clone, Copy, Default)]
pub struct StabilityProbe;

impl StabilityProbe {
    pub fn new() -> Self {
        Self
    }

    pub fn probe<T: ViewTree + ?Sized>(&self, tree: &T, targets: &ProbeTargets) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::default();
        let mut animated_area = 0.0;

        for handle in &targets.scroll_containers {
            let Some(info) = live(tree, handle.id, &mut outcome.stale_handles) else {
                continue;
            };
            if let Some(scroll) = &info.scroll {
                let motion = scroll_motion(scroll, &info.frame);
                outcome.motion.scroll_active |= motion.scrolling;
                outcome.motion.bounce_active |= motion.bouncing;
                outcome.motion.refresh_active |= motion.refreshing;
            }
        }

        for handle in &targets.map_views {
            if let Some(info) = live(tree, handle.id, &mut outcome.stale_handles) {
                outcome.motion.map_active |= info.map_camera_moving;
            }
        }

        for handle in &targets.animated_nodes {
            let Some(info) = live(tree, handle.id, &mut outcome.stale_handles) else {
                continue;
            };
            if !info.has_motion_animation() {
                continue;
            }
            outcome.motion.has_any_animations = true;
            // Ancestors are not re-walked, so keep the scan-time position
            let frame = Rect::new(
                handle.frame.x,
                handle.frame.y,
                info.frame.width,
                info.frame.height,
            );
            animated_area += frame
                .intersection(&targets.screen)
                .map_or(0.0, |visible| visible.area());
        }

        let screen_area = targets.screen.area();
        if screen_area > 0.0 {
            outcome.motion.animation_area_ratio = (animated_area / screen_area).clamp(0.0, 1.0);
        }

        trace!(
            target: "capture_gate::probe",
            targets = targets.len(),
            stale = outcome.stale_handles,
            still = outcome.motion.is_still(),
            "stability probe"
        );

        outcome
    }
}

fn live<T: ViewTree + ?Sized>(tree: &T, id: NodeId, stale: &mut usize) -> Option<NodeInfo> {
    match tree.inspect(id) {
        Some(info) if is_visible(&info) => Some(info),
        _ => {
            *stale += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{ScannerConfig, ViewHierarchyScanner};
    use crate::schema::{SnapshotNode, SnapshotTree};
    use crate::tree::{AnimationKind, ScrollState};
    use pretty_assertions::assert_eq;

    const SCREEN: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 800.0,
    };

    fn moving_tree() -> SnapshotTree {
        let window = SnapshotNode::new(1, NodeInfo::new("UIWindow", SCREEN)).with_children(vec![
            SnapshotNode::new(
                2,
                NodeInfo::new("UIScrollView", Rect::new(0.0, 0.0, 400.0, 400.0)).with_scroll(
                    ScrollState {
                        content_width: 400.0,
                        content_height: 1200.0,
                        decelerating: true,
                        ..Default::default()
                    },
                ),
            ),
            SnapshotNode::new(
                3,
                NodeInfo::new("UIView", Rect::new(0.0, 400.0, 400.0, 400.0))
                    .with_animation(AnimationKind::Position),
            ),
            SnapshotNode::new(
                4,
                NodeInfo::new("MKMapView", Rect::new(0.0, 0.0, 100.0, 100.0))
                    .with_map_camera_moving(true),
            ),
        ]);
        SnapshotTree::new(SCREEN, vec![window]).unwrap()
    }

    fn targets_for(tree: &SnapshotTree) -> ProbeTargets {
        let mut scanner =
            ViewHierarchyScanner::with_config(ScannerConfig::default().with_time_budget(None));
        let scan = scanner.scan(tree, NodeId(1), 0.0).unwrap();
        ProbeTargets::from_scan(&scan)
    }

    #[test]
    fn test_probe_matches_scan_while_moving() {
        let tree = moving_tree();
        let targets = targets_for(&tree);
        assert_eq!(targets.len(), 3);

        let outcome = StabilityProbe::new().probe(&tree, &targets);
        assert_eq!(outcome.stale_handles, 0);
        assert!(outcome.motion.scroll_active);
        assert!(outcome.motion.map_active);
        assert!(outcome.motion.has_any_animations);
        assert!((outcome.motion.animation_area_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_probe_sees_motion_settle() {
        let mut tree = moving_tree();
        let targets = targets_for(&tree);

        tree.node_mut(NodeId(2)).unwrap().scroll.as_mut().unwrap().decelerating = false;
        tree.node_mut(NodeId(3)).unwrap().animations.clear();
        tree.node_mut(NodeId(4)).unwrap().map_camera_moving = false;

        let outcome = StabilityProbe::new().probe(&tree, &targets);
        assert!(outcome.motion.is_still());
        assert_eq!(outcome.motion.animation_area_ratio, 0.0);
    }

    #[test]
    fn test_removed_handles_are_ignored() {
        let mut tree = moving_tree();
        let targets = targets_for(&tree);

        assert!(tree.remove(NodeId(2)));
        assert!(tree.remove(NodeId(3)));
        tree.node_mut(NodeId(4)).unwrap().hidden = true;

        let outcome = StabilityProbe::new().probe(&tree, &targets);
        assert_eq!(outcome.stale_handles, 3);
        assert_eq!(outcome.motion, MotionState::default());
    }

    #[test]
    fn test_empty_targets() {
        let tree = moving_tree();
        let outcome = StabilityProbe::new().probe(&tree, &ProbeTargets::default());
        assert_eq!(outcome, ProbeOutcome::default());
    }
}
