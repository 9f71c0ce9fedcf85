//! Bounded depth-first traversal
//!
//! The walk is iterative (explicit stack) so deep hierarchies cannot overflow
//! the call stack, and it is bounded three ways: subtrees deeper than
//! `max_depth` are pruned, and the walk stops once `max_view_count` visible
//! nodes were visited or the wall-clock budget ran out. Any bound that trips
//! sets `did_bail_out_early`; the partial result is still returned.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::scanner::classify::{is_visible, scroll_motion, KindCache};
use crate::scanner::config::ScannerConfig;
use crate::scanner::result::{NodeHandle, ScanResult};
use crate::scanner::signature::SignatureBuilder;
use crate::tree::{NodeId, NodeInfo, NodeKind, ViewTree};
use crate::types::{Point, Rect, Timestamp};

/// How often (in visited nodes) the wall clock is consulted
const BUDGET_CHECK_INTERVAL: usize = 16;

/// Single-pass scanner for layout signature, privacy regions and motion
///
/// Not thread-safe; call from the context that owns the tree.
#[derive(Debug, Default)]
pub struct ViewHierarchyScanner {
    config: ScannerConfig,
    kinds: KindCache,
}

impl ViewHierarchyScanner {
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    pub fn with_config(config: ScannerConfig) -> Self {
        Self {
            config,
            kinds: KindCache::default(),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ScannerConfig) {
        self.config = config;
    }

    /// Front-load type classification so the first real scan does not pay
    /// for it. Subsequent calls are no-ops.
    pub fn prewarm(&mut self) {
        if self.kinds.prewarm() {
            debug!(
                target: "capture_gate::scanner",
                cached_types = self.kinds.len(),
                "classification cache prewarmed"
            );
        }
    }

    pub fn is_prewarmed(&self) -> bool {
        self.kinds.is_warm()
    }

    pub fn is_visible(&self, info: &NodeInfo) -> bool {
        is_visible(info)
    }

    /// Visibility of a live node; removed nodes are not visible
    pub fn is_node_visible<T: ViewTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        tree.inspect(node).map_or(false, |info| is_visible(&info))
    }

    /// Scan one container. Returns `None` if the container is gone or empty.
    pub fn scan<T: ViewTree + ?Sized>(
        &mut self,
        tree: &T,
        container: NodeId,
        now: Timestamp,
    ) -> Option<ScanResult> {
        self.scan_all(tree, &[container], container, now)
    }

    /// Scan every container the tree reports, relative to `primary`
    pub fn scan_all_containers<T: ViewTree + ?Sized>(
        &mut self,
        tree: &T,
        primary: NodeId,
        now: Timestamp,
    ) -> Option<ScanResult> {
        let containers = tree.containers();
        self.scan_all(tree, &containers, primary, now)
    }

    /// Scan `containers` and union their results in `primary`'s coordinate
    /// space. Only the primary container feeds the layout signature, so
    /// overlays appearing and disappearing do not register as layout changes.
    /// All containers share one node and time budget.
    pub fn scan_all<T: ViewTree + ?Sized>(
        &mut self,
        tree: &T,
        containers: &[NodeId],
        primary: NodeId,
        now: Timestamp,
    ) -> Option<ScanResult> {
        let primary_info = tree.inspect(primary)?;
        if !is_visible(&primary_info) {
            return None;
        }

        let started = Instant::now();
        let screen = match tree.screen_bounds() {
            screen if screen.is_empty() => primary_info.frame,
            screen => screen,
        };
        let primary_origin = primary_info.frame.origin();

        let mut walk = Walk {
            tree,
            config: &self.config,
            kinds: &mut self.kinds,
            result: ScanResult::empty(now),
            started,
            budget: self.config.time_budget(),
            screen: screen.translated(-primary_origin.x, -primary_origin.y),
            animated_area: 0.0,
            halted: false,
        };

        let mut signature = SignatureBuilder::new();
        walk.run(primary, Point::ZERO, Some(&mut signature));

        for &container in containers {
            if walk.halted {
                break;
            }
            if container == primary {
                continue;
            }
            let Some(info) = tree.inspect(container) else {
                continue;
            };
            let offset = Point::new(
                info.frame.x - primary_origin.x,
                info.frame.y - primary_origin.y,
            );
            walk.run(container, offset, None);
        }

        let mut result = walk.finish();
        if result.total_views_scanned == 0 {
            return None;
        }
        result.layout_signature = signature.finish();

        debug!(
            target: "capture_gate::scanner",
            views = result.total_views_scanned,
            containers = containers.len().max(1),
            bailed = result.did_bail_out_early,
            text_inputs = result.text_input_frames.len(),
            animated = result.has_any_animations,
            elapsed_us = started.elapsed().as_micros() as u64,
            "scan completed"
        );

        Some(result)
    }
}

/// A node waiting on the traversal stack
struct Pending {
    id: NodeId,
    depth: usize,
    /// Container-space origin of the parent's content
    origin: Point,
    ordinal: usize,
    /// An ancestor is already animating; its area covers this node
    in_animated: bool,
}

/// State of one scan across one or more containers
struct Walk<'a, T: ?Sized> {
    tree: &'a T,
    config: &'a ScannerConfig,
    kinds: &'a mut KindCache,
    result: ScanResult,
    started: Instant,
    budget: Option<Duration>,
    /// Screen rectangle in primary-container coordinates
    screen: Rect,
    animated_area: f64,
    /// Count or time budget exhausted; no further containers are walked
    halted: bool,
}

impl<'a, T: ViewTree + ?Sized> Walk<'a, T> {
    fn run(&mut self, root: NodeId, offset: Point, mut signature: Option<&mut SignatureBuilder>) {
        let mut stack = vec![Pending {
            id: root,
            depth: 0,
            origin: Point::ZERO,
            ordinal: 0,
            in_animated: false,
        }];

        while let Some(pending) = stack.pop() {
            let Some(info) = self.tree.inspect(pending.id) else {
                continue;
            };
            if !is_visible(&info) {
                continue;
            }
            if self.result.total_views_scanned >= self.config.max_view_count {
                self.halt("view_count");
                return;
            }
            if self.over_budget() {
                self.halt("time_budget");
                return;
            }
            self.result.total_views_scanned += 1;

            // Roots are positioned in screen space; their content starts at zero
            let local = if pending.depth == 0 {
                Rect::new(0.0, 0.0, info.frame.width, info.frame.height)
            } else {
                info.frame.translated(pending.origin.x, pending.origin.y)
            };
            let frame = local.translated(offset.x, offset.y);
            let kind = self.kinds.classify(&info);

            if kind == NodeKind::MapView {
                self.record_map(pending.id, &info, frame);
                continue;
            }

            if let Some(signature) = signature.as_mut() {
                signature.fold(&info.type_name, &local, pending.depth, pending.ordinal);
            }

            let masked = info
                .native_id
                .as_ref()
                .map_or(false, |id| self.config.masked_native_ids.contains(id));
            let opaque = self.record_privacy(kind, masked, frame);

            let animating = info.has_motion_animation();
            if animating {
                self.result.has_any_animations = true;
                if !pending.in_animated {
                    self.result.animated_nodes.push(NodeHandle {
                        id: pending.id,
                        frame,
                    });
                    self.animated_area += frame
                        .intersection(&self.screen)
                        .map_or(0.0, |visible| visible.area());
                }
            }

            let mut child_origin = local.origin();
            if let Some(scroll) = &info.scroll {
                self.result.scroll_containers.push(NodeHandle {
                    id: pending.id,
                    frame,
                });
                let motion = scroll_motion(scroll, &info.frame);
                self.result.scroll_active |= motion.scrolling;
                self.result.bounce_active |= motion.bouncing;
                self.result.refresh_active |= motion.refreshing;
                child_origin = child_origin.offset(-scroll.content_offset.x, -scroll.content_offset.y);
            }

            if opaque {
                continue;
            }

            let children = self.tree.children(pending.id);
            if children.is_empty() {
                continue;
            }
            if pending.depth >= self.config.max_depth {
                // Hidden children would have been skipped anyway
                let truncated = children
                    .iter()
                    .any(|&child| self.tree.inspect(child).is_some_and(|info| is_visible(&info)));
                if truncated {
                    trace!(
                        target: "capture_gate::scanner",
                        node = pending.id.0,
                        depth = pending.depth,
                        "depth limit reached, pruning subtree"
                    );
                    self.result.did_bail_out_early = true;
                }
                continue;
            }

            for (ordinal, child) in children.into_iter().enumerate().rev() {
                stack.push(Pending {
                    id: child,
                    depth: pending.depth + 1,
                    origin: child_origin,
                    ordinal,
                    in_animated: pending.in_animated || animating,
                });
            }
        }
    }

    /// Append the frame to its privacy list. Returns whether the node is an
    /// opaque surface whose internals are not traversed.
    fn record_privacy(&mut self, kind: NodeKind, masked: bool, frame: Rect) -> bool {
        let config = self.config;
        let list = match kind {
            NodeKind::TextInput if config.detect_text_inputs => {
                Some(&mut self.result.text_input_frames)
            }
            NodeKind::CameraPreview if config.detect_camera_views => {
                Some(&mut self.result.camera_frames)
            }
            NodeKind::VideoLayer if config.detect_video_layers => {
                Some(&mut self.result.video_frames)
            }
            NodeKind::WebView if config.detect_web_views => Some(&mut self.result.web_view_frames),
            _ => None,
        };
        match list {
            Some(list) => list.push(frame),
            None if masked => self.result.text_input_frames.push(frame),
            None => {}
        }

        matches!(
            kind,
            NodeKind::TextInput | NodeKind::CameraPreview | NodeKind::VideoLayer | NodeKind::WebView
        )
    }

    fn record_map(&mut self, id: NodeId, info: &NodeInfo, frame: Rect) {
        if !self.config.detect_map_views {
            return;
        }
        self.result.has_map_view = true;
        self.result.map_view_frames.push(frame);
        self.result.map_view_handles.push(NodeHandle { id, frame });
        self.result.map_active |= info.map_camera_moving;
    }

    fn over_budget(&self) -> bool {
        match self.budget {
            Some(budget) => {
                self.result.total_views_scanned % BUDGET_CHECK_INTERVAL == 0
                    && self.started.elapsed() > budget
            }
            None => false,
        }
    }

    fn halt(&mut self, limit: &'static str) {
        debug!(
            target: "capture_gate::scanner",
            limit,
            views = self.result.total_views_scanned,
            "scan bailed out early"
        );
        self.result.did_bail_out_early = true;
        self.halted = true;
    }

    fn finish(mut self) -> ScanResult {
        self.result.screen_frame = self.screen;
        let screen_area = self.screen.area();
        self.result.animation_area_ratio = if screen_area > 0.0 {
            (self.animated_area / screen_area).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.result
    }
}
