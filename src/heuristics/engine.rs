//! Capture decision engine

use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::HeuristicsConfig;
use crate::error::GateError;
use crate::heuristics::rules::{animation_blocking, RuleContext, Verdict, RULES};
use crate::heuristics::state::{PendingDefer, SignalRecorder};
use crate::probe::{MotionState, ProbeOutcome, ProbeTargets, StabilityProbe};
use crate::scanner::ScanResult;
use crate::tree::ViewTree;
use crate::types::{CaptureAction, Decision, DecisionReason, Importance, Timestamp};

/// Decides, per capture tick, whether to render, defer or reuse
///
/// One instance per capture session. Not thread-safe: signals recorded from
/// other contexts must be marshalled onto the owning context first.
#[derive(Debug, Clone)]
pub struct CaptureHeuristics {
    config: HeuristicsConfig,
    signals: SignalRecorder,
    motion: MotionState,
    has_map_view: bool,
    pending: Option<PendingDefer>,
    probe: StabilityProbe,
    targets: ProbeTargets,
    instance_id: Uuid,
    decisions: u64,
}

impl Default for CaptureHeuristics {
    fn default() -> Self {
        Self::new(HeuristicsConfig::default())
    }
}

impl CaptureHeuristics {
    pub fn new(config: HeuristicsConfig) -> Self {
        Self {
            config,
            signals: SignalRecorder::new(),
            motion: MotionState::default(),
            has_map_view: false,
            pending: None,
            probe: StabilityProbe::new(),
            targets: ProbeTargets::default(),
            instance_id: Uuid::new_v4(),
            decisions: 0,
        }
    }

    /// Build with a validated configuration
    pub fn try_new(config: HeuristicsConfig) -> Result<Self, GateError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &HeuristicsConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: HeuristicsConfig) -> Result<(), GateError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn signals(&self) -> &SignalRecorder {
        &self.signals
    }

    pub fn motion(&self) -> &MotionState {
        &self.motion
    }

    pub fn pending_defer(&self) -> Option<&PendingDefer> {
        self.pending.as_ref()
    }

    pub fn has_pending_defer(&self) -> bool {
        self.pending.is_some()
    }

    /// Handles from the last scan that the stability probe re-checks
    pub fn probe_targets(&self) -> &ProbeTargets {
        &self.targets
    }

    /// Suggested delay before re-evaluating a deferred capture
    pub fn poll_interval(&self) -> f64 {
        self.config.poll_interval_seconds
    }

    pub fn consecutive_reuse(&self) -> u32 {
        self.signals.consecutive_reuse()
    }

    pub fn decisions_made(&self) -> u64 {
        self.decisions
    }

    /// Whether the current animation state alone would defer a capture
    pub fn animation_blocking(&self) -> bool {
        animation_blocking(&self.motion, &self.config)
    }

    // ------------------------------------------------------------------
    // Signal recording
    // ------------------------------------------------------------------

    pub fn record_touch(&mut self, t: Timestamp) {
        self.signals.record_touch(t);
    }

    pub fn record_interaction(&mut self, t: Timestamp) {
        self.signals.record_interaction(t);
    }

    pub fn record_map_interaction(&mut self, t: Timestamp) {
        self.signals.record_map_interaction(t);
    }

    pub fn record_navigation(&mut self, t: Timestamp) {
        self.signals.record_navigation(t);
    }

    pub fn set_keyboard_animating(&mut self, animating: bool) {
        self.signals.set_keyboard_animating(animating);
    }

    pub fn record_rendered_signature(&mut self, signature: Option<String>, t: Timestamp) {
        self.signals.record_rendered_signature(signature, t);
    }

    pub fn invalidate_signature(&mut self) {
        self.signals.invalidate_signature();
    }

    /// The last capture failed; the next decision falls back to reuse
    pub fn report_render_failure(&mut self) {
        debug!(target: "capture_gate::heuristics", "render failure reported");
        self.signals.record_render_failure();
    }

    /// Forget every signal, the motion state and any pending deferral
    pub fn reset(&mut self) {
        self.signals.reset();
        self.motion = MotionState::default();
        self.has_map_view = false;
        self.pending = None;
        self.targets = ProbeTargets::default();
        debug!(target: "capture_gate::heuristics", instance = %self.instance_id, "reset");
    }

    // ------------------------------------------------------------------
    // Scan feeds
    // ------------------------------------------------------------------

    /// Adopt motion flags and probe targets from a fresh scan
    pub fn update_with_scan_result(&mut self, scan: &ScanResult) {
        self.motion = MotionState::from_scan(scan);
        self.has_map_view = scan.has_map_view;
        self.targets = ProbeTargets::from_scan(scan);
    }

    /// Refresh motion flags by re-checking the last scan's handles only
    pub fn update_with_stability_probe<T: ViewTree + ?Sized>(
        &mut self,
        tree: &T,
        now: Timestamp,
    ) -> ProbeOutcome {
        let outcome = self.probe.probe(tree, &self.targets);
        self.motion = outcome.motion;
        trace!(
            target: "capture_gate::heuristics",
            now,
            stale = outcome.stale_handles,
            still = outcome.motion.is_still(),
            "motion refreshed from probe"
        );
        outcome
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Evaluate and commit a decision
    pub fn decide(
        &mut self,
        signature: Option<&str>,
        now: Timestamp,
        has_last_frame: bool,
        importance: Importance,
    ) -> Decision {
        let decision = self.peek(signature, now, has_last_frame, importance);
        self.commit(&decision, now);
        decision
    }

    /// Feed a scan (if any) and decide on its signature
    pub fn decide_with_scan(
        &mut self,
        scan: Option<&ScanResult>,
        now: Timestamp,
        has_last_frame: bool,
        importance: Importance,
    ) -> Decision {
        if let Some(scan) = scan {
            self.update_with_scan_result(scan);
        }
        let signature = scan.and_then(|scan| scan.layout_signature.as_deref());
        self.decide(signature, now, has_last_frame, importance)
    }

    /// Evaluate without changing any state
    pub fn peek(
        &self,
        signature: Option<&str>,
        now: Timestamp,
        has_last_frame: bool,
        importance: Importance,
    ) -> Decision {
        let ctx = RuleContext {
            config: &self.config,
            signals: &self.signals,
            motion: &self.motion,
            has_map_view: self.has_map_view,
            pending: self.pending.as_ref(),
            signature,
            now,
            has_last_frame,
            importance,
        };

        let Some(rule) = RULES.iter().find(|rule| (rule.applies)(&ctx)) else {
            return Decision::render_now(DecisionReason::RenderNow);
        };
        match rule.verdict {
            Verdict::RenderNow => Decision::render_now(rule.reason),
            Verdict::ReuseLast => Decision::reuse_last(rule.reason),
            Verdict::Defer(deadline) => {
                Decision::defer(rule.reason, self.capped_deadline(deadline(&ctx), now))
            }
        }
    }

    /// Bound a deferral by the start of the current deferral run plus the
    /// staleness limit
    fn capped_deadline(&self, until: Timestamp, now: Timestamp) -> Timestamp {
        let started_at = self.pending.map_or(now, |pending| pending.started_at);
        until.min(started_at + self.config.max_stale_seconds)
    }

    fn commit(&mut self, decision: &Decision, now: Timestamp) {
        self.decisions += 1;
        self.signals.clear_render_failure();

        match (decision.action, decision.defer_until) {
            (CaptureAction::Defer, Some(until)) => {
                let started_at = self.pending.map_or(now, |pending| pending.started_at);
                self.pending = Some(PendingDefer {
                    started_at,
                    until,
                    reason: decision.reason,
                });
            }
            (CaptureAction::ReuseLast, _) => {
                self.pending = None;
                self.signals.note_reuse();
            }
            _ => self.pending = None,
        }

        debug!(
            target: "capture_gate::heuristics",
            now,
            action = ?decision.action,
            reason = %decision.reason,
            defer_until = ?decision.defer_until,
            consecutive_reuse = self.signals.consecutive_reuse(),
            "capture decision"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> CaptureHeuristics {
        CaptureHeuristics::default()
    }

    fn assert_defer(decision: Decision, reason: DecisionReason, until: Timestamp) {
        assert_eq!(decision.action, CaptureAction::Defer);
        assert_eq!(decision.reason, reason);
        let actual = decision.defer_until.unwrap();
        assert!(
            (actual - until).abs() < 1e-9,
            "defer_until {} != {}",
            actual,
            until
        );
    }

    fn scan_with(signature: &str) -> ScanResult {
        ScanResult {
            layout_signature: Some(signature.to_string()),
            total_views_scanned: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_decision_renders() {
        let mut gate = engine();
        let decision = gate.decide(Some("abc"), 0.0, false, Importance::Medium);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
        assert!(!gate.has_pending_defer());
    }

    #[test]
    fn test_touch_defers_until_grace_then_deadline_expires() {
        let mut gate = engine();
        gate.record_touch(0.0);

        let decision = gate.decide(None, 0.2, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferTouch, 0.5);

        let decision = gate.decide(None, 0.6, true, Importance::Medium);
        assert_eq!(
            decision,
            Decision::render_now(DecisionReason::DeadlineExpired)
        );
        assert!(!gate.has_pending_defer());
    }

    #[test]
    fn test_critical_always_renders() {
        let mut gate = engine();
        gate.record_touch(1.0);
        gate.set_keyboard_animating(true);
        gate.record_rendered_signature(Some("abc".to_string()), 0.9);

        let decision = gate.decide(Some("abc"), 1.0, true, Importance::Critical);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
    }

    #[test]
    fn test_unchanged_signature_reuses_last_frame() {
        let mut gate = engine();
        gate.record_rendered_signature(Some("abc".to_string()), 1.0);

        let decision = gate.decide(Some("abc"), 1.5, true, Importance::Low);
        assert_eq!(
            decision,
            Decision::reuse_last(DecisionReason::ReuseSignatureUnchanged)
        );
        gate.decide(Some("abc"), 1.6, true, Importance::Low);
        assert_eq!(gate.consecutive_reuse(), 2);

        let decision = gate.decide(Some("abd"), 1.7, true, Importance::Low);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
    }

    #[test]
    fn test_unchanged_signature_without_last_frame_renders() {
        let mut gate = engine();
        gate.record_rendered_signature(Some("abc".to_string()), 1.0);
        let decision = gate.decide(Some("abc"), 1.5, false, Importance::Low);
        assert!(decision.is_render());
    }

    #[test]
    fn test_stale_reuse_forces_render() {
        let mut gate = engine();
        gate.record_rendered_signature(Some("abc".to_string()), 1.0);
        let decision = gate.decide(Some("abc"), 3.0, true, Importance::Low);
        assert_eq!(
            decision,
            Decision::render_now(DecisionReason::DeadlineExpired)
        );
    }

    #[test]
    fn test_invalidated_signature_renders() {
        let mut gate = engine();
        gate.record_rendered_signature(Some("abc".to_string()), 1.0);
        gate.invalidate_signature();
        let decision = gate.decide(Some("abc"), 1.2, true, Importance::Low);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
    }

    #[test]
    fn test_render_failure_reuses_once() {
        let mut gate = engine();
        gate.record_rendered_signature(Some("abc".to_string()), 1.0);
        gate.report_render_failure();

        let decision = gate.decide(Some("xyz"), 1.2, true, Importance::Critical);
        assert_eq!(
            decision,
            Decision::reuse_last(DecisionReason::RenderFailedReuse)
        );

        let decision = gate.decide(Some("xyz"), 1.3, true, Importance::Medium);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
    }

    #[test]
    fn test_render_failure_without_last_frame_falls_through() {
        let mut gate = engine();
        gate.report_render_failure();
        let decision = gate.decide(None, 1.0, false, Importance::Medium);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
        assert!(!gate.signals().render_failed());
    }

    #[test]
    fn test_keyboard_defers_from_now() {
        let mut gate = engine();
        gate.set_keyboard_animating(true);
        let decision = gate.decide(None, 2.0, true, Importance::High);
        assert_defer(decision, DecisionReason::DeferKeyboard, 2.5);
    }

    #[test]
    fn test_scroll_bounce_refresh_reasons() {
        let mut gate = engine();
        let mut scan = scan_with("abc");
        scan.scroll_active = true;
        scan.bounce_active = true;
        let decision = gate.decide_with_scan(Some(&scan), 1.0, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferScroll, 1.5);

        let mut gate = engine();
        scan.scroll_active = false;
        let decision = gate.decide_with_scan(Some(&scan), 1.0, true, Importance::Medium);
        assert_eq!(decision.reason, DecisionReason::DeferBounce);

        let mut gate = engine();
        scan.bounce_active = false;
        scan.refresh_active = true;
        let decision = gate.decide_with_scan(Some(&scan), 1.0, true, Importance::Medium);
        assert_eq!(decision.reason, DecisionReason::DeferRefresh);
    }

    #[test]
    fn test_recent_interaction_defers_as_scroll() {
        let mut gate = engine();
        gate.record_interaction(1.0);
        let decision = gate.decide(None, 1.1, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferScroll, 1.6);
    }

    #[test]
    fn test_navigation_defers_for_transition_window() {
        let mut gate = engine();
        gate.record_navigation(1.0);
        let decision = gate.decide(None, 1.1, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferTransition, 1.4);
    }

    #[test]
    fn test_map_interaction_defers_and_disables_reuse() {
        let mut gate = engine();
        let mut scan = scan_with("abc");
        scan.has_map_view = true;
        gate.record_rendered_signature(Some("abc".to_string()), 0.0);
        gate.record_map_interaction(0.5);

        let decision = gate.decide_with_scan(Some(&scan), 1.0, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferMap, 1.3);

        // Gesture window over; map present so unchanged layout still renders
        let decision = gate.decide_with_scan(Some(&scan), 1.3, true, Importance::Medium);
        assert_eq!(
            decision,
            Decision::render_now(DecisionReason::DeadlineExpired)
        );
        let decision = gate.decide_with_scan(Some(&scan), 1.4, true, Importance::Medium);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
    }

    #[test]
    fn test_moving_map_camera_defers() {
        let mut gate = engine();
        let mut scan = scan_with("abc");
        scan.has_map_view = true;
        scan.map_active = true;
        let decision = gate.decide_with_scan(Some(&scan), 2.0, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferMap, 2.5);
    }

    #[test]
    fn test_big_animation_defers_small_does_not() {
        let mut gate = engine();
        let mut scan = scan_with("abc");
        scan.has_any_animations = true;
        scan.animation_area_ratio = 0.1;
        gate.update_with_scan_result(&scan);
        assert!(!gate.animation_blocking());
        let decision = gate.decide(Some("abc"), 1.0, true, Importance::Medium);
        assert!(decision.is_render());

        scan.animation_area_ratio = 0.6;
        gate.update_with_scan_result(&scan);
        assert!(gate.animation_blocking());
        let decision = gate.decide(Some("abc"), 1.1, true, Importance::Medium);
        assert_defer(decision, DecisionReason::DeferBigAnimation, 1.6);
    }

    #[test]
    fn test_continuous_activity_is_capped_by_max_stale() {
        let mut gate = engine();
        let mut now = 0.0;
        let mut last = gate.decide(None, now, true, Importance::Medium);
        while now < 5.0 {
            gate.record_interaction(now);
            last = gate.decide(None, now, true, Importance::Medium);
            if !last.is_defer() {
                break;
            }
            assert!(last.defer_until.unwrap() <= 2.0 + 1e-9);
            now += 0.1;
        }
        assert_eq!(last, Decision::render_now(DecisionReason::DeadlineExpired));
        assert!(now >= 2.0 - 1e-9 && now < 2.1);
    }

    #[test]
    fn test_peek_does_not_commit() {
        let mut gate = engine();
        gate.record_touch(0.0);
        let peeked = gate.peek(None, 0.1, true, Importance::Medium);
        assert!(peeked.is_defer());
        assert!(!gate.has_pending_defer());
        assert_eq!(gate.decisions_made(), 0);

        let decided = gate.decide(None, 0.1, true, Importance::Medium);
        assert_eq!(decided, peeked);
        assert_eq!(gate.pending_defer().map(|p| p.started_at), Some(0.1));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut gate = engine();
        gate.record_touch(0.0);
        gate.decide(None, 0.1, true, Importance::Medium);
        gate.reset();
        assert!(!gate.has_pending_defer());
        let decision = gate.decide(None, 0.2, true, Importance::Medium);
        assert_eq!(decision, Decision::render_now(DecisionReason::RenderNow));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HeuristicsConfig::default().with_grace(-0.1);
        assert!(CaptureHeuristics::try_new(config).is_err());
        let mut gate = engine();
        assert!(gate.set_config(config).is_err());
        assert_eq!(gate.config(), &HeuristicsConfig::default());
    }

    #[test]
    fn test_instances_have_distinct_ids() {
        assert_ne!(engine().instance_id(), engine().instance_id());
    }
}
