//! Ordered decision rules
//!
//! Rules are evaluated top to bottom and the first one whose predicate holds
//! decides. The last rule always applies.

use crate::config::HeuristicsConfig;
use crate::heuristics::state::{PendingDefer, SignalRecorder};
use crate::probe::MotionState;
use crate::types::{DecisionReason, Importance, Timestamp};

/// Everything a rule may look at
pub(crate) struct RuleContext<'a> {
    pub config: &'a HeuristicsConfig,
    pub signals: &'a SignalRecorder,
    pub motion: &'a MotionState,
    pub has_map_view: bool,
    pub pending: Option<&'a PendingDefer>,
    pub signature: Option<&'a str>,
    pub now: Timestamp,
    pub has_last_frame: bool,
    pub importance: Importance,
}

impl RuleContext<'_> {
    fn grace(&self) -> f64 {
        self.config.capture_grace_seconds
    }

    fn signature_unchanged(&self) -> bool {
        self.has_last_frame
            && matches!(
                (self.signature, self.signals.last_rendered_signature()),
                (Some(current), Some(last)) if current == last
            )
    }

    fn last_render_stale(&self) -> bool {
        self.signals
            .last_render_time()
            .map_or(false, |t| self.now - t >= self.config.max_stale_seconds)
    }
}

/// What a matching rule produces
pub(crate) enum Verdict {
    RenderNow,
    /// Deadline before the stale cap is applied
    Defer(fn(&RuleContext) -> Timestamp),
    ReuseLast,
}

pub(crate) struct Rule {
    pub reason: DecisionReason,
    pub applies: fn(&RuleContext) -> bool,
    pub verdict: Verdict,
}

fn grace_from_now(ctx: &RuleContext) -> Timestamp {
    ctx.now + ctx.grace()
}

pub(crate) const RULES: &[Rule] = &[
    // A failed capture falls back to the previous frame
    Rule {
        reason: DecisionReason::RenderFailedReuse,
        applies: |ctx| ctx.signals.render_failed() && ctx.has_last_frame,
        verdict: Verdict::ReuseLast,
    },
    // Deferral ran out: capture regardless of ongoing signals
    Rule {
        reason: DecisionReason::DeadlineExpired,
        applies: |ctx| ctx.pending.map_or(false, |pending| ctx.now >= pending.until),
        verdict: Verdict::RenderNow,
    },
    Rule {
        reason: DecisionReason::RenderNow,
        applies: |ctx| ctx.importance == Importance::Critical,
        verdict: Verdict::RenderNow,
    },
    Rule {
        reason: DecisionReason::DeferKeyboard,
        applies: |ctx| ctx.signals.keyboard_animating(),
        verdict: Verdict::Defer(grace_from_now),
    },
    Rule {
        reason: DecisionReason::DeferTouch,
        applies: |ctx| ctx.signals.touched_within(ctx.now, ctx.grace()),
        verdict: Verdict::Defer(|ctx| {
            ctx.signals.last_touch().unwrap_or(ctx.now) + ctx.grace()
        }),
    },
    Rule {
        reason: DecisionReason::DeferScroll,
        applies: |ctx| {
            ctx.motion.scroll_active || ctx.signals.interacted_within(ctx.now, ctx.grace())
        },
        verdict: Verdict::Defer(grace_from_now),
    },
    Rule {
        reason: DecisionReason::DeferBounce,
        applies: |ctx| ctx.motion.bounce_active,
        verdict: Verdict::Defer(grace_from_now),
    },
    Rule {
        reason: DecisionReason::DeferRefresh,
        applies: |ctx| ctx.motion.refresh_active,
        verdict: Verdict::Defer(grace_from_now),
    },
    Rule {
        reason: DecisionReason::DeferTransition,
        applies: |ctx| {
            ctx.signals
                .navigated_within(ctx.now, ctx.config.transition_window_seconds)
        },
        verdict: Verdict::Defer(|ctx| {
            ctx.signals.last_navigation().unwrap_or(ctx.now) + ctx.config.transition_window_seconds
        }),
    },
    Rule {
        reason: DecisionReason::DeferMap,
        applies: |ctx| {
            ctx.motion.map_active
                || ctx
                    .signals
                    .map_interacted_within(ctx.now, ctx.config.map_interaction_window_seconds)
        },
        verdict: Verdict::Defer(|ctx| {
            let window = ctx.config.map_interaction_window_seconds;
            let gesture_end = ctx
                .signals
                .last_map_interaction()
                .filter(|_| ctx.signals.map_interacted_within(ctx.now, window))
                .map(|t| t + window);
            let camera_end = ctx.motion.map_active.then(|| grace_from_now(ctx));
            match (gesture_end, camera_end) {
                (Some(a), Some(b)) => a.max(b),
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => grace_from_now(ctx),
            }
        }),
    },
    Rule {
        reason: DecisionReason::DeferBigAnimation,
        applies: |ctx| animation_blocking(ctx.motion, ctx.config),
        verdict: Verdict::Defer(grace_from_now),
    },
    // Unchanged but the reused frame is getting old
    Rule {
        reason: DecisionReason::DeadlineExpired,
        applies: |ctx| ctx.signature_unchanged() && ctx.last_render_stale(),
        verdict: Verdict::RenderNow,
    },
    // Maps load tiles asynchronously; an unchanged layout says nothing
    Rule {
        reason: DecisionReason::ReuseSignatureUnchanged,
        applies: |ctx| ctx.signature_unchanged() && !ctx.has_map_view,
        verdict: Verdict::ReuseLast,
    },
    Rule {
        reason: DecisionReason::RenderNow,
        applies: |_| true,
        verdict: Verdict::RenderNow,
    },
];

/// Whether the animation state alone would defer a capture
pub(crate) fn animation_blocking(motion: &MotionState, config: &HeuristicsConfig) -> bool {
    motion.has_any_animations && motion.animation_area_ratio > config.big_animation_area_ratio
}
