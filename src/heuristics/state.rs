//! Signal recorder
//!
//! Cheap O(1) timestamp slots written from touch, gesture, navigation and
//! render callbacks. Slots never move backwards: an older timestamp arriving
//! late is ignored so out-of-order delivery cannot revive a stale signal.

use serde::{Deserialize, Serialize};

use crate::types::{DecisionReason, Timestamp};

/// Most recent user and render signals
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalRecorder {
    last_touch: Option<Timestamp>,
    last_interaction: Option<Timestamp>,
    last_map_interaction: Option<Timestamp>,
    last_navigation: Option<Timestamp>,
    keyboard_animating: bool,
    last_rendered_signature: Option<String>,
    last_render_time: Option<Timestamp>,
    consecutive_reuse: u32,
    render_failed: bool,
}

fn bump(slot: &mut Option<Timestamp>, t: Timestamp) {
    if !t.is_finite() {
        return;
    }
    if slot.map_or(true, |previous| t >= previous) {
        *slot = Some(t);
    }
}

fn within(slot: Option<Timestamp>, now: Timestamp, window: f64) -> bool {
    slot.map_or(false, |t| now - t < window)
}

impl SignalRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_touch(&mut self, t: Timestamp) {
        bump(&mut self.last_touch, t);
    }

    /// Scroll or other continuous interaction
    pub fn record_interaction(&mut self, t: Timestamp) {
        bump(&mut self.last_interaction, t);
    }

    pub fn record_map_interaction(&mut self, t: Timestamp) {
        bump(&mut self.last_map_interaction, t);
    }

    pub fn record_navigation(&mut self, t: Timestamp) {
        bump(&mut self.last_navigation, t);
    }

    pub fn set_keyboard_animating(&mut self, animating: bool) {
        self.keyboard_animating = animating;
    }

    /// A frame was produced for `signature`. Clears the reuse streak and any
    /// reported render failure.
    pub fn record_rendered_signature(&mut self, signature: Option<String>, t: Timestamp) {
        self.last_rendered_signature = signature;
        bump(&mut self.last_render_time, t);
        self.consecutive_reuse = 0;
        self.render_failed = false;
    }

    /// Force the next decision to render even if the layout is unchanged
    pub fn invalidate_signature(&mut self) {
        self.last_rendered_signature = None;
    }

    pub fn record_render_failure(&mut self) {
        self.render_failed = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn touched_within(&self, now: Timestamp, window: f64) -> bool {
        within(self.last_touch, now, window)
    }

    pub fn interacted_within(&self, now: Timestamp, window: f64) -> bool {
        within(self.last_interaction, now, window)
    }

    pub fn map_interacted_within(&self, now: Timestamp, window: f64) -> bool {
        within(self.last_map_interaction, now, window)
    }

    pub fn navigated_within(&self, now: Timestamp, window: f64) -> bool {
        within(self.last_navigation, now, window)
    }

    pub fn last_touch(&self) -> Option<Timestamp> {
        self.last_touch
    }

    pub fn last_interaction(&self) -> Option<Timestamp> {
        self.last_interaction
    }

    pub fn last_map_interaction(&self) -> Option<Timestamp> {
        self.last_map_interaction
    }

    pub fn last_navigation(&self) -> Option<Timestamp> {
        self.last_navigation
    }

    pub fn keyboard_animating(&self) -> bool {
        self.keyboard_animating
    }

    pub fn last_rendered_signature(&self) -> Option<&str> {
        self.last_rendered_signature.as_deref()
    }

    pub fn last_render_time(&self) -> Option<Timestamp> {
        self.last_render_time
    }

    pub fn consecutive_reuse(&self) -> u32 {
        self.consecutive_reuse
    }

    pub fn render_failed(&self) -> bool {
        self.render_failed
    }

    pub(crate) fn note_reuse(&mut self) {
        self.consecutive_reuse = self.consecutive_reuse.saturating_add(1);
    }

    pub(crate) fn clear_render_failure(&mut self) {
        self.render_failed = false;
    }
}

/// An outstanding deferral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingDefer {
    /// When the current run of consecutive deferrals began
    pub started_at: Timestamp,
    pub until: Timestamp,
    pub reason: DecisionReason,
}
