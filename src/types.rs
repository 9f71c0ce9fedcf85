//! Core value types shared by the scanner and the capture heuristics
//!
//! Geometry is expressed in points of the primary container's coordinate
//! space. Time is a caller-supplied monotonic clock in seconds, so the engine
//! never reads the wall clock itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds on the caller's monotonic clock
pub type Timestamp = f64;

// ============================================================================
// Geometry
// ============================================================================

/// A point in container coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Area in square points (zero for degenerate rectangles)
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Overlapping region of two rectangles, if any
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        let rect = Rect::new(x, y, max_x - x, max_y - y);
        (!rect.is_empty()).then_some(rect)
    }

    /// Rectangle rounded to whole points, used for signature folding
    pub fn rounded(&self) -> [i64; 4] {
        [
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round() as i64,
            self.height.round() as i64,
        ]
    }
}

// ============================================================================
// Capture requests
// ============================================================================

/// Priority of a capture request
///
/// Only `Critical` changes scheduling: navigation and lifecycle captures are
/// never deferred or skipped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Heartbeat captures
    Low,
    /// Tap-driven captures
    #[default]
    Medium,
    /// Scroll-driven captures
    High,
    /// Navigation and app lifecycle
    Critical,
}

impl Importance {
    /// Map the integer codes used across the C boundary (0..=3)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Importance::Low),
            1 => Some(Importance::Medium),
            2 => Some(Importance::High),
            3 => Some(Importance::Critical),
            _ => None,
        }
    }
}

/// What the capture orchestrator should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureAction {
    RenderNow,
    Defer,
    ReuseLast,
}

/// Why a decision was made (closed set, used for diagnostics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    RenderNow,
    DeferTouch,
    DeferScroll,
    DeferBounce,
    DeferRefresh,
    DeferTransition,
    DeferKeyboard,
    DeferMap,
    DeferBigAnimation,
    ReuseSignatureUnchanged,
    DeadlineExpired,
    RenderFailedReuse,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::RenderNow => "render_now",
            DecisionReason::DeferTouch => "defer_touch",
            DecisionReason::DeferScroll => "defer_scroll",
            DecisionReason::DeferBounce => "defer_bounce",
            DecisionReason::DeferRefresh => "defer_refresh",
            DecisionReason::DeferTransition => "defer_transition",
            DecisionReason::DeferKeyboard => "defer_keyboard",
            DecisionReason::DeferMap => "defer_map",
            DecisionReason::DeferBigAnimation => "defer_big_animation",
            DecisionReason::ReuseSignatureUnchanged => "reuse_signature_unchanged",
            DecisionReason::DeadlineExpired => "deadline_expired",
            DecisionReason::RenderFailedReuse => "render_failed_reuse",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluation of the capture heuristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: CaptureAction,
    pub reason: DecisionReason,
    /// Present only when `action` is `Defer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<Timestamp>,
}

impl Decision {
    pub fn render_now(reason: DecisionReason) -> Self {
        Self {
            action: CaptureAction::RenderNow,
            reason,
            defer_until: None,
        }
    }

    pub fn defer(reason: DecisionReason, until: Timestamp) -> Self {
        Self {
            action: CaptureAction::Defer,
            reason,
            defer_until: Some(until),
        }
    }

    pub fn reuse_last(reason: DecisionReason) -> Self {
        Self {
            action: CaptureAction::ReuseLast,
            reason,
            defer_until: None,
        }
    }

    pub fn is_render(&self) -> bool {
        self.action == CaptureAction::RenderNow
    }

    pub fn is_defer(&self) -> bool {
        self.action == CaptureAction::Defer
    }

    pub fn is_reuse(&self) -> bool {
        self.action == CaptureAction::ReuseLast
    }
}
