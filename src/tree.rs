//! Visual tree access
//!
//! The scanner and the stability probe only depend on the [`ViewTree`]
//! capability set, never on a concrete UI toolkit. Hosts implement the trait
//! over their native hierarchy; [`crate::schema::SnapshotTree`] implements it
//! over a serialized snapshot.
//!
//! Geometry convention: a container root's `frame` is in screen coordinates;
//! every other node's `frame` is relative to its parent's bounds, and a scroll
//! container's children are additionally shifted by its content offset.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Rect};

/// Opaque handle to a node in a live tree
///
/// Handles are non-owning. A handle may stop resolving at any time (the node
/// was removed); callers check through [`ViewTree::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Classification hint supplied by the accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// No hint; the scanner falls back to type-name matching
    #[default]
    Generic,
    TextInput,
    CameraPreview,
    VideoLayer,
    WebView,
    MapView,
}

/// Kinds of running layer animations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Transform,
    Opacity,
    Position,
    Bounds,
    /// Color, shadow, and similar non-geometric animations
    Other,
}

impl AnimationKind {
    /// Whether the animation moves or fades visible content
    pub fn is_motion(&self) -> bool {
        !matches!(self, AnimationKind::Other)
    }
}

/// Edge insets of a scroll container
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Insets {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub right: f64,
}

/// Live state of a scrollable container
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollState {
    #[serde(default)]
    pub content_offset: Point,
    #[serde(default)]
    pub content_width: f64,
    #[serde(default)]
    pub content_height: f64,
    #[serde(default)]
    pub content_inset: Insets,
    /// Finger is down on the container
    #[serde(default)]
    pub tracking: bool,
    #[serde(default)]
    pub dragging: bool,
    #[serde(default)]
    pub decelerating: bool,
    /// Pull-to-refresh is in its refreshing state
    #[serde(default)]
    pub refreshing: bool,
    /// A pull-to-refresh control is attached
    #[serde(default)]
    pub refresh_control: bool,
}

/// Point-in-time view of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Toolkit type name, used as the signature type tag
    pub type_name: String,
    #[serde(default)]
    pub kind: NodeKind,
    pub frame: Rect,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub hidden: bool,
    /// Host-assigned identifier used for manual masking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<AnimationKind>,
    /// Map camera/region is moving (map surfaces only)
    #[serde(default)]
    pub map_camera_moving: bool,
}

fn default_alpha() -> f64 {
    1.0
}

impl NodeInfo {
    pub fn new(type_name: impl Into<String>, frame: Rect) -> Self {
        Self {
            type_name: type_name.into(),
            kind: NodeKind::Generic,
            frame,
            alpha: 1.0,
            hidden: false,
            native_id: None,
            scroll: None,
            animations: Vec::new(),
            map_camera_moving: false,
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_native_id(mut self, native_id: impl Into<String>) -> Self {
        self.native_id = Some(native_id.into());
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollState) -> Self {
        self.scroll = Some(scroll);
        self
    }

    pub fn with_animation(mut self, kind: AnimationKind) -> Self {
        self.animations.push(kind);
        self
    }

    pub fn with_map_camera_moving(mut self, moving: bool) -> Self {
        self.map_camera_moving = moving;
        self
    }

    /// Whether any transform/opacity/position/bounds animation is running
    pub fn has_motion_animation(&self) -> bool {
        self.animations.iter().any(AnimationKind::is_motion)
    }
}

/// Read-only access to a visual tree
///
/// All calls happen on the context that owns the tree; implementations do not
/// need to be thread-safe.
pub trait ViewTree {
    /// Snapshot a node, or `None` once the handle no longer resolves
    fn inspect(&self, node: NodeId) -> Option<NodeInfo>;

    /// Children in back-to-front order
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Root containers (windows, overlays) in back-to-front order
    fn containers(&self) -> Vec<NodeId>;

    /// Screen rectangle in screen coordinates
    fn screen_bounds(&self) -> Rect;

    fn is_alive(&self, node: NodeId) -> bool {
        self.inspect(node).is_some()
    }
}
