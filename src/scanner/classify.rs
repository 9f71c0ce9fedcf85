//! Node classification, visibility, and motion detection
//!
//! These helpers are shared by the full traversal and the stability probe so
//! both agree on what "visible", "scrolling" and "animating" mean.

use std::collections::HashMap;

use crate::tree::{NodeInfo, NodeKind, ScrollState};
use crate::types::Rect;

/// Nodes at or below this alpha are treated as fully transparent
pub const MIN_VISIBLE_ALPHA: f64 = 0.01;

/// Overscroll smaller than this is treated as settled
const BOUNCE_EPSILON: f64 = 0.5;

/// Type-name fragments that identify sensitive or special surfaces when the
/// accessor gives no explicit hint. Order matters: first match wins.
const TYPE_NAME_RULES: &[(&str, NodeKind)] = &[
    ("MapView", NodeKind::MapView),
    ("GoogleMap", NodeKind::MapView),
    ("WebView", NodeKind::WebView),
    ("PreviewLayer", NodeKind::CameraPreview),
    ("CameraPreview", NodeKind::CameraPreview),
    ("CameraView", NodeKind::CameraPreview),
    ("PlayerLayer", NodeKind::VideoLayer),
    ("PlayerView", NodeKind::VideoLayer),
    ("VideoView", NodeKind::VideoLayer),
    ("TextField", NodeKind::TextInput),
    ("TextInput", NodeKind::TextInput),
    ("EditText", NodeKind::TextInput),
    ("SearchField", NodeKind::TextInput),
    ("UITextView", NodeKind::TextInput),
];

/// Concrete type names seen in practice, classified up front by `prewarm`
const PREWARM_TYPE_NAMES: &[&str] = &[
    "UIView",
    "UILabel",
    "UIImageView",
    "UIScrollView",
    "UITableView",
    "UICollectionView",
    "UITextField",
    "UITextView",
    "UISearchTextField",
    "RCTView",
    "RCTScrollView",
    "RCTUITextField",
    "RCTUITextView",
    "RCTMultilineTextInputView",
    "WKWebView",
    "RNCWebView",
    "AVPlayerLayer",
    "AVPlayerView",
    "AVCaptureVideoPreviewLayer",
    "MKMapView",
    "AIRMapView",
    "AIRGoogleMap",
    "android.widget.EditText",
    "android.webkit.WebView",
    "android.widget.VideoView",
    "androidx.camera.view.PreviewView",
];

/// Classify a type name by fragment rules
fn classify_type_name(type_name: &str) -> NodeKind {
    TYPE_NAME_RULES
        .iter()
        .find(|(fragment, _)| type_name.contains(fragment))
        .map(|(_, kind)| *kind)
        .unwrap_or(NodeKind::Generic)
}

/// Memoised type-name classification
#[derive(Debug, Default)]
pub(crate) struct KindCache {
    known: HashMap<String, NodeKind>,
    warmed: bool,
}

impl KindCache {
    /// Classify a node; explicit hints from the accessor always win
    pub fn classify(&mut self, info: &NodeInfo) -> NodeKind {
        if info.kind != NodeKind::Generic {
            return info.kind;
        }
        if let Some(kind) = self.known.get(info.type_name.as_str()) {
            return *kind;
        }
        let kind = classify_type_name(&info.type_name);
        self.known.insert(info.type_name.clone(), kind);
        kind
    }

    /// Seed the cache with common type names. Returns `false` if it was
    /// already warm.
    pub fn prewarm(&mut self) -> bool {
        if self.warmed {
            return false;
        }
        for name in PREWARM_TYPE_NAMES {
            self.known
                .entry((*name).to_string())
                .or_insert_with(|| classify_type_name(name));
        }
        self.warmed = true;
        true
    }

    pub fn is_warm(&self) -> bool {
        self.warmed
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }
}

/// Whether a node can contribute anything to a captured frame
pub fn is_visible(info: &NodeInfo) -> bool {
    !info.hidden
        && info.alpha > MIN_VISIBLE_ALPHA
        && info.frame.width > 0.0
        && info.frame.height > 0.0
}

/// Motion state derived from one scroll container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScrollMotion {
    pub scrolling: bool,
    pub bouncing: bool,
    pub refreshing: bool,
}

/// Inspect a scroll container whose visible bounds are `viewport`
pub(crate) fn scroll_motion(scroll: &ScrollState, viewport: &Rect) -> ScrollMotion {
    let inset = &scroll.content_inset;
    let offset = &scroll.content_offset;

    let min_y = -inset.top;
    let max_y = (scroll.content_height - viewport.height + inset.bottom).max(min_y);
    let min_x = -inset.left;
    let max_x = (scroll.content_width - viewport.width + inset.right).max(min_x);

    let over_top = offset.y < min_y - BOUNCE_EPSILON;
    let bouncing = over_top
        || offset.y > max_y + BOUNCE_EPSILON
        || offset.x < min_x - BOUNCE_EPSILON
        || offset.x > max_x + BOUNCE_EPSILON;

    ScrollMotion {
        scrolling: scroll.tracking || scroll.dragging || scroll.decelerating,
        bouncing,
        refreshing: scroll.refreshing || (scroll.refresh_control && over_top),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Insets;
    use crate::types::Point;

    fn info(type_name: &str) -> NodeInfo {
        NodeInfo::new(type_name, Rect::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_type_name_classification() {
        let mut cache = KindCache::default();
        assert_eq!(cache.classify(&info("UITextField")), NodeKind::TextInput);
        assert_eq!(cache.classify(&info("RNCWebView")), NodeKind::WebView);
        assert_eq!(cache.classify(&info("AVPlayerLayer")), NodeKind::VideoLayer);
        assert_eq!(
            cache.classify(&info("AVCaptureVideoPreviewLayer")),
            NodeKind::CameraPreview
        );
        assert_eq!(cache.classify(&info("AIRGoogleMap")), NodeKind::MapView);
        assert_eq!(cache.classify(&info("UILabel")), NodeKind::Generic);
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn test_explicit_hint_wins() {
        let mut cache = KindCache::default();
        let node = info("UILabel").with_kind(NodeKind::TextInput);
        assert_eq!(cache.classify(&node), NodeKind::TextInput);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_prewarm_is_idempotent_and_consistent() {
        let mut warm = KindCache::default();
        assert!(warm.prewarm());
        let seeded = warm.len();
        assert!(!warm.prewarm());
        assert_eq!(warm.len(), seeded);

        let mut cold = KindCache::default();
        for name in PREWARM_TYPE_NAMES {
            assert_eq!(warm.classify(&info(name)), cold.classify(&info(name)));
        }
    }

    #[test]
    fn test_visibility() {
        assert!(is_visible(&info("UIView")));
        assert!(!is_visible(&info("UIView").with_hidden(true)));
        assert!(!is_visible(&info("UIView").with_alpha(0.0)));
        assert!(!is_visible(&info("UIView").with_alpha(MIN_VISIBLE_ALPHA)));
        assert!(!is_visible(&NodeInfo::new(
            "UIView",
            Rect::new(0.0, 0.0, 0.0, 20.0)
        )));
    }

    #[test]
    fn test_scroll_motion_at_rest() {
        let scroll = ScrollState {
            content_height: 1000.0,
            content_width: 320.0,
            ..Default::default()
        };
        let motion = scroll_motion(&scroll, &Rect::new(0.0, 0.0, 320.0, 480.0));
        assert_eq!(motion, ScrollMotion::default());
    }

    #[test]
    fn test_scroll_motion_bounce_past_bottom() {
        let scroll = ScrollState {
            content_height: 1000.0,
            content_width: 320.0,
            content_offset: Point::new(0.0, 560.0),
            ..Default::default()
        };
        let motion = scroll_motion(&scroll, &Rect::new(0.0, 0.0, 320.0, 480.0));
        assert!(motion.bouncing);
        assert!(!motion.scrolling);
        assert!(!motion.refreshing);
    }

    #[test]
    fn test_scroll_motion_pull_to_refresh() {
        let scroll = ScrollState {
            content_height: 1000.0,
            content_width: 320.0,
            content_offset: Point::new(0.0, -60.0),
            content_inset: Insets {
                top: 20.0,
                ..Default::default()
            },
            refresh_control: true,
            dragging: true,
            ..Default::default()
        };
        let motion = scroll_motion(&scroll, &Rect::new(0.0, 0.0, 320.0, 480.0));
        assert!(motion.scrolling);
        assert!(motion.bouncing);
        assert!(motion.refreshing);
    }

    #[test]
    fn test_short_content_does_not_bounce() {
        let scroll = ScrollState {
            content_height: 100.0,
            content_width: 320.0,
            ..Default::default()
        };
        let motion = scroll_motion(&scroll, &Rect::new(0.0, 0.0, 320.0, 480.0));
        assert!(!motion.bouncing);
    }
}
