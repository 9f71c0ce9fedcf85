//! Scan output

use serde::{Deserialize, Serialize};

use crate::tree::NodeId;
use crate::types::{Rect, Timestamp};

/// A node handle remembered for later probing, with its frame at scan time
/// in primary-container coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeHandle {
    pub id: NodeId,
    pub frame: Rect,
}

/// Everything collected in one traversal
///
/// Rectangles are always in the primary container's coordinate space.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// BLAKE3 hex digest over visited node shapes; `None` if nothing was folded
    pub layout_signature: Option<String>,

    pub text_input_frames: Vec<Rect>,
    pub camera_frames: Vec<Rect>,
    pub video_frames: Vec<Rect>,
    pub web_view_frames: Vec<Rect>,

    /// Map tiles load asynchronously, so maps never feed the signature
    pub has_map_view: bool,
    pub map_view_frames: Vec<Rect>,
    pub map_view_handles: Vec<NodeHandle>,

    pub total_views_scanned: usize,
    pub scan_timestamp: Timestamp,

    pub scroll_active: bool,
    pub bounce_active: bool,
    pub refresh_active: bool,
    pub map_active: bool,

    pub has_any_animations: bool,
    /// Approximate animated fraction of the screen (0..1)
    pub animation_area_ratio: f64,

    pub scroll_containers: Vec<NodeHandle>,
    pub animated_nodes: Vec<NodeHandle>,
    /// Screen rectangle in primary-container coordinates
    pub screen_frame: Rect,

    /// Depth, node-count or time limits were hit; the result is partial
    pub did_bail_out_early: bool,
}

impl ScanResult {
    pub(crate) fn empty(scan_timestamp: Timestamp) -> Self {
        Self {
            scan_timestamp,
            ..Self::default()
        }
    }

    pub fn has_text_inputs(&self) -> bool {
        !self.text_input_frames.is_empty()
    }

    pub fn has_camera_views(&self) -> bool {
        !self.camera_frames.is_empty()
    }

    pub fn has_web_views(&self) -> bool {
        !self.web_view_frames.is_empty()
    }

    pub fn has_video_layers(&self) -> bool {
        !self.video_frames.is_empty()
    }

    pub fn map_view_count(&self) -> usize {
        self.map_view_handles.len()
    }

    /// All rectangles the privacy mask should cover
    pub fn privacy_frames(&self) -> impl Iterator<Item = &Rect> + '_ {
        self.text_input_frames
            .iter()
            .chain(&self.camera_frames)
            .chain(&self.video_frames)
            .chain(&self.web_view_frames)
    }

    /// Whether any motion signal would block a stable capture
    pub fn has_motion(&self) -> bool {
        self.scroll_active
            || self.bounce_active
            || self.refresh_active
            || self.map_active
            || self.has_any_animations
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_frames_order() {
        let mut result = ScanResult::empty(1.0);
        result.web_view_frames.push(Rect::new(3.0, 0.0, 1.0, 1.0));
        result.text_input_frames.push(Rect::new(1.0, 0.0, 1.0, 1.0));
        result.camera_frames.push(Rect::new(2.0, 0.0, 1.0, 1.0));

        let xs: Vec<f64> = result.privacy_frames().map(|r| r.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert!(result.has_text_inputs());
        assert!(!result.has_video_layers());
    }

    #[test]
    fn test_json_round_trip_preserves_handles() {
        let mut result = ScanResult::empty(4.5);
        result.layout_signature = Some("abc".to_string());
        result.scroll_containers.push(NodeHandle {
            id: NodeId(7),
            frame: Rect::new(0.0, 0.0, 320.0, 480.0),
        });

        let parsed = ScanResult::from_json(&result.to_json().unwrap()).unwrap();
        assert_eq!(parsed, result);
    }
}
