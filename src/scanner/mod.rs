//! Single-pass view hierarchy scanning
//!
//! One bounded traversal collects both the layout signature used for change
//! detection and the privacy-sensitive regions the mask renderer needs, plus
//! the motion facts the capture heuristics consume. Doing both in one walk
//! avoids paying for the traversal twice on the capture path.
//!
//! Pipeline position: ViewTree → Scanner → ScanResult → CaptureHeuristics

mod classify;
pub mod config;
pub mod result;
mod signature;
mod traversal;

pub use classify::{is_visible, MIN_VISIBLE_ALPHA};
pub use config::{ScannerConfig, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VIEW_COUNT, DEFAULT_TIME_BUDGET_MS};
pub use result::{NodeHandle, ScanResult};
pub use traversal::ViewHierarchyScanner;

pub(crate) use classify::scroll_motion;
