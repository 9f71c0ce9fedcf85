//! Scanner configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::GateError;

/// Default maximum traversal depth
pub const DEFAULT_MAX_DEPTH: usize = 15;

/// Default maximum number of visible nodes visited per scan
pub const DEFAULT_MAX_VIEW_COUNT: usize = 500;

/// Default wall-clock budget for one scan (milliseconds)
pub const DEFAULT_TIME_BUDGET_MS: u64 = 12;

/// Per-scanner configuration, immutable for the duration of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub detect_text_inputs: bool,
    pub detect_camera_views: bool,
    pub detect_web_views: bool,
    pub detect_video_layers: bool,
    pub detect_map_views: bool,
    /// Native ids that are always masked as text inputs
    pub masked_native_ids: HashSet<String>,
    pub max_depth: usize,
    /// Prevents runaway scans on very large hierarchies
    pub max_view_count: usize,
    /// `None` disables the wall-clock budget
    pub time_budget_ms: Option<u64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            detect_text_inputs: true,
            detect_camera_views: true,
            detect_web_views: true,
            detect_video_layers: true,
            detect_map_views: true,
            masked_native_ids: HashSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_view_count: DEFAULT_MAX_VIEW_COUNT,
            time_budget_ms: Some(DEFAULT_TIME_BUDGET_MS),
        }
    }
}

impl ScannerConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_view_count(mut self, max_view_count: usize) -> Self {
        self.max_view_count = max_view_count;
        self
    }

    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget_ms = budget.map(|d| d.as_millis() as u64);
        self
    }

    pub fn with_masked_native_id(mut self, native_id: impl Into<String>) -> Self {
        self.masked_native_ids.insert(native_id.into());
        self
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    /// Reject configurations that would make every scan bail immediately
    pub fn validate(&self) -> Result<(), GateError> {
        if self.max_view_count == 0 {
            return Err(GateError::InvalidConfig(
                "max_view_count must be at least 1".to_string(),
            ));
        }
        if self.time_budget_ms == Some(0) {
            return Err(GateError::InvalidConfig(
                "time_budget_ms must be positive or null".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.max_view_count, 500);
        assert!(config.detect_text_inputs);
        assert!(config.masked_native_ids.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{ "max_depth": 4, "masked_native_ids": ["card"] }"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_view_count, DEFAULT_MAX_VIEW_COUNT);
        assert!(config.masked_native_ids.contains("card"));
    }

    #[test]
    fn test_zero_view_count_rejected() {
        let config = ScannerConfig::default().with_max_view_count(0);
        assert!(config.validate().is_err());
    }
}
