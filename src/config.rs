//! Engine configuration
//!
//! Every timing constant the decision engine uses lives here; nothing is
//! hard-coded in the rule table.

use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::scanner::ScannerConfig;

/// Quiet period after touch/scroll/keyboard activity before capturing
pub const DEFAULT_CAPTURE_GRACE_SECONDS: f64 = 0.5;

/// Suggested re-evaluation cadence while deferring
pub const DEFAULT_POLL_INTERVAL_SECONDS: f64 = 0.1;

/// Longest a capture may be deferred (and a reused frame may age)
pub const DEFAULT_MAX_STALE_SECONDS: f64 = 2.0;

/// Quiet period after a map gesture
pub const DEFAULT_MAP_INTERACTION_WINDOW_SECONDS: f64 = 0.8;

/// Quiet period after a navigation transition starts
pub const DEFAULT_TRANSITION_WINDOW_SECONDS: f64 = 0.4;

/// Animated fraction of the screen above which a capture is deferred
pub const DEFAULT_BIG_ANIMATION_AREA_RATIO: f64 = 0.25;

/// Decision engine timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub capture_grace_seconds: f64,
    pub poll_interval_seconds: f64,
    pub max_stale_seconds: f64,
    pub map_interaction_window_seconds: f64,
    pub transition_window_seconds: f64,
    pub big_animation_area_ratio: f64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            capture_grace_seconds: DEFAULT_CAPTURE_GRACE_SECONDS,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            max_stale_seconds: DEFAULT_MAX_STALE_SECONDS,
            map_interaction_window_seconds: DEFAULT_MAP_INTERACTION_WINDOW_SECONDS,
            transition_window_seconds: DEFAULT_TRANSITION_WINDOW_SECONDS,
            big_animation_area_ratio: DEFAULT_BIG_ANIMATION_AREA_RATIO,
        }
    }
}

impl HeuristicsConfig {
    pub fn with_grace(mut self, seconds: f64) -> Self {
        self.capture_grace_seconds = seconds;
        self
    }

    pub fn with_max_stale(mut self, seconds: f64) -> Self {
        self.max_stale_seconds = seconds;
        self
    }

    pub fn with_poll_interval(mut self, seconds: f64) -> Self {
        self.poll_interval_seconds = seconds;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, GateError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        let durations = [
            ("capture_grace_seconds", self.capture_grace_seconds),
            ("poll_interval_seconds", self.poll_interval_seconds),
            ("max_stale_seconds", self.max_stale_seconds),
            (
                "map_interaction_window_seconds",
                self.map_interaction_window_seconds,
            ),
            ("transition_window_seconds", self.transition_window_seconds),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(GateError::InvalidConfig(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if self.poll_interval_seconds == 0.0 {
            return Err(GateError::InvalidConfig(
                "poll_interval_seconds must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.big_animation_area_ratio) {
            return Err(GateError::InvalidConfig(format!(
                "big_animation_area_ratio must be within 0..1, got {}",
                self.big_animation_area_ratio
            )));
        }
        Ok(())
    }
}

/// Combined configuration accepted by the CLI and the C API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub heuristics: HeuristicsConfig,
    pub scanner: ScannerConfig,
}

impl GateConfig {
    pub fn from_json(json: &str) -> Result<Self, GateError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        self.heuristics.validate()?;
        self.scanner.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = HeuristicsConfig::default();
        assert_eq!(config.capture_grace_seconds, 0.5);
        assert_eq!(config.poll_interval_seconds, 0.1);
        assert_eq!(config.max_stale_seconds, 2.0);
        assert_eq!(config.map_interaction_window_seconds, 0.8);
        assert_eq!(config.transition_window_seconds, 0.4);
        assert_eq!(config.big_animation_area_ratio, 0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = HeuristicsConfig::from_json(r#"{"capture_grace_seconds": 0.3}"#).unwrap();
        assert_eq!(config.capture_grace_seconds, 0.3);
        assert_eq!(config.max_stale_seconds, DEFAULT_MAX_STALE_SECONDS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(HeuristicsConfig::default().with_grace(-1.0).validate().is_err());
        assert!(HeuristicsConfig::default()
            .with_max_stale(f64::NAN)
            .validate()
            .is_err());
        assert!(HeuristicsConfig::default()
            .with_poll_interval(0.0)
            .validate()
            .is_err());

        let mut config = HeuristicsConfig::default();
        config.big_animation_area_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(GateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_gate_config_json() {
        let json = r#"{
            "heuristics": { "max_stale_seconds": 3.0 },
            "scanner": { "max_depth": 8, "masked_native_ids": ["pin"] }
        }"#;
        let config = GateConfig::from_json(json).unwrap();
        assert_eq!(config.heuristics.max_stale_seconds, 3.0);
        assert_eq!(config.scanner.max_depth, 8);
        assert!(config.scanner.masked_native_ids.contains("pin"));

        let reparsed = GateConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_gate_config_rejects_bad_scanner() {
        let json = r#"{ "scanner": { "max_view_count": 0 } }"#;
        assert!(GateConfig::from_json(json).is_err());
    }
}
