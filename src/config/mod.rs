// src/config/mod.rs
//
// Engine configuration: every threshold the heuristic analyzers use lives
// here as a named field instead of a literal buried in the algorithms.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default location of the classifier weight checkpoint, relative to the
/// working directory. Overridable via `EngineConfig` or the CLI.
pub const DEFAULT_MODEL_PATH: &str = "models/hemorrhage_weights.npz";

/// Thresholds and constants for the heuristic analyzers.
///
/// These were tuned against non-contrast head CT slices rescaled to the
/// 0-255 range; the defaults reproduce the shipped behavior exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicThresholds {
    /// Fraction of width/height masked out on each side before lesion
    /// search, to exclude skull and edge artifacts.
    pub border_margin_frac: f32,
    /// Intensities at or below this are treated as background and ignored
    /// when computing the dynamic threshold.
    pub intensity_floor: u8,
    /// Dynamic threshold = mean + this multiplier * std-dev.
    pub sigma_multiplier: f32,
    /// Lower clamp for the dynamic threshold.
    pub threshold_min: f32,
    /// Upper clamp for the dynamic threshold.
    pub threshold_max: f32,
    /// Pixels above this are residual bone/metal, not blood; excluded from
    /// the foreground even when above the dynamic threshold.
    pub brightness_ceiling: u8,
    /// Minimum foreground pixel count for a heuristic-positive verdict.
    pub min_lesion_pixels: usize,
    /// Bounding boxes are expanded by this many pixels on every side, then
    /// clamped to image bounds.
    pub box_margin_px: u32,
    /// Mean mirrored-hemisphere difference above which a midline shift is
    /// flagged.
    pub shift_threshold: f32,
    /// Side of the central ventricle ROI as a fraction of the shorter image
    /// dimension.
    pub ventricle_roi_frac: f32,
    /// Central ROI mean above this suggests ventricular hemorrhage or
    /// another high-density lesion.
    pub ventricle_high_density: f32,
    /// Central ROI mean above this, combined with a midline shift, suggests
    /// ventricular compression.
    pub ventricle_low_density: f32,
    /// Probability floor applied when the fallback branch forces a positive
    /// prediction, so confidence grading stays meaningful.
    pub fallback_positive_prob: f32,
    /// Fixed hemorrhage probability reported by the fallback branch on a
    /// heuristic-negative image.
    pub fallback_negative_prob: f32,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self {
            border_margin_frac: 0.15,
            intensity_floor: 10,
            sigma_multiplier: 2.0,
            threshold_min: 110.0,
            threshold_max: 230.0,
            brightness_ceiling: 250,
            min_lesion_pixels: 50,
            box_margin_px: 10,
            shift_threshold: 30.0,
            ventricle_roi_frac: 0.24,
            ventricle_high_density: 130.0,
            ventricle_low_density: 80.0,
            fallback_positive_prob: 0.85,
            fallback_negative_prob: 0.1,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the NPZ weight checkpoint. A missing or unreadable file is
    /// not fatal: the classifier falls back to random parameters and the
    /// trust state records that.
    pub model_path: PathBuf,
    /// Heuristic analyzer thresholds.
    pub thresholds: HeuristicThresholds,
    /// Optional stricter confidence grading: when the absolute gap between
    /// the two class probabilities is below this margin, the confidence
    /// level is downgraded to Low even if the max probability alone would
    /// grade Medium. `None` disables the downgrade.
    pub close_call_downgrade: Option<f32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            thresholds: HeuristicThresholds::default(),
            close_call_downgrade: None,
        }
    }
}

impl EngineConfig {
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_sane() {
        let t = HeuristicThresholds::default();
        assert!(t.threshold_min < t.threshold_max);
        assert!(t.border_margin_frac > 0.0 && t.border_margin_frac < 0.5);
        assert!(t.fallback_positive_prob >= 0.85);
        assert!(t.fallback_negative_prob < 0.5);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = EngineConfig::default().with_model_path("weights/custom.npz");
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model_path, config.model_path);
        assert_eq!(
            back.thresholds.min_lesion_pixels,
            config.thresholds.min_lesion_pixels
        );
    }
}
