//! Final detection artifact and its supporting evidence types.

use serde::{Deserialize, Serialize};

use crate::core::classifier::TrustState;

/// Binary clinical verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    Hemorrhage,
    NoHemorrhage,
}

impl Prediction {
    pub fn is_positive(&self) -> bool {
        matches!(self, Prediction::Hemorrhage)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Prediction::Hemorrhage => "hemorrhage",
            Prediction::NoHemorrhage => "no hemorrhage",
        }
    }
}

/// Calibrated confidence grade derived from the class probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Grade from the larger of the two class probabilities. The optional
    /// `close_call_margin` downgrades to Low when the probabilities are
    /// nearly tied, regardless of the max.
    pub fn grade(max_prob: f32, prob_gap: f32, close_call_margin: Option<f32>) -> Self {
        if let Some(margin) = close_call_margin {
            if prob_gap < margin {
                return ConfidenceLevel::Low;
            }
        }
        if max_prob > 0.9 {
            ConfidenceLevel::High
        } else if max_prob > 0.7 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Axis-aligned bounding box of a candidate high-density region, in pixel
/// coordinates of the spatial analysis view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LesionCandidate {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl LesionCandidate {
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Bilateral symmetry evidence from the mirrored-hemisphere comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymmetryFinding {
    pub has_shift: bool,
    /// Mean absolute mirrored difference; zero for a perfectly symmetric
    /// image.
    pub asymmetry_score: f32,
    pub detail: String,
}

/// Central-region density evidence about the cerebral ventricles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VentricleFinding {
    pub is_abnormal: bool,
    pub detail: String,
}

/// Complete result of one detection request. Built exactly once by the
/// fusion engine and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub prediction: Prediction,
    pub hemorrhage_probability: f32,
    pub no_hemorrhage_probability: f32,
    pub confidence: ConfidenceLevel,
    /// Whether the probabilities came from trained weights or the untrained
    /// fallback. Downstream review queues key off this.
    pub trust: TrustState,
    /// Surfaced only when the fused prediction is positive; forced empty on
    /// a negative call even if the heuristic detector found regions.
    pub lesion_boxes: Vec<LesionCandidate>,
    pub midline_shift: bool,
    pub midline_detail: String,
    pub ventricle_abnormal: bool,
    pub ventricle_detail: String,
    pub duration_ms: f64,
    pub device: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_grading_bands() {
        assert_eq!(ConfidenceLevel::grade(0.95, 0.9, None), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::grade(0.9, 0.8, None), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::grade(0.75, 0.5, None), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::grade(0.7, 0.4, None), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::grade(0.55, 0.1, None), ConfidenceLevel::Low);
    }

    #[test]
    fn test_close_call_downgrade() {
        // 0.56 vs 0.44: Medium band would not apply anyway, but 0.75 vs 0.25
        // stays Medium unless the margin is active.
        assert_eq!(ConfidenceLevel::grade(0.75, 0.5, Some(0.6)), ConfidenceLevel::Low);
        assert_eq!(
            ConfidenceLevel::grade(0.75, 0.5, Some(0.2)),
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn test_candidate_containment() {
        let b = LesionCandidate {
            x: 10,
            y: 20,
            width: 5,
            height: 4,
        };
        assert!(b.contains(10, 20));
        assert!(b.contains(14, 23));
        assert!(!b.contains(15, 23));
        assert_eq!(b.area(), 20);
    }
}
