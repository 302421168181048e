// src/core/analysis/ventricle.rs
//
// Central-region density check for the cerebral ventricles. Uses the
// midline-shift flag from the symmetry analyzer as corroborating context
// for the lower-density compression call.

use log::debug;

use crate::config::HeuristicThresholds;
use crate::core::normalizer::RasterImage;
use crate::detection::{SymmetryFinding, VentricleFinding};

/// Inspect a small square ROI at the image center.
pub fn analyze_ventricles(
    view: &RasterImage,
    symmetry: &SymmetryFinding,
    t: &HeuristicThresholds,
) -> VentricleFinding {
    let (w, h) = (view.width(), view.height());
    let side = ((w.min(h) as f32 * t.ventricle_roi_frac) as u32).max(1);
    let x0 = w / 2 - side / 2;
    let y0 = h / 2 - side / 2;
    let mean = view.mean_region(x0, y0, x0 + side, y0 + side);

    debug!("ventricle ROI: {side}x{side} at ({x0},{y0}), mean {mean:.1}");

    if mean > t.ventricle_high_density {
        VentricleFinding {
            is_abnormal: true,
            detail: format!(
                "central density {mean:.1}: suspected ventricular hemorrhage or \
                 high-density lesion"
            ),
        }
    } else if symmetry.has_shift && mean > t.ventricle_low_density {
        VentricleFinding {
            is_abnormal: true,
            detail: format!(
                "central density {mean:.1} with midline shift: ventricular \
                 compression suspected"
            ),
        }
    } else {
        VentricleFinding {
            is_abnormal: false,
            detail: format!("ventricles appear normal (central density {mean:.1})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_view(value: u8) -> RasterImage {
        RasterImage::from_raw(512, 512, vec![value; 512 * 512])
    }

    fn symmetry(has_shift: bool) -> SymmetryFinding {
        SymmetryFinding {
            has_shift,
            asymmetry_score: if has_shift { 45.0 } else { 2.0 },
            detail: String::new(),
        }
    }

    #[test]
    fn test_high_density_flags_hemorrhage() {
        let finding =
            analyze_ventricles(&uniform_view(150), &symmetry(false), &HeuristicThresholds::default());
        assert!(finding.is_abnormal);
        assert!(finding.detail.contains("hemorrhage"));
    }

    #[test]
    fn test_moderate_density_with_shift_flags_compression() {
        let finding =
            analyze_ventricles(&uniform_view(100), &symmetry(true), &HeuristicThresholds::default());
        assert!(finding.is_abnormal);
        assert!(finding.detail.contains("compression"));
    }

    #[test]
    fn test_moderate_density_without_shift_is_normal() {
        let finding =
            analyze_ventricles(&uniform_view(100), &symmetry(false), &HeuristicThresholds::default());
        assert!(!finding.is_abnormal);
    }

    #[test]
    fn test_low_density_is_normal_even_with_shift() {
        let finding =
            analyze_ventricles(&uniform_view(60), &symmetry(true), &HeuristicThresholds::default());
        assert!(!finding.is_abnormal);
        assert!(finding.detail.contains("normal"));
    }
}
