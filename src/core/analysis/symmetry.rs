// src/core/analysis/symmetry.rs
//
// Bilateral symmetry comparison between mirrored hemispheres. Assumes the
// slice is roughly centered and un-rotated; no registration is attempted.

use log::debug;

use crate::config::HeuristicThresholds;
use crate::core::normalizer::RasterImage;
use crate::detection::SymmetryFinding;

/// Compare the left hemisphere against the horizontally mirrored right
/// hemisphere. The mean absolute difference, restricted to the same
/// vertical band the lesion detector masks to, is the asymmetry score.
pub fn analyze_symmetry(view: &RasterImage, t: &HeuristicThresholds) -> SymmetryFinding {
    let (w, h) = (view.width(), view.height());
    let half = w / 2;
    let my = (h as f32 * t.border_margin_frac) as u32;

    let mut sum = 0u64;
    let mut n = 0u64;
    for y in my..h.saturating_sub(my) {
        let row = view.row(y);
        for x in 0..half {
            // Mirror: column x on the left pairs with column w-1-x on the
            // right. For odd widths the center column is skipped, which
            // matches cropping both halves to equal width.
            let left = row[x as usize];
            let right = row[(w - 1 - x) as usize];
            sum += left.abs_diff(right) as u64;
            n += 1;
        }
    }

    let asymmetry_score = if n > 0 { sum as f32 / n as f32 } else { 0.0 };
    let has_shift = asymmetry_score > t.shift_threshold;
    debug!("symmetry: score {asymmetry_score:.2}, shift = {has_shift}");

    let detail = if has_shift {
        format!(
            "hemispheric asymmetry {asymmetry_score:.1} exceeds {:.1}: midline shift suspected",
            t.shift_threshold
        )
    } else {
        format!("hemispheres within symmetry tolerance (asymmetry {asymmetry_score:.1})")
    };

    SymmetryFinding {
        has_shift,
        asymmetry_score,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrored_image_scores_zero() {
        // Build an arbitrary left half and mirror it exactly.
        let (w, h) = (256u32, 256u32);
        let mut pixels = vec![0u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w / 2 {
                let v = ((x * 7 + y * 3) % 251) as u8;
                pixels[(y * w + x) as usize] = v;
                pixels[(y * w + (w - 1 - x)) as usize] = v;
            }
        }
        let view = RasterImage::from_raw(w, h, pixels);
        let finding = analyze_symmetry(&view, &HeuristicThresholds::default());
        assert_eq!(finding.asymmetry_score, 0.0);
        assert!(!finding.has_shift);
    }

    #[test]
    fn test_one_sided_density_flags_shift() {
        let (w, h) = (256u32, 256u32);
        let mut pixels = vec![40u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w / 2 {
                pixels[(y * w + x) as usize] = 180;
            }
        }
        let view = RasterImage::from_raw(w, h, pixels);
        let finding = analyze_symmetry(&view, &HeuristicThresholds::default());
        assert!(finding.has_shift);
        assert!((finding.asymmetry_score - 140.0).abs() < 1e-3);
        assert!(finding.detail.contains("midline shift"));
    }

    #[test]
    fn test_mild_asymmetry_stays_below_threshold() {
        let (w, h) = (256u32, 256u32);
        let mut pixels = vec![100u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w / 2 {
                pixels[(y * w + x) as usize] = 110; // 10 levels of difference
            }
        }
        let view = RasterImage::from_raw(w, h, pixels);
        let finding = analyze_symmetry(&view, &HeuristicThresholds::default());
        assert!(!finding.has_shift);
        assert!((finding.asymmetry_score - 10.0).abs() < 1e-3);
    }
}
