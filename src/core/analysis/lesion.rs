// src/core/analysis/lesion.rs
//
// Threshold-based lesion candidate detection. Finds high-density regions
// directly from pixel intensities inside a border-masked ROI. Known
// limitation, kept on purpose: the detector is intensity-threshold based,
// not spatial-cluster based, so multiple disjoint bright spots collapse
// into a single bounding box.

use log::debug;

use crate::config::HeuristicThresholds;
use crate::core::normalizer::RasterImage;
use crate::detection::LesionCandidate;

/// Outcome of one heuristic lesion pass.
#[derive(Debug, Clone)]
pub struct LesionScan {
    /// The heuristic binary verdict, independent of the classifier.
    pub positive: bool,
    /// At most one box today (see module note); empty when negative.
    pub candidates: Vec<LesionCandidate>,
    /// The dynamic threshold actually applied, after clamping.
    pub threshold_used: f32,
    /// Foreground pixel count that the verdict was based on.
    pub foreground_pixels: usize,
}

impl LesionScan {
    fn negative(threshold_used: f32, foreground_pixels: usize) -> Self {
        Self {
            positive: false,
            candidates: Vec::new(),
            threshold_used,
            foreground_pixels,
        }
    }
}

/// Scan the spatial view for high-density lesion candidates.
pub fn detect_lesions(view: &RasterImage, t: &HeuristicThresholds) -> LesionScan {
    let (w, h) = (view.width(), view.height());
    let mx = (w as f32 * t.border_margin_frac) as u32;
    let my = (h as f32 * t.border_margin_frac) as u32;
    if mx * 2 >= w || my * 2 >= h {
        return LesionScan::negative(t.threshold_min, 0);
    }

    // First pass: intensity statistics over the non-background ROI pixels.
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0usize;
    for y in my..h - my {
        for &p in &view.row(y)[mx as usize..(w - mx) as usize] {
            if p > t.intensity_floor {
                let v = p as f64;
                sum += v;
                sum_sq += v * v;
                n += 1;
            }
        }
    }

    let (mean, std_dev) = if n > 0 {
        let mean = sum / n as f64;
        let var = (sum_sq / n as f64 - mean * mean).max(0.0);
        (mean as f32, var.sqrt() as f32)
    } else {
        (0.0, 0.0)
    };

    let threshold =
        (mean + t.sigma_multiplier * std_dev).clamp(t.threshold_min, t.threshold_max);

    // Second pass: binarize and accumulate the foreground bounding box.
    // Pixels above the brightness ceiling are residual bone/metal and are
    // dropped even though they exceed the threshold.
    let mut count = 0usize;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for y in my..h - my {
        let row = view.row(y);
        for x in mx..w - mx {
            let p = row[x as usize];
            if p as f32 > threshold && p <= t.brightness_ceiling {
                count += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    debug!(
        "lesion scan: threshold {threshold:.1} (mean {mean:.1}, sd {std_dev:.1}), \
         {count} foreground px"
    );

    if count <= t.min_lesion_pixels {
        return LesionScan::negative(threshold, count);
    }

    let x0 = min_x.saturating_sub(t.box_margin_px);
    let y0 = min_y.saturating_sub(t.box_margin_px);
    let x1 = (max_x + t.box_margin_px).min(w - 1);
    let y1 = (max_y + t.box_margin_px).min(h - 1);

    LesionScan {
        positive: true,
        candidates: vec![LesionCandidate {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        }],
        threshold_used: threshold,
        foreground_pixels: count,
    }
}
