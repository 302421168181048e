//! Output formatting for CLI results

use std::path::Path;

use anyhow::Result;
use colorful::Colorful;

use crate::detection::{ConfidenceLevel, DetectionResult, Prediction};

/// Format one detection result for terminal output.
pub fn format_report(path: &Path, result: &DetectionResult, verbose: bool) -> String {
    let mut out = String::new();

    let verdict = match result.prediction {
        Prediction::Hemorrhage => "✗ HEMORRHAGE SUSPECTED".to_string().red(),
        Prediction::NoHemorrhage => "✓ NO HEMORRHAGE".to_string().green(),
    };
    out.push_str(&format!("{}\n", path.display().to_string().cyan()));
    out.push_str(&format!(
        "  {} (confidence: {})\n",
        verdict,
        confidence_label(result.confidence)
    ));
    out.push_str(&format!(
        "  P(hemorrhage) = {:.4}, P(no hemorrhage) = {:.4}\n",
        result.hemorrhage_probability, result.no_hemorrhage_probability
    ));

    if !result.trust.is_trained() {
        out.push_str(&format!(
            "  {}\n",
            "⚠ classifier running on untrained fallback weights"
                .to_string()
                .yellow()
        ));
    }

    if !result.lesion_boxes.is_empty() {
        out.push_str("  Lesion candidates:\n");
        for b in &result.lesion_boxes {
            out.push_str(&format!(
                "    • {}x{} at ({}, {})\n",
                b.width, b.height, b.x, b.y
            ));
        }
    }
    if result.midline_shift {
        out.push_str(&format!("  • {}\n", result.midline_detail.clone().yellow()));
    }
    if result.ventricle_abnormal {
        out.push_str(&format!("  • {}\n", result.ventricle_detail.clone().yellow()));
    }

    if verbose {
        out.push_str(&format!("  Midline: {}\n", result.midline_detail));
        out.push_str(&format!("  Ventricles: {}\n", result.ventricle_detail));
        out.push_str(&format!(
            "  Inference: {:.2} ms on {}\n",
            result.duration_ms, result.device
        ));
    }

    out
}

fn confidence_label(level: ConfidenceLevel) -> String {
    match level {
        ConfidenceLevel::High => "high".to_string().green().to_string(),
        ConfidenceLevel::Medium => "medium".to_string().yellow().to_string(),
        ConfidenceLevel::Low => "low".to_string().red().to_string(),
    }
}

/// Emit one result as a JSON object with the source file attached.
pub fn print_json(path: &Path, result: &DetectionResult) -> Result<()> {
    let value = serde_json::json!({
        "file": path.display().to_string(),
        "result": result,
    });
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}
