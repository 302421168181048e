// src/core/engine.rs
//
// Decision fusion engine: the top-level orchestrator for one detection
// request, and the only stateful policy in the crate.

use std::time::Instant;

use log::warn;

use crate::config::{EngineConfig, HeuristicThresholds};
use crate::core::analysis::{analyze_symmetry, analyze_ventricles, detect_lesions, LesionScan};
use crate::core::classifier::{ClassifierHandle, ClassifierOutput, Device, TrustState};
use crate::core::normalizer::{decode_image, FormatHint};
use crate::detection::{
    ConfidenceLevel, DetectionError, DetectionResult, LesionCandidate, Prediction,
};

/// The reconciled verdict before timing/device metadata is attached.
#[derive(Debug, Clone)]
pub struct FusedDecision {
    pub prediction: Prediction,
    pub hemorrhage_probability: f32,
    pub no_hemorrhage_probability: f32,
    pub confidence: ConfidenceLevel,
    pub lesion_boxes: Vec<LesionCandidate>,
}

/// Reconcile the classifier and heuristic signals into one verdict.
///
/// Two explicit branches, keyed on the classifier trust state:
///
/// - Fallback: the classifier's numbers are untrustworthy and are
///   overridden. A heuristic positive forces a hemorrhage call with the
///   probability floored high enough that confidence grading stays
///   meaningful; otherwise a low fixed probability.
/// - Trained: the classifier's probability decides. The heuristic detector
///   is artifact-prone and may not override a negative call; disagreement
///   is logged as an observability signal only.
///
/// Bounding boxes are surfaced only on a positive fused prediction; boxes
/// attached to a negative call would be misleading, so the list is forced
/// empty regardless of what the heuristic found.
pub fn fuse_signals(
    classifier: ClassifierOutput,
    lesions: &LesionScan,
    thresholds: &HeuristicThresholds,
    close_call_downgrade: Option<f32>,
) -> FusedDecision {
    let (prediction, p_hemorrhage, p_no_hemorrhage) = match classifier.trust {
        TrustState::FallbackRandom => {
            if lesions.positive {
                let p = classifier
                    .p_hemorrhage
                    .max(thresholds.fallback_positive_prob);
                (Prediction::Hemorrhage, p, 1.0 - p)
            } else {
                let p = thresholds.fallback_negative_prob;
                (Prediction::NoHemorrhage, p, 1.0 - p)
            }
        }
        TrustState::Trained => {
            let positive = classifier.p_hemorrhage > 0.5;
            if !positive && lesions.positive {
                warn!(
                    "heuristic detector found {} foreground px (threshold {:.1}) but the \
                     trained classifier is negative (p={:.3}); keeping the classifier verdict",
                    lesions.foreground_pixels, lesions.threshold_used, classifier.p_hemorrhage
                );
            }
            let prediction = if positive {
                Prediction::Hemorrhage
            } else {
                Prediction::NoHemorrhage
            };
            (prediction, classifier.p_hemorrhage, classifier.p_no_hemorrhage)
        }
    };

    let max_prob = p_hemorrhage.max(p_no_hemorrhage);
    let gap = (p_hemorrhage - p_no_hemorrhage).abs();
    let confidence = ConfidenceLevel::grade(max_prob, gap, close_call_downgrade);

    let lesion_boxes = if prediction.is_positive() {
        lesions.candidates.clone()
    } else {
        Vec::new()
    };

    FusedDecision {
        prediction,
        hemorrhage_probability: p_hemorrhage,
        no_hemorrhage_probability: p_no_hemorrhage,
        confidence,
        lesion_boxes,
    }
}

/// Long-lived detection service context. Owns the classifier singleton and
/// the resolved compute device; one instance serves many requests.
#[derive(Debug)]
pub struct HemorrhageEngine {
    config: EngineConfig,
    device: Device,
    classifier: ClassifierHandle,
}

impl HemorrhageEngine {
    pub fn new(config: EngineConfig) -> Self {
        let device = Device::detect();
        let classifier = ClassifierHandle::new(config.model_path.clone());
        Self {
            config,
            device,
            classifier,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The crate's single external operation: decode, analyze, fuse.
    ///
    /// The classifier path and the heuristic path have no data dependency
    /// and run on separate rayon tasks; both only read the shared views.
    pub fn run_detection(
        &self,
        bytes: &[u8],
        hint: FormatHint,
    ) -> Result<DetectionResult, DetectionError> {
        let start = Instant::now();
        let views = decode_image(bytes, hint)?;
        let thresholds = &self.config.thresholds;

        let (classified, (lesions, symmetry, ventricle)) = rayon::join(
            || self.classifier.get().classify(&views.classify_view),
            || {
                let lesions = detect_lesions(&views.spatial_view, thresholds);
                let symmetry = analyze_symmetry(&views.spatial_view, thresholds);
                let ventricle = analyze_ventricles(&views.spatial_view, &symmetry, thresholds);
                (lesions, symmetry, ventricle)
            },
        );

        let classifier_output = classified.map_err(|e| DetectionError::Inference {
            detail: format!("{e:#}"),
            duration_ms: elapsed_ms(start),
            device: self.device.as_str().to_string(),
        })?;

        let fused = fuse_signals(
            classifier_output,
            &lesions,
            thresholds,
            self.config.close_call_downgrade,
        );

        Ok(DetectionResult {
            prediction: fused.prediction,
            hemorrhage_probability: fused.hemorrhage_probability,
            no_hemorrhage_probability: fused.no_hemorrhage_probability,
            confidence: fused.confidence,
            trust: classifier_output.trust,
            lesion_boxes: fused.lesion_boxes,
            midline_shift: symmetry.has_shift,
            midline_detail: symmetry.detail,
            ventricle_abnormal: ventricle.is_abnormal,
            ventricle_detail: ventricle.detail,
            duration_ms: elapsed_ms(start),
            device: self.device.as_str().to_string(),
        })
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
