//! HemoScan - Detect intracranial hemorrhage on head CT slices
//!
//! An analysis engine for single head CT slices that combines a
//! convolutional classifier with heuristic computer-vision analyzers and
//! fuses their signals into one clinical-style verdict.
//!
//! ## Features
//!
//! - **Dual-format ingestion**: Raster images (PNG/JPEG/BMP/TIFF) and DICOM
//!   files decode through one normalizer into shared grayscale views
//! - **CNN classifier**: Four conv blocks plus a three-layer head, loaded
//!   from an NPZ checkpoint, with an explicit fallback trust state when no
//!   checkpoint is available
//! - **Heuristic analyzers**: Adaptive-threshold lesion detection,
//!   hemispheric symmetry scoring, and central ventricle density checks
//! - **Decision fusion**: Trust-aware reconciliation of classifier and
//!   heuristic evidence, with graded confidence
//! - **Flexible CLI**: Single-file and batch modes, JSON output, tunable
//!   close-call confidence downgrade
//!
//! ## Module Structure
//!
//! - `core` - Normalization, the classifier, heuristic analyzers, and the
//!   fusion engine
//! - `cli` - Command-line interface
//! - `config` - Engine configuration and heuristic thresholds
//! - `detection` - Detection result and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hemoscan::core::{FormatHint, HemorrhageEngine};
//! use hemoscan::config::EngineConfig;
//!
//! let engine = HemorrhageEngine::new(EngineConfig::default());
//!
//! let bytes = std::fs::read("slice_0042.dcm")?;
//! let result = engine.run_detection(&bytes, FormatHint::from_filename("slice_0042.dcm"))?;
//!
//! println!("{}: p={:.3}", result.prediction.label(), result.hemorrhage_probability);
//! ```
//!
//! ## Trust States
//!
//! | State          | Meaning                            | Fusion behavior                  |
//! |----------------|------------------------------------|----------------------------------|
//! | Trained        | Checkpoint loaded successfully     | Classifier probability decides   |
//! | FallbackRandom | Randomly initialized weights       | Heuristic detector decides       |
//!
//! Every result carries its trust state so downstream consumers can tell a
//! real model opinion from a heuristic-driven fallback verdict.

pub mod cli;
pub mod config;
pub mod core;
pub mod detection;

pub use config::{EngineConfig, HeuristicThresholds};
pub use core::{FormatHint, HemorrhageEngine, TrustState};
pub use detection::{
    ConfidenceLevel, DetectionError, DetectionResult, LesionCandidate, Prediction,
};
