// src/core/analysis/mod.rs
//
// Heuristic image-domain analyzers. All three operate on the shared spatial
// view and are independent of the learned classifier.

pub mod lesion;
pub mod symmetry;
pub mod ventricle;

pub use lesion::{detect_lesions, LesionScan};
pub use symmetry::analyze_symmetry;
pub use ventricle::analyze_ventricles;
