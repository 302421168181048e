// src/detection/mod.rs
//
// Detection result and error types.

pub mod error;
pub mod result;

pub use error::DetectionError;
pub use result::{
    ConfidenceLevel, DetectionResult, LesionCandidate, Prediction, SymmetryFinding,
    VentricleFinding,
};
