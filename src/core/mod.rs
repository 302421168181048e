//! Core detection modules: normalization, classification, heuristic
//! analysis, and decision fusion.

pub mod analysis;
pub mod classifier;
pub mod engine;
pub mod normalizer;

pub use classifier::{ClassifierOutput, Device, TrustState};
pub use engine::{fuse_signals, FusedDecision, HemorrhageEngine};
pub use normalizer::{decode_image, FormatHint, NormalizedViews, RasterImage};
