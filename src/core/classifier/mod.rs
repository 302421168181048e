// src/core/classifier/mod.rs
//
// Binary hemorrhage classifier: fixed CNN, checkpoint loading with a random
// fallback, and the process-wide lazily-initialized handle.

pub mod checkpoint;
pub mod network;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};
use ndarray::Array3;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::core::normalizer::RasterImage;
use network::{softmax2, HemorrhageNet};

pub use checkpoint::CheckpointFormat;

/// Whether the classifier's numbers come from genuine trained weights or
/// from the untrained random fallback. Fixed once per process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustState {
    Trained,
    FallbackRandom,
}

impl TrustState {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrustState::Trained)
    }
}

/// Two-way probability distribution plus the trust state it was produced
/// under. Probabilities sum to one by construction (softmax).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifierOutput {
    pub p_hemorrhage: f32,
    pub p_no_hemorrhage: f32,
    pub trust: TrustState,
}

/// Compute device, resolved once at engine construction. Only a CPU backend
/// is compiled into this crate; the selector and the device string in every
/// result keep the contract open for an accelerator variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
}

impl Device {
    pub fn detect() -> Self {
        info!(
            "no accelerator backend available, using cpu ({} rayon threads)",
            rayon::current_num_threads()
        );
        Device::Cpu
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The loaded (or fallback-initialized) classifier. Parameters are
/// immutable after construction; inference is `&self` and safe to call
/// concurrently.
#[derive(Debug)]
pub struct Classifier {
    net: HemorrhageNet,
    trust: TrustState,
}

impl Classifier {
    /// Try to load the checkpoint; on any failure fall back to random
    /// parameters and record the degraded trust state. Never fails: the
    /// service keeps operating without weights.
    pub fn load_or_fallback(path: &Path) -> Self {
        match checkpoint::load(path) {
            Ok(net) => {
                info!("loaded classifier weights from {}", path.display());
                Self {
                    net,
                    trust: TrustState::Trained,
                }
            }
            Err(e) => {
                warn!(
                    "could not load classifier weights from {}: {e:#}; \
                     continuing with random parameters (degraded mode)",
                    path.display()
                );
                Self {
                    net: HemorrhageNet::random(&mut rand::rng()),
                    trust: TrustState::FallbackRandom,
                }
            }
        }
    }

    pub fn trust(&self) -> TrustState {
        self.trust
    }

    /// Run the forward pass over a grayscale view. Intensities are mapped
    /// to [-1, 1] the same way the training pipeline did.
    pub fn classify(&self, view: &RasterImage) -> Result<ClassifierOutput> {
        let (w, h) = (view.width() as usize, view.height() as usize);
        let input = Array3::from_shape_fn((1, h, w), |(_, y, x)| {
            let p = view.get(x as u32, y as u32) as f32 / 255.0;
            (p - 0.5) / 0.5
        });

        let logits = self.net.forward(&input)?;
        let [p_no, p_yes] = softmax2(&logits)?;

        Ok(ClassifierOutput {
            p_hemorrhage: p_yes,
            p_no_hemorrhage: p_no,
            trust: self.trust,
        })
    }
}

/// Thread-safe lazily-initialized classifier singleton. The first caller
/// pays for the checkpoint load (or fallback init); concurrent first calls
/// cannot race to construct two instances.
#[derive(Debug)]
pub struct ClassifierHandle {
    model_path: PathBuf,
    cell: OnceCell<Classifier>,
}

impl ClassifierHandle {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> &Classifier {
        self.cell
            .get_or_init(|| Classifier::load_or_fallback(&self.model_path))
    }

    /// Trust state without forcing initialization, when already resolved.
    pub fn trust_if_initialized(&self) -> Option<TrustState> {
        self.cell.get().map(|c| c.trust())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_on_missing_checkpoint() {
        let classifier = Classifier::load_or_fallback(Path::new("/nonexistent/weights.npz"));
        assert_eq!(classifier.trust(), TrustState::FallbackRandom);
    }

    #[test]
    fn test_classify_probabilities_sum_to_one() {
        let classifier = Classifier::load_or_fallback(Path::new("/nonexistent/weights.npz"));
        let view = RasterImage::from_raw(32, 32, (0..32 * 32).map(|i| (i % 251) as u8).collect());
        let out = classifier.classify(&view).unwrap();
        assert!((out.p_hemorrhage + out.p_no_hemorrhage - 1.0).abs() < 1e-4);
        assert_eq!(out.trust, TrustState::FallbackRandom);
    }

    #[test]
    fn test_handle_initializes_once() {
        let handle = ClassifierHandle::new("/nonexistent/weights.npz");
        assert!(handle.trust_if_initialized().is_none());
        let first = handle.get() as *const Classifier;
        let second = handle.get() as *const Classifier;
        assert_eq!(first, second);
        assert_eq!(handle.trust_if_initialized(), Some(TrustState::FallbackRandom));
    }
}
