// src/detection/error.rs
//
// Request-level error taxonomy. Model-load failure is deliberately absent:
// it downgrades the classifier trust state instead of failing the request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    /// Neither the raster nor the DICOM decode path accepted the input.
    /// Fatal for the request; no partial result is produced.
    #[error("unsupported image format ({attempted})")]
    UnsupportedImageFormat {
        /// Summary of the decode attempts and why each one failed.
        attempted: String,
    },

    /// Unexpected numeric or runtime fault during the forward pass. The
    /// elapsed time and device are preserved so the caller can still log
    /// latency on failure.
    #[error("inference failed after {duration_ms:.2} ms on {device}: {detail}")]
    Inference {
        detail: String,
        duration_ms: f64,
        device: String,
    },
}

impl DetectionError {
    /// Elapsed milliseconds, when the error carries timing.
    pub fn duration_ms(&self) -> Option<f64> {
        match self {
            DetectionError::Inference { duration_ms, .. } => Some(*duration_ms),
            DetectionError::UnsupportedImageFormat { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_carries_timing() {
        let err = DetectionError::Inference {
            detail: "non-finite logits".to_string(),
            duration_ms: 12.5,
            device: "cpu".to_string(),
        };
        assert_eq!(err.duration_ms(), Some(12.5));
        let text = err.to_string();
        assert!(text.contains("12.50 ms"));
        assert!(text.contains("cpu"));
    }

    #[test]
    fn test_format_error_lists_attempts() {
        let err = DetectionError::UnsupportedImageFormat {
            attempted: "raster: bad header; dicom: no DICM magic".to_string(),
        };
        assert!(err.to_string().contains("dicom"));
        assert_eq!(err.duration_ms(), None);
    }
}
