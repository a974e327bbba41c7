//! Scan Classifier
//!
//! Single-call boundary around a pretrained image-classification model:
//! one scan image in, a class label with confidence out. Runs an ONNX
//! session when a model file is configured, otherwise a deterministic mock.

mod classifier;

pub use classifier::{ScanClassifier, ScanClassifierConfig, ScanPrediction};

use thiserror::Error;

/// Classifier error types
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image decoding failed: {0}")]
    ImageDecode(String),
}
